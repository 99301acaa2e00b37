//! `product` entity

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::constants::entity_sets;
use crate::api::{CrmEntity, LookupField};

/// `statecode` of an active product
pub const STATE_ACTIVE: i32 = 0;
/// `statuscode` (status reason) of an active product
pub const STATUS_ACTIVE: i32 = 1;

/// Catalog product. Every field is optional so that a value built for an
/// update only carries the attributes that should change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "productid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(rename = "productnumber", default, skip_serializing_if = "Option::is_none")]
    pub product_number: Option<String>,

    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "currentcost", default, skip_serializing_if = "Option::is_none")]
    pub current_cost: Option<Decimal>,

    #[serde(rename = "quantitydecimal", default, skip_serializing_if = "Option::is_none")]
    pub quantity_decimal: Option<i32>,

    #[serde(rename = "vendorname", default, skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,

    #[serde(rename = "statecode", default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<i32>,

    #[serde(rename = "statuscode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,

    // Lookups, see `LOOKUPS` for their wire names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_price_list: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_category_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_uom_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_uom_schedule_id: Option<Uuid>,

    /// Category code from the `category` link-entity alias; read only
    #[serde(rename = "category.dict_category", default, skip_serializing)]
    pub category_code: Option<String>,
}

impl Product {
    /// Update payload that moves a product to the active state
    pub fn activation() -> Self {
        Self {
            state_code: Some(STATE_ACTIVE),
            status_code: Some(STATUS_ACTIVE),
            ..Default::default()
        }
    }
}

impl CrmEntity for Product {
    const LOGICAL_NAME: &'static str = "product";
    const ENTITY_SET: &'static str = entity_sets::PRODUCTS;
    const ID_ATTRIBUTE: &'static str = "productid";
    const LOOKUPS: &'static [LookupField] = &[
        LookupField::new(
            "default_price_list",
            "_dict_pricelevelid_value",
            "pricelevelid@odata.bind",
            entity_sets::PRICE_LEVELS,
        ),
        LookupField::new(
            "item_category_id",
            "_dict_itemcategoryid_value",
            "dict_itemcategoryid@odata.bind",
            entity_sets::ITEM_CATEGORIES,
        ),
        LookupField::new(
            "default_uom_id",
            "_defaultuomid_value",
            "defaultuomid@odata.bind",
            entity_sets::UOMS,
        ),
        LookupField::new(
            "default_uom_schedule_id",
            "_defaultuomscheduleid_value",
            "defaultuomscheduleid@odata.bind",
            entity_sets::UOM_SCHEDULES,
        ),
    ];

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}
