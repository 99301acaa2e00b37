//! `productpricelevel` entity (price list item)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::constants::entity_sets;
use crate::api::{CrmEntity, LookupField};

/// Price of one product on one price list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceLevel {
    #[serde(rename = "productpricelevelid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(rename = "amount", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_uom_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_price_list: Option<Uuid>,
}

impl CrmEntity for ProductPriceLevel {
    const LOGICAL_NAME: &'static str = "productpricelevel";
    const ENTITY_SET: &'static str = entity_sets::PRODUCT_PRICE_LEVELS;
    const ID_ATTRIBUTE: &'static str = "productpricelevelid";
    const LOOKUPS: &'static [LookupField] = &[
        LookupField::new(
            "product_id",
            "_productid_value",
            "productid@odata.bind",
            entity_sets::PRODUCTS,
        ),
        LookupField::new("default_uom_id", "_uomid_value", "uomid@odata.bind", entity_sets::UOMS),
        LookupField::new(
            "default_price_list",
            "_pricelevelid_value",
            "pricelevelid@odata.bind",
            entity_sets::PRICE_LEVELS,
        ),
    ];

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}
