//! `dict_itemcategory` custom entity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::constants::entity_sets;
use crate::api::{CrmEntity, LookupField};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemCategory {
    #[serde(rename = "dict_itemcategoryid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    /// Category code shared with the stock system
    #[serde(rename = "dict_category", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(rename = "dict_name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CrmEntity for ItemCategory {
    const LOGICAL_NAME: &'static str = "dict_itemcategory";
    const ENTITY_SET: &'static str = entity_sets::ITEM_CATEGORIES;
    const ID_ATTRIBUTE: &'static str = "dict_itemcategoryid";
    const LOOKUPS: &'static [LookupField] = &[];

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}
