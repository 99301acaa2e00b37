//! Core data model shared by every entity the client can read and write

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Static metadata for a lookup (relationship) field.
///
/// Dynamics exposes a lookup as `_<name>_value` holding a bare GUID when
/// reading, but expects `<name>@odata.bind` holding a relative resource path
/// such as `/uoms(<guid>)` when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupField {
    /// Serde name of the field on the Rust struct
    pub field: &'static str,
    /// Wire name in read responses (e.g. "_productid_value")
    pub read_name: &'static str,
    /// Wire name in write payloads (e.g. "productid@odata.bind")
    pub write_name: &'static str,
    /// Entity set of the referenced entity (e.g. "products")
    pub target_entity_set: &'static str,
}

impl LookupField {
    pub const fn new(
        field: &'static str,
        read_name: &'static str,
        write_name: &'static str,
        target_entity_set: &'static str,
    ) -> Self {
        Self {
            field,
            read_name,
            write_name,
            target_entity_set,
        }
    }

    /// Relative resource path used as the value of an `@odata.bind` annotation
    pub fn bind_path(&self, id: Uuid) -> String {
        format!("/{}({})", self.target_entity_set, id)
    }
}

/// A typed Dynamics 365 entity.
///
/// Implementors derive `Serialize`/`Deserialize` for their plain fields and
/// describe their lookup fields in [`CrmEntity::LOOKUPS`]; the translation
/// between the two wire shapes happens in [`crate::api::binding`].
///
/// The primary id attribute is read like any plain field but is always
/// stripped from request bodies; writes address the record through the URL.
pub trait CrmEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Logical name (e.g. "product")
    const LOGICAL_NAME: &'static str;
    /// Entity set name used in URLs (e.g. "products")
    const ENTITY_SET: &'static str;
    /// Primary id attribute (e.g. "productid")
    const ID_ATTRIBUTE: &'static str;
    /// Lookup field descriptors, one per relationship field
    const LOOKUPS: &'static [LookupField];

    fn id(&self) -> Option<Uuid>;
}

/// Collection envelope returned by query endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ODataCollection {
    #[serde(rename = "@odata.context", default)]
    pub context: Option<String>,
    #[serde(default)]
    pub value: Vec<Value>,
}
