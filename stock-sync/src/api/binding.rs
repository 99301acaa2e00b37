//! Lookup field translation between entity structs and OData wire documents
//!
//! Plain fields keep a single wire name in both directions. Lookup fields do
//! not: reads return `_<name>_value: "<guid>"` while writes expect
//! `<name>@odata.bind: "/<entityset>(<guid>)"`. [`decode`] re-keys read names
//! onto struct fields before deserializing, [`encode`] does the reverse and
//! drops everything unset so PATCH bodies only touch populated fields.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::models::{CrmEntity, LookupField};

/// Error translating between an entity and its wire document
#[derive(Debug, Clone, PartialEq)]
pub enum BindingError {
    /// Top-level JSON was not an object
    NotAnObject { entity: &'static str },
    /// Lookup field held something other than a GUID
    InvalidLookupValue { field: &'static str, value: String },
    /// `@odata.bind` value did not look like `/<entityset>(<guid>)`
    InvalidBindPath { field: &'static str, value: String },
    /// serde_json failed on the struct itself
    Json(String),
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingError::NotAnObject { entity } => {
                write!(f, "Expected a JSON object for entity '{}'", entity)
            }
            BindingError::InvalidLookupValue { field, value } => {
                write!(f, "Lookup field '{}' does not hold a GUID: {}", field, value)
            }
            BindingError::InvalidBindPath { field, value } => {
                write!(
                    f,
                    "Lookup field '{}' has a malformed @odata.bind path: {}",
                    field, value
                )
            }
            BindingError::Json(message) => write!(f, "JSON error: {}", message),
        }
    }
}

impl std::error::Error for BindingError {}

impl From<serde_json::Error> for BindingError {
    fn from(err: serde_json::Error) -> Self {
        BindingError::Json(err.to_string())
    }
}

/// Decode a raw record from a read response into `T`.
///
/// A lookup missing from the document (or explicitly null) decodes to `None`.
/// Documents in write shape (`@odata.bind`) are accepted as well, so
/// `decode(encode(e))` yields `e` back apart from its id.
pub fn decode<T: CrmEntity>(raw: Value) -> Result<T, BindingError> {
    let mut object = match raw {
        Value::Object(map) => map,
        _ => {
            return Err(BindingError::NotAnObject {
                entity: T::LOGICAL_NAME,
            });
        }
    };

    for lookup in T::LOOKUPS {
        let read_value = object.remove(lookup.read_name).filter(|v| !v.is_null());
        let bind_value = object.remove(lookup.write_name).filter(|v| !v.is_null());

        let value = match (read_value, bind_value) {
            (Some(value), _) => Some(value),
            (None, Some(bind)) => Some(Value::String(parse_bind_path(lookup, &bind)?.to_string())),
            (None, None) => None,
        };

        match value {
            Some(value) => {
                object.insert(lookup.field.to_string(), value);
            }
            None => {
                object.remove(lookup.field);
            }
        }
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}

/// Encode `entity` into a sparse write document.
///
/// - the id attribute is never emitted
/// - unset (null) fields are omitted rather than sent as explicit nulls
/// - populated lookups are emitted under their `@odata.bind` name
pub fn encode<T: CrmEntity>(entity: &T) -> Result<Map<String, Value>, BindingError> {
    let mut object = match serde_json::to_value(entity)? {
        Value::Object(map) => map,
        _ => {
            return Err(BindingError::NotAnObject {
                entity: T::LOGICAL_NAME,
            });
        }
    };

    object.remove(T::ID_ATTRIBUTE);
    object.retain(|_, value| !value.is_null());

    for lookup in T::LOOKUPS {
        let Some(value) = object.remove(lookup.field) else {
            continue;
        };

        let id = value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| BindingError::InvalidLookupValue {
                field: lookup.field,
                value: value.to_string(),
            })?;

        if id.is_nil() {
            continue;
        }

        object.insert(lookup.write_name.to_string(), Value::String(lookup.bind_path(id)));
    }

    Ok(object)
}

/// Extract the GUID from `/<entityset>(<guid>)`
fn parse_bind_path(lookup: &LookupField, value: &Value) -> Result<Uuid, BindingError> {
    let invalid = || BindingError::InvalidBindPath {
        field: lookup.field,
        value: value.to_string(),
    };

    let path = value.as_str().ok_or_else(invalid)?;
    let inner = path
        .trim_start_matches('/')
        .strip_prefix(lookup.target_entity_set)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;

    Uuid::parse_str(inner).map_err(|_| invalid())
}
