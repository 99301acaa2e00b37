//! FetchXML query construction
//!
//! Builds the filter documents passed to the client's query operations.
//! Builders are pure: they only produce strings.

pub mod fetchxml;

pub use fetchxml::{FetchXmlBuilder, LinkEntity};
