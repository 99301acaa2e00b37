//! Dynamics 365 Web API access
//!
//! Typed CRUD over OData entity sets, lookup field translation, FetchXML
//! query construction and bearer token acquisition.

pub mod auth;
pub mod binding;
pub mod client;
pub mod constants;
pub mod error;
pub mod models;
pub mod query;

pub use auth::{ClientCredentialsProvider, StaticTokenProvider, TokenProvider};
pub use binding::{BindingError, decode, encode};
pub use client::{DynamicsClient, extract_record_id};
pub use constants::entity_sets;
pub use error::{CrmError, CrmResult};
pub use models::{CrmEntity, LookupField, ODataCollection};
pub use query::FetchXmlBuilder;
