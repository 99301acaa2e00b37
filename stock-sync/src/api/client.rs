//! Typed CRUD client for the Dynamics 365 Web API
//!
//! Every operation returns a [`CrmResult`]; failures are logged here with the
//! entity type and identifiers involved and handed back to the caller as
//! values.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use uuid::Uuid;

use super::auth::{ClientCredentialsProvider, TokenProvider};
use super::binding::{decode, encode};
use super::constants::{headers, params};
use super::error::{CrmError, CrmResult};
use super::models::{CrmEntity, ODataCollection};
use crate::config::CrmOptions;

static RECORD_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("record id pattern is valid")
});

/// Pull the record GUID out of an `OData-EntityId`/`Location` header value
pub fn extract_record_id(header_value: &str) -> Option<Uuid> {
    RECORD_ID_PATTERN
        .find(header_value)
        .and_then(|m| Uuid::parse_str(m.as_str()).ok())
}

/// Client bound to one Dynamics 365 organization's Web API endpoint
#[derive(Clone)]
pub struct DynamicsClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for DynamicsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DynamicsClient {
    /// Create a client for `base_url` (e.g. `https://org.crm.dynamics.com/api/data/v9.2`)
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> CrmResult<Self> {
        let http = Self::build_http(timeout)?;
        Ok(Self::with_http(http, base_url, tokens))
    }

    /// Create a client that authenticates with the client credentials flow
    pub fn from_options(options: &CrmOptions) -> anyhow::Result<Self> {
        let http = Self::build_http(Duration::from_secs(options.timeout_secs))?;
        let tokens = Arc::new(ClientCredentialsProvider::new(http.clone(), options));
        Ok(Self::with_http(http, options.base_url(), tokens))
    }

    fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn build_http(timeout: Duration) -> CrmResult<reqwest::Client> {
        let mut default_headers = HeaderMap::new();
        for name in [headers::ODATA_MAX_VERSION, headers::ODATA_VERSION] {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CrmError::client(format!("Invalid header name '{}': {}", name, e)))?;
            default_headers.insert(name, HeaderValue::from_static(headers::ODATA_VERSION_VALUE));
        }
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, entity_set: &str) -> String {
        format!("{}/{}", self.base_url, entity_set)
    }

    fn record_url(&self, entity_set: &str, id: Uuid) -> String {
        format!("{}/{}({})", self.base_url, entity_set, id)
    }

    /// Attach a fresh bearer token, send, and classify the response status
    async fn send(&self, request: RequestBuilder) -> CrmResult<Response> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| CrmError::client(format!("Failed to acquire access token: {:#}", e)))?;

        let response = request.bearer_auth(token).send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(CrmError::Rejected { status, body })
    }

    async fn fetch_collection(&self, entity_set: &str, fetch_xml: &str) -> CrmResult<Vec<Value>> {
        // The whole document is form-encoded into the query string; the
        // server decodes it once and sees the XML as built
        let request = self
            .http
            .get(self.collection_url(entity_set))
            .query(&[(params::FETCH_XML, fetch_xml)]);
        let response = self.send(request).await?;
        let collection: ODataCollection = response.json().await?;
        Ok(collection.value)
    }

    /// Retrieve a single record by id, optionally restricted to `columns`
    pub async fn get<T: CrmEntity>(
        &self,
        entity_set: &str,
        id: Uuid,
        columns: &[&str],
    ) -> CrmResult<T> {
        let result: CrmResult<T> = async {
            let mut request = self.http.get(self.record_url(entity_set, id));
            if !columns.is_empty() {
                request = request.query(&[(params::SELECT, columns.join(","))]);
            }

            let raw: Value = self.send(request).await?.json().await?;
            Ok(decode::<T>(raw)?)
        }
        .await;

        if let Err(err) = &result {
            log::error!(
                "Failed to get Dynamics entity (type={}, set={}, id={}): {}",
                T::LOGICAL_NAME,
                entity_set,
                id,
                err
            );
        }
        result
    }

    /// Run a FetchXML query and return the first match, or `None` when nothing matches
    pub async fn get_by_fetchxml<T: CrmEntity>(
        &self,
        entity_set: &str,
        fetch_xml: &str,
    ) -> CrmResult<Option<T>> {
        let result: CrmResult<Option<T>> = async {
            let records = self.fetch_collection(entity_set, fetch_xml).await?;
            records.into_iter().next().map(decode::<T>).transpose().map_err(CrmError::from)
        }
        .await;

        match &result {
            Ok(None) => log::debug!(
                "No {} matched query on {}",
                T::LOGICAL_NAME,
                entity_set
            ),
            Ok(Some(_)) => {}
            Err(err) => log::error!(
                "Failed to query Dynamics entity (type={}, set={}, fetchXml={}): {}",
                T::LOGICAL_NAME,
                entity_set,
                fetch_xml,
                err
            ),
        }
        result
    }

    /// Run a FetchXML query and return every match
    pub async fn get_all_by_fetchxml<T: CrmEntity>(
        &self,
        entity_set: &str,
        fetch_xml: &str,
    ) -> CrmResult<Vec<T>> {
        let result: CrmResult<Vec<T>> = async {
            let records = self.fetch_collection(entity_set, fetch_xml).await?;
            records
                .into_iter()
                .map(decode::<T>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(CrmError::from)
        }
        .await;

        match &result {
            Ok(records) => log::debug!(
                "Fetched {} {} records from {}",
                records.len(),
                T::LOGICAL_NAME,
                entity_set
            ),
            Err(err) => log::error!(
                "Failed to query multiple Dynamics entities (type={}, set={}, fetchXml={}): {}",
                T::LOGICAL_NAME,
                entity_set,
                fetch_xml,
                err
            ),
        }
        result
    }

    /// Create a record and return the id the server assigned to it.
    ///
    /// A success status without a parseable id in `OData-EntityId` (or
    /// `Location`) is reported as [`CrmError::Protocol`].
    pub async fn create<T: CrmEntity>(&self, entity_set: &str, entity: &T) -> CrmResult<Uuid> {
        let result: CrmResult<Uuid> = async {
            let body = encode(entity)?;
            let response = self
                .send(
                    self.http
                        .request(Method::POST, self.collection_url(entity_set))
                        .json(&body),
                )
                .await?;

            let header_value = response
                .headers()
                .get(headers::ODATA_ENTITY_ID)
                .or_else(|| response.headers().get(LOCATION))
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            match header_value {
                Some(value) => extract_record_id(&value).ok_or_else(|| {
                    CrmError::Protocol(format!("Could not parse created record id from '{}'", value))
                }),
                None => Err(CrmError::Protocol(format!(
                    "Response is missing the {} header",
                    headers::ODATA_ENTITY_ID
                ))),
            }
        }
        .await;

        match &result {
            Ok(id) => log::info!(
                "Dynamics entity created (type={}, set={}, id={})",
                T::LOGICAL_NAME,
                entity_set,
                id
            ),
            Err(err) => log::error!(
                "Failed to create Dynamics entity (type={}, set={}, payload={}): {}",
                T::LOGICAL_NAME,
                entity_set,
                serde_json::to_string(entity).unwrap_or_default(),
                err
            ),
        }
        result
    }

    /// Apply a sparse update to an existing record and return its id.
    ///
    /// Only fields set on `entity` are sent. `If-Match: *` keeps the PATCH
    /// from silently creating a record that no longer exists.
    pub async fn update<T: CrmEntity>(
        &self,
        entity_set: &str,
        entity: &T,
        id: Uuid,
    ) -> CrmResult<Uuid> {
        let result: CrmResult<Uuid> = async {
            let body = encode(entity)?;
            self.send(
                self.http
                    .request(Method::PATCH, self.record_url(entity_set, id))
                    .header("If-Match", "*")
                    .json(&body),
            )
            .await?;
            Ok(id)
        }
        .await;

        match &result {
            Ok(_) => log::info!(
                "Dynamics entity updated (type={}, set={}, id={})",
                T::LOGICAL_NAME,
                entity_set,
                id
            ),
            Err(err) => log::error!(
                "Failed to update Dynamics entity (type={}, set={}, id={}, payload={}): {}",
                T::LOGICAL_NAME,
                entity_set,
                id,
                serde_json::to_string(entity).unwrap_or_default(),
                err
            ),
        }
        result
    }

    /// Delete a record
    pub async fn delete<T: CrmEntity>(&self, entity_set: &str, id: Uuid) -> CrmResult<()> {
        let result = self
            .send(self.http.request(Method::DELETE, self.record_url(entity_set, id)))
            .await
            .map(|_| ());

        match &result {
            Ok(()) => log::info!(
                "Dynamics entity deleted (type={}, set={}, id={})",
                T::LOGICAL_NAME,
                entity_set,
                id
            ),
            Err(err) => log::error!(
                "Failed to delete Dynamics entity (type={}, set={}, id={}): {}",
                T::LOGICAL_NAME,
                entity_set,
                id,
                err
            ),
        }
        result
    }
}
