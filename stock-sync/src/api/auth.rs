//! Bearer token acquisition for the Dynamics 365 Web API
//!
//! The client asks its provider for a token before every request; providers
//! do not cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CrmOptions;

/// Source of bearer tokens attached to outgoing requests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

/// Always hands out the same token
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth2 client credentials flow against Azure AD
#[derive(Debug, Clone)]
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientCredentialsProvider {
    pub fn new(http: reqwest::Client, options: &CrmOptions) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            options.instance.trim_end_matches('/'),
            options.tenant_id
        );
        let scope = format!("{}/.default", options.organization_url.trim_end_matches('/'));

        Self {
            http,
            token_url,
            client_id: options.client_id.clone(),
            client_secret: options.client_secret.clone(),
            scope,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn bearer_token(&self) -> Result<String> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .context("Token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token request failed with status {}: {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        log::debug!("Acquired access token for {}", self.scope);
        Ok(token.access_token)
    }
}
