//! ARM Client
//!
//! Main client for the Azure Resource Manager API, combining authentication
//! and HTTP functionality.

use super::auth::ArmCredentials;
use super::http::{ApiError, ArmHttpClient, ArmResponse};
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Public cloud ARM endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Main ARM client
#[derive(Clone)]
pub struct ArmClient {
    pub credentials: ArmCredentials,
    pub http: ArmHttpClient,
    endpoint: Url,
}

impl ArmClient {
    /// Create a new client against `endpoint`
    pub fn new(endpoint: &str, credentials: ArmCredentials) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid ARM endpoint: {}", endpoint))?;
        let http = ArmHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL of a resource id with its `api-version`
    pub fn resource_url(&self, id: &str, api_version: &str) -> Result<String> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}{}", base, id))
            .with_context(|| format!("Invalid resource id for URL: {}", id))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url.into())
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// GET a resource
    pub async fn get(&self, id: &str, api_version: &str) -> Result<ArmResponse> {
        let url = self.resource_url(id, api_version)?;
        self.get_url(&url).await
    }

    /// GET an absolute URL, e.g. an operation status monitor
    pub async fn get_url(&self, url: &str) -> Result<ArmResponse> {
        let token = self.get_token().await?;
        match self.http.get(url, &token).await {
            Err(e) if is_unauthorized(&e) => {
                let token = self.reauthenticate().await?;
                self.http.get(url, &token).await
            }
            result => result,
        }
    }

    /// PUT (create or replace) a resource
    pub async fn put(&self, id: &str, api_version: &str, body: &Value) -> Result<ArmResponse> {
        let url = self.resource_url(id, api_version)?;
        let token = self.get_token().await?;
        match self.http.put(&url, &token, body).await {
            Err(e) if is_unauthorized(&e) => {
                let token = self.reauthenticate().await?;
                self.http.put(&url, &token, body).await
            }
            result => result,
        }
    }

    /// DELETE a resource
    pub async fn delete(&self, id: &str, api_version: &str) -> Result<ArmResponse> {
        let url = self.resource_url(id, api_version)?;
        let token = self.get_token().await?;
        match self.http.delete(&url, &token).await {
            Err(e) if is_unauthorized(&e) => {
                let token = self.reauthenticate().await?;
                self.http.delete(&url, &token).await
            }
            result => result,
        }
    }

    /// Drop the cached token after a 401; the request is retried once
    async fn reauthenticate(&self) -> Result<String> {
        tracing::warn!("Request unauthorized, refreshing access token");
        self.credentials.refresh_token().await
    }
}

fn is_unauthorized(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(|e| e.is_unauthorized())
}

/// Format an ARM API error for display
pub fn format_arm_error(error: &anyhow::Error) -> String {
    super::http::format_arm_error(error)
}
