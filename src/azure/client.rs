//! Azure Client
//!
//! Main client for interacting with Azure Resource Manager, combining
//! authentication and HTTP functionality.

use super::auth::AzureCredentials;
use super::error::ApiError;
use super::http::{ApiResponse, AzureHttpClient};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Public-cloud Resource Manager endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Default interval between polls of a long-running operation
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Main Azure client
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: AzureCredentials,
    pub http: AzureHttpClient,
    pub subscription_id: String,
    pub endpoint: Url,
    pub poll_interval: Duration,
}

impl AzureClient {
    /// Create a new Azure client
    pub fn new(
        credentials: AzureCredentials,
        http: AzureHttpClient,
        subscription_id: &str,
        endpoint: Url,
    ) -> Self {
        Self {
            credentials,
            http,
            subscription_id: subscription_id.to_string(),
            endpoint,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the long-running operation poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String, ApiError> {
        self.credentials.get_token().await
    }

    /// Make a GET request to an ARM URL
    pub async fn get(&self, url: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::GET, url, None).await
    }

    /// Make a PUT request to an ARM URL
    pub async fn put(&self, url: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.send(Method::PUT, url, Some(body)).await
    }

    /// Make a DELETE request to an ARM URL
    pub async fn delete(&self, url: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::DELETE, url, None).await
    }

    /// Send with the cached token, retrying once with a fresh one on 401
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<ApiResponse, ApiError> {
        let token = self.get_token().await?;
        match self.http.send(method.clone(), url, &token, body).await {
            Err(err) if err.status() == Some(401) => {
                tracing::debug!("Token rejected, refreshing and retrying once");
                let token = self.credentials.refresh_token().await?;
                self.http.send(method, url, &token, body).await
            },
            result => result,
        }
    }

    // =========================================================================
    // Resource Manager URL helpers
    // =========================================================================

    /// Build an ARM URL for an already percent-encoded resource path
    pub fn resource_url(&self, path: &str, api_version: &str) -> String {
        let mut url = self.endpoint.clone();
        url.set_path(path);
        url.query_pairs_mut().append_pair("api-version", api_version);
        url.to_string()
    }
}
