//! HTTP utilities for Azure Resource Manager REST calls

use super::error::ApiError;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the status-monitor URL of an asynchronous ARM operation
pub const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Header used to correlate a request with ARM's server-side logs
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A successful (2xx) ARM response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    /// `Azure-AsyncOperation` header, if present
    pub async_operation: Option<String>,
    /// `Location` header, if present
    pub location: Option<String>,
    /// `Retry-After` header in seconds, if present and numeric
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    fn from_parts(status: u16, headers: &HeaderMap, body: Value) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            status,
            body,
            async_operation: header(AZURE_ASYNC_OPERATION),
            location: header(LOCATION.as_str()),
            retry_after: header(RETRY_AFTER.as_str())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct AzureHttpClient {
    client: Client,
}

impl AzureHttpClient {
    /// Create a new HTTP client with the default request timeout
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("cosmotab/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::GET, url, token, None).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.send(Method::PUT, url, token, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::DELETE, url, token, None).await
    }

    /// Send a request and classify the response
    ///
    /// Any non-2xx status becomes [`ApiError::Status`], carrying the ARM
    /// error `code` and `message` when the body has them. Empty bodies are
    /// returned as `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("{} {} (request id {})", method, url, request_id);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(CLIENT_REQUEST_ID, &request_id);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error: {} - {} (request id {})",
                status,
                sanitize_for_log(&text),
                request_id
            );
            let (code, message) = parse_error_body(&text);
            return Err(ApiError::Status {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        Ok(ApiResponse::from_parts(status.as_u16(), &headers, body))
    }
}

/// Extract `error.code` and `error.message` from an ARM error body
pub fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };

    let error = value.get("error").unwrap_or(&value);
    let field = |name: &str| {
        error
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    (field("code"), field("message"))
}
