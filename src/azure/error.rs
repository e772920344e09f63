//! Azure API errors
//!
//! Transport-level error taxonomy shared by the HTTP client, the operation
//! poller and the resource API implementations.

use thiserror::Error;

/// Errors produced while talking to Azure Resource Manager
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response
    #[error("sending request: {0}")]
    Transport(#[from] reqwest::Error),

    /// ARM answered with a non-success status
    #[error("API request failed with status {status}{}", format_detail(.code, .message))]
    Status {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    /// The response body was not the JSON we expected
    #[error("parsing response JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// A bearer token could not be obtained
    #[error("authenticating: {0}")]
    Auth(String),

    /// A long-running operation reached a terminal, unsuccessful state
    #[error("operation finished with status {status}{}", format_detail(.code, .message))]
    OperationFailed {
        status: String,
        code: Option<String>,
        message: Option<String>,
    },

    /// The response was well-formed JSON but missing something we need
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status code, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this is a 404 from ARM
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

fn format_detail(code: &Option<String>, message: &Option<String>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!(" ({}): {}", code, message),
        (Some(code), None) => format!(" ({})", code),
        (None, Some(message)) => format!(": {}", message),
        (None, None) => String::new(),
    }
}
