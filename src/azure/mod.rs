//! Azure Resource Manager interaction module
//!
//! This module provides the transport used by the resource handlers:
//! authentication, the HTTP client, and long-running operation polling.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer tokens and default subscription discovery
//! - [`client`] - Main ARM client for making API requests
//! - [`error`] - Transport error taxonomy
//! - [`http`] - HTTP utilities for REST API calls
//! - [`operation`] - Long-running operation polling and cancellation
//!
//! # Example
//!
//! ```ignore
//! use cosmotab::azure::{auth::AzureCredentials, client::AzureClient, http::AzureHttpClient};
//!
//! async fn example() -> Result<(), cosmotab::azure::error::ApiError> {
//!     let client = AzureClient::new(
//!         AzureCredentials::static_token("token"),
//!         AzureHttpClient::new()?,
//!         "00000000-0000-0000-0000-000000000000",
//!         url::Url::parse("https://management.azure.com").unwrap(),
//!     );
//!     let url = client.resource_url("/subscriptions/00000000-0000-0000-0000-000000000000", "2021-10-15");
//!     let subscription = client.get(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod operation;
