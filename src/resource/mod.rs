//! Cosmos DB table resource
//!
//! This module manages the full lifecycle of one resource type, a Cosmos DB
//! table, reconciling configuration with what exists in Azure.
//!
//! # Architecture
//!
//! - [`id`] - Parses and formats table and account ids
//! - [`schema`] - Attribute declarations and validation
//! - [`model`] - Desired, observed and persisted state
//! - [`throughput`] - Fixed/autoscale throughput rules
//! - [`migration`] - Upgrades of persisted records
//! - [`api`] - The remote API the lifecycle depends on
//! - [`arm`] - [`api::TableApi`] over Azure Resource Manager
//! - [`lifecycle`] - Create, read, update, delete and import
//!
//! # Example
//!
//! ```ignore
//! use cosmotab::resource::{lifecycle, ArmTableApi, DesiredState};
//! use cosmotab::azure::operation::OperationContext;
//!
//! async fn create_orders(api: &ArmTableApi) -> Result<(), cosmotab::resource::ResourceError> {
//!     let desired = DesiredState::new("orders", "rg-shop", "shop-cosmos").with_throughput(400);
//!     let ctx = OperationContext::with_timeout(std::time::Duration::from_secs(30 * 60));
//!     let observed = lifecycle::create(api, &ctx, &desired).await?;
//!     println!("created {}", observed.id);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod arm;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod migration;
pub mod model;
pub mod schema;
pub mod throughput;

pub use api::{Lookup, TableApi};
pub use arm::ArmTableApi;
pub use error::{ResourceError, ValidationError};
pub use id::{AccountId, IdParseError, TableId};
pub use lifecycle::ReadOutcome;
pub use model::{AutoscaleSettings, DesiredState, ObservedState, TableAttributes};
pub use throughput::{CapacityMode, ThroughputSetting};
