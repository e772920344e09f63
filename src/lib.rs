//! cosmotab manages Azure Cosmos DB tables declaratively.
//!
//! A YAML file names the tables that should exist; cosmotab creates,
//! updates, replaces and deletes them through Azure Resource Manager and
//! records what it last saw in a local state file.

pub mod app;
pub mod azure;
pub mod config;
pub mod resource;
pub mod state;

/// Version injected at compile time via COSMOTAB_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("COSMOTAB_VERSION") {
    Some(v) => v,
    None => "dev",
};
