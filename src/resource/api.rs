//! Remote API collaborator
//!
//! The lifecycle functions only talk to the cloud through [`TableApi`].
//! Existence checks come back as [`Lookup`] instead of an error carrying a
//! 404, so the reconciliation logic never inspects status codes.

use super::id::{AccountId, TableId};
use super::throughput::{CapacityMode, ThroughputSetting};
use crate::azure::error::ApiError;
use crate::azure::operation::LongRunningOperation;
use std::future::Future;

/// Capability that switches an account to serverless capacity mode
pub const SERVERLESS_CAPABILITY: &str = "EnableServerless";

/// Result of looking up a remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Absent,
}

impl<T> Lookup<T> {
    /// Turn a 404 into [`Lookup::Absent`], pass everything else through
    pub fn from_result(result: Result<T, ApiError>) -> Result<Self, ApiError> {
        match result {
            Ok(value) => Ok(Lookup::Found(value)),
            Err(err) if err.is_not_found() => Ok(Lookup::Absent),
            Err(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Absent => Lookup::Absent,
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Lookup::Absent)
    }
}

/// A table as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableResource {
    /// Full ARM id
    pub id: Option<String>,
    /// Table name inside the account (`properties.resource.id`)
    pub resource_id: Option<String>,
}

/// The parent database account
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabaseAccount {
    pub id: Option<String>,
    pub capabilities: Vec<String>,
}

impl DatabaseAccount {
    pub fn capacity_mode(&self) -> CapacityMode {
        if self
            .capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(SERVERLESS_CAPABILITY))
        {
            CapacityMode::Serverless
        } else {
            CapacityMode::Provisioned
        }
    }
}

/// Throughput settings of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThroughputSettings {
    pub throughput: Option<u32>,
    pub autoscale_max_throughput: Option<u32>,
}

/// Body of a table create/update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCreateUpdateParameters {
    pub name: String,
    /// Throughput inlined into the create options
    pub throughput: ThroughputSetting,
}

impl TableCreateUpdateParameters {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            throughput: ThroughputSetting::Unset,
        }
    }

    pub fn with_throughput(mut self, throughput: ThroughputSetting) -> Self {
        self.throughput = throughput;
        self
    }
}

/// Operations the lifecycle functions need from the cloud
pub trait TableApi: Sync {
    type Operation: LongRunningOperation;

    /// Subscription new tables are created in
    fn subscription_id(&self) -> &str;

    fn get_table(
        &self,
        id: &TableId,
    ) -> impl Future<Output = Result<Lookup<TableResource>, ApiError>> + Send;

    fn create_update_table(
        &self,
        id: &TableId,
        parameters: &TableCreateUpdateParameters,
    ) -> impl Future<Output = Result<Self::Operation, ApiError>> + Send;

    fn delete_table(
        &self,
        id: &TableId,
    ) -> impl Future<Output = Result<Lookup<Self::Operation>, ApiError>> + Send;

    fn get_throughput(
        &self,
        id: &TableId,
    ) -> impl Future<Output = Result<Lookup<ThroughputSettings>, ApiError>> + Send;

    fn update_throughput(
        &self,
        id: &TableId,
        setting: &ThroughputSetting,
    ) -> impl Future<Output = Result<Lookup<Self::Operation>, ApiError>> + Send;

    fn get_account(
        &self,
        id: &AccountId,
    ) -> impl Future<Output = Result<Lookup<DatabaseAccount>, ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_from_result_maps_404() {
        let not_found: Result<(), ApiError> = Err(ApiError::Status {
            status: 404,
            code: Some("NotFound".to_string()),
            message: None,
        });
        assert!(Lookup::from_result(not_found).unwrap().is_absent());

        let forbidden: Result<(), ApiError> = Err(ApiError::Status {
            status: 403,
            code: None,
            message: None,
        });
        assert!(Lookup::from_result(forbidden).is_err());

        assert_eq!(Lookup::from_result(Ok(7)).unwrap().found(), Some(7));
    }

    #[test]
    fn test_capacity_mode_from_capabilities() {
        let account = DatabaseAccount {
            id: Some("/x".to_string()),
            capabilities: vec!["EnableTable".to_string(), "EnableServerless".to_string()],
        };
        assert_eq!(account.capacity_mode(), CapacityMode::Serverless);

        let account = DatabaseAccount {
            id: Some("/x".to_string()),
            capabilities: vec!["EnableTable".to_string()],
        };
        assert_eq!(account.capacity_mode(), CapacityMode::Provisioned);
    }
}
