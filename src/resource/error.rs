//! Resource lifecycle errors

use super::id::IdParseError;
use crate::azure::error::ApiError;
use crate::azure::operation::WaitError;
use std::fmt::Display;
use thiserror::Error;

/// Configuration problems caught before any remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`throughput` and `autoscale_settings` cannot both be set")]
    ConflictingThroughput,

    #[error("no throughput is configured")]
    MissingThroughput,

    #[error("switching between autoscale and manually provisioned throughput is not supported")]
    ThroughputModeSwitch,

    #[error("throughput cannot be configured on serverless account {account}")]
    ServerlessThroughput { account: String },

    #[error("{attribute}: {reason}")]
    InvalidAttribute {
        attribute: &'static str,
        reason: String,
    },

    #[error("changing {} requires replacing the table", .attributes.join(", "))]
    RequiresReplacement { attributes: Vec<&'static str> },

    #[error("malformed resource id: {0}")]
    MalformedId(#[from] IdParseError),
}

/// Failure of a lifecycle operation
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{id} was not found")]
    NotFound { id: String },

    #[error(
        "a resource with the ID {id:?} already exists - to be managed it needs to be imported into the state"
    )]
    AlreadyExists { id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{action} {id}: {source}")]
    RemoteOperationFailed {
        action: &'static str,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error(
        "setting throughput for {id}: the table was not created with an initial throughput, so throughput cannot be configured later"
    )]
    ThroughputNotConfigurable { id: String },

    #[error("{action} {id}: timed out waiting for the operation to complete")]
    PollTimeout { action: &'static str, id: String },

    #[error("{action} {id}: cancelled")]
    Cancelled { action: &'static str, id: String },
}

impl ResourceError {
    pub(crate) fn remote(action: &'static str, id: &impl Display, source: ApiError) -> Self {
        ResourceError::RemoteOperationFailed {
            action,
            id: id.to_string(),
            source,
        }
    }

    pub(crate) fn wait(action: &'static str, id: &impl Display, error: WaitError) -> Self {
        let id = id.to_string();
        match error {
            WaitError::Api(source) => ResourceError::RemoteOperationFailed { action, id, source },
            WaitError::TimedOut => ResourceError::PollTimeout { action, id },
            WaitError::Cancelled => ResourceError::Cancelled { action, id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_carries_action_and_id() {
        let err = ResourceError::remote(
            "reading",
            &"/subscriptions/s/x",
            ApiError::Status {
                status: 500,
                code: None,
                message: None,
            },
        );
        assert_eq!(
            err.to_string(),
            "reading /subscriptions/s/x: API request failed with status 500"
        );
    }

    #[test]
    fn test_wait_error_classification() {
        assert!(matches!(
            ResourceError::wait("deleting", &"id", WaitError::TimedOut),
            ResourceError::PollTimeout { action: "deleting", .. }
        ));
        assert!(matches!(
            ResourceError::wait("deleting", &"id", WaitError::Cancelled),
            ResourceError::Cancelled { .. }
        ));
    }

    #[test]
    fn test_requires_replacement_lists_attributes() {
        let err = ValidationError::RequiresReplacement {
            attributes: vec!["name", "account_name"],
        };
        assert_eq!(err.to_string(), "changing name, account_name requires replacing the table");
    }
}
