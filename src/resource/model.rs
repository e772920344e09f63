//! Desired and observed table state
//!
//! [`DesiredState`] is what the caller asked for, in the raw shape of the
//! configuration (so invalid combinations can still be represented and
//! rejected). [`ObservedState`] is rebuilt from the remote API on every read.
//! [`TableAttributes`] is the flat layout persisted in the state file.

use super::id::{IdParseError, TableId};
use super::throughput::ThroughputSetting;
use serde::{Deserialize, Serialize};

/// Autoscale block of the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoscaleSettings {
    pub max_throughput: u32,
}

/// Configuration of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredState {
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscale_settings: Option<AutoscaleSettings>,
}

impl DesiredState {
    pub fn new(name: &str, resource_group_name: &str, account_name: &str) -> Self {
        Self {
            name: name.to_string(),
            resource_group_name: resource_group_name.to_string(),
            account_name: account_name.to_string(),
            throughput: None,
            autoscale_settings: None,
        }
    }

    pub fn with_throughput(mut self, throughput: u32) -> Self {
        self.throughput = Some(throughput);
        self
    }

    pub fn with_autoscale(mut self, max_throughput: u32) -> Self {
        self.autoscale_settings = Some(AutoscaleSettings { max_throughput });
        self
    }

    /// Whether the configuration manages throughput at all
    pub fn declares_throughput(&self) -> bool {
        self.throughput.is_some() || self.autoscale_settings.is_some()
    }
}

/// What the remote API reported on the last read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub id: TableId,
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    pub throughput: ThroughputSetting,
}

impl ObservedState {
    /// Rebuild observed state from a persisted record
    pub fn from_attributes(id: &str, attributes: &TableAttributes) -> Result<Self, IdParseError> {
        let id: TableId = id.parse()?;
        let throughput = match (attributes.autoscale_settings.first(), attributes.throughput) {
            (Some(autoscale), _) => ThroughputSetting::Autoscale {
                max_throughput: autoscale.max_throughput,
            },
            (None, Some(throughput)) => ThroughputSetting::Fixed(throughput),
            (None, None) => ThroughputSetting::Unset,
        };

        Ok(Self {
            id,
            name: attributes.name.clone(),
            resource_group_name: attributes.resource_group_name.clone(),
            account_name: attributes.account_name.clone(),
            throughput,
        })
    }

    /// The configuration that would reproduce this table as-is
    pub fn to_desired(&self) -> DesiredState {
        let desired = DesiredState::new(&self.name, &self.resource_group_name, &self.account_name);
        match self.throughput {
            ThroughputSetting::Fixed(throughput) => desired.with_throughput(throughput),
            ThroughputSetting::Autoscale { max_throughput } => desired.with_autoscale(max_throughput),
            ThroughputSetting::Unset => desired,
        }
    }
}

/// Flat attribute set persisted for each table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAttributes {
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    #[serde(default)]
    pub throughput: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub autoscale_settings: Vec<AutoscaleSettings>,
}

impl From<&ObservedState> for TableAttributes {
    fn from(observed: &ObservedState) -> Self {
        let (throughput, autoscale_settings) = match observed.throughput {
            ThroughputSetting::Fixed(throughput) => (Some(throughput), Vec::new()),
            ThroughputSetting::Autoscale { max_throughput } => {
                (None, vec![AutoscaleSettings { max_throughput }])
            },
            ThroughputSetting::Unset => (None, Vec::new()),
        };

        Self {
            name: observed.name.clone(),
            resource_group_name: observed.resource_group_name.clone(),
            account_name: observed.account_name.clone(),
            throughput,
            autoscale_settings,
        }
    }
}
