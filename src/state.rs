//! State Store
//!
//! Persists the last observed state of every managed table, keyed by the
//! address the configuration gives it. Records written by older schema
//! versions are upgraded as they are loaded.

use crate::resource::id::IdParseError;
use crate::resource::migration::{self, MigrationError};
use crate::resource::model::{ObservedState, TableAttributes};
use crate::resource::schema::SCHEMA_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the state file envelope
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Default state file name, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "cosmotab.state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("accessing state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file format version {0} is not supported")]
    UnsupportedFormat(u32),

    #[error("upgrading state of {address}: {source}")]
    Migration {
        address: String,
        #[source]
        source: MigrationError,
    },

    #[error("decoding state of {address}: {source}")]
    Record {
        address: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("state of {address} has an invalid id: {source}")]
    MalformedId {
        address: String,
        #[source]
        source: IdParseError,
    },
}

/// Persisted state of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub schema_version: u32,
    pub id: String,
    pub attributes: TableAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    pub fn from_observed(observed: &ObservedState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            id: observed.id.to_string(),
            attributes: TableAttributes::from(observed),
            refreshed_at: Some(Utc::now()),
        }
    }

    pub fn observed(&self) -> Result<ObservedState, IdParseError> {
        ObservedState::from_attributes(&self.id, &self.attributes)
    }
}

#[derive(Deserialize)]
struct RawStateFile {
    version: u32,
    #[serde(default)]
    resources: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct StateFileRef<'a> {
    version: u32,
    resources: &'a BTreeMap<String, StateRecord>,
}

/// All managed tables
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
    resources: BTreeMap<String, StateRecord>,
}

impl StateFile {
    /// An empty state that will be saved at `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            resources: BTreeMap::new(),
        }
    }

    /// Load state from disk, upgrading old records
    ///
    /// A missing file is an empty state.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::empty(path));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| StateError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: RawStateFile =
            serde_json::from_str(&content).map_err(|source| StateError::Parse {
                path: path.clone(),
                source,
            })?;
        if raw.version != STATE_FORMAT_VERSION {
            return Err(StateError::UnsupportedFormat(raw.version));
        }

        let mut resources = BTreeMap::new();
        for (address, record) in raw.resources {
            let record = migration::upgrade_record(record).map_err(|source| {
                StateError::Migration {
                    address: address.clone(),
                    source,
                }
            })?;
            let record: StateRecord =
                serde_json::from_value(record).map_err(|source| StateError::Record {
                    address: address.clone(),
                    source,
                })?;
            resources.insert(address, record);
        }

        tracing::debug!("Loaded {} resources from {:?}", resources.len(), path);

        Ok(Self { path, resources })
    }

    /// Save state to disk
    ///
    /// Writes a sibling temporary file and renames it over the old state.
    pub fn save(&self) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = serde_json::to_string_pretty(&StateFileRef {
            version: STATE_FORMAT_VERSION,
            resources: &self.resources,
        })
        .map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, address: &str) -> Option<&StateRecord> {
        self.resources.get(address)
    }

    /// Observed state of an address, if it is managed
    pub fn observed(&self, address: &str) -> Result<Option<ObservedState>, StateError> {
        self.resources
            .get(address)
            .map(|record| {
                record.observed().map_err(|source| StateError::MalformedId {
                    address: address.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn put(&mut self, address: &str, observed: &ObservedState) {
        self.resources
            .insert(address.to_string(), StateRecord::from_observed(observed));
    }

    pub fn remove(&mut self, address: &str) -> Option<StateRecord> {
        self.resources.remove(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.resources.contains_key(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &StateRecord)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
