//! Resource identifiers
//!
//! Parses and formats the ARM ids of Cosmos DB accounts and tables:
//!
//! ```text
//! /subscriptions/{s}/resourceGroups/{g}/providers/Microsoft.DocumentDB/databaseAccounts/{a}/tables/{n}
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource provider namespace of Cosmos DB
pub const PROVIDER_NAMESPACE: &str = "Microsoft.DocumentDB";

/// Key/value segment pairs of a table id, in order
const TABLE_KEYS: [&str; 5] = [
    "subscriptions",
    "resourceGroups",
    "providers",
    "databaseAccounts",
    "tables",
];

/// Why a string is not a valid resource id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("resource id {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    #[error("expected segment {expected:?} but found {found:?}")]
    UnexpectedSegment {
        expected: &'static str,
        found: String,
    },

    #[error("resource id is missing the {0:?} segment")]
    MissingSegment(&'static str),

    #[error("the {0:?} segment has an empty value")]
    EmptyValue(&'static str),

    #[error("expected provider namespace \"Microsoft.DocumentDB\" but found {0:?}")]
    WrongProvider(String),

    #[error("unexpected trailing segments {0:?}")]
    TrailingSegments(String),

    #[error("{0} must be non-empty and must not contain '/'")]
    InvalidField(&'static str),
}

/// Id of the Cosmos DB account that owns a table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl AccountId {
    /// Percent-encoded request path
    pub fn to_request_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/databaseAccounts/{}",
            urlencoding::encode(&self.subscription_id),
            urlencoding::encode(&self.resource_group),
            PROVIDER_NAMESPACE,
            urlencoding::encode(&self.name)
        )
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/databaseAccounts/{}",
            self.subscription_id, self.resource_group, PROVIDER_NAMESPACE, self.name
        )
    }
}

/// Id of a Cosmos DB table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub subscription_id: String,
    pub resource_group: String,
    pub account_name: String,
    pub name: String,
}

impl TableId {
    /// Build an id from its parts. Every part must be non-empty and free of `/`.
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        account_name: &str,
        name: &str,
    ) -> Result<Self, IdParseError> {
        for (field, value) in [
            ("subscription_id", subscription_id),
            ("resource_group", resource_group),
            ("account_name", account_name),
            ("name", name),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(IdParseError::InvalidField(field));
            }
        }

        Ok(Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            account_name: account_name.to_string(),
            name: name.to_string(),
        })
    }

    pub fn account_id(&self) -> AccountId {
        AccountId {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            name: self.account_name.clone(),
        }
    }

    /// Percent-encoded request path
    pub fn to_request_path(&self) -> String {
        format!(
            "{}/tables/{}",
            self.account_id().to_request_path(),
            urlencoding::encode(&self.name)
        )
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/tables/{}", self.account_id(), self.name)
    }
}

impl FromStr for TableId {
    type Err = IdParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let Some(rest) = text.strip_prefix('/') else {
            return Err(IdParseError::MissingLeadingSlash(text.to_string()));
        };

        let mut segments = rest.split('/');
        let mut values = Vec::with_capacity(TABLE_KEYS.len());

        for key in TABLE_KEYS {
            match segments.next() {
                Some(found) if found == key => {},
                Some("") | None => return Err(IdParseError::MissingSegment(key)),
                Some(found) => {
                    return Err(IdParseError::UnexpectedSegment {
                        expected: key,
                        found: found.to_string(),
                    })
                },
            }

            let value = segments.next().unwrap_or_default();
            if value.is_empty() {
                return Err(IdParseError::EmptyValue(key));
            }
            values.push(value);
        }

        let trailing: Vec<&str> = segments.collect();
        if !trailing.is_empty() {
            return Err(IdParseError::TrailingSegments(trailing.join("/")));
        }

        if values[2] != PROVIDER_NAMESPACE {
            return Err(IdParseError::WrongProvider(values[2].to_string()));
        }

        Ok(Self {
            subscription_id: values[0].to_string(),
            resource_group: values[1].to_string(),
            account_name: values[3].to_string(),
            name: values[4].to_string(),
        })
    }
}
