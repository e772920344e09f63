//! Table schema
//!
//! Declares the configurable attributes of a table, their mutability and
//! their validation rules. Validation runs before any remote call.

use super::error::ValidationError;
use super::model::{DesiredState, ObservedState};
use super::throughput;

/// Current version of the persisted attribute layout
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Int,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    /// Optional in configuration, filled in from the API when omitted
    OptionalComputed,
}

/// One configurable attribute
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeType,
    pub presence: Presence,
    /// Changing the attribute requires destroying and recreating the table
    pub force_new: bool,
    pub conflicts_with: &'static [&'static str],
    pub description: &'static str,
}

pub const TABLE_SCHEMA: &[Attribute] = &[
    Attribute {
        name: "name",
        kind: AttributeType::String,
        presence: Presence::Required,
        force_new: true,
        conflicts_with: &[],
        description: "Name of the table",
    },
    Attribute {
        name: "resource_group_name",
        kind: AttributeType::String,
        presence: Presence::Required,
        force_new: true,
        conflicts_with: &[],
        description: "Resource group of the database account",
    },
    Attribute {
        name: "account_name",
        kind: AttributeType::String,
        presence: Presence::Required,
        force_new: true,
        conflicts_with: &[],
        description: "Cosmos DB account that owns the table",
    },
    Attribute {
        name: "throughput",
        kind: AttributeType::Int,
        presence: Presence::OptionalComputed,
        force_new: false,
        conflicts_with: &["autoscale_settings"],
        description: "Fixed provisioned throughput (RU/s)",
    },
    Attribute {
        name: "autoscale_settings",
        kind: AttributeType::Block,
        presence: Presence::OptionalComputed,
        force_new: false,
        conflicts_with: &["throughput"],
        description: "Autoscale ceiling (`max_throughput`, RU/s)",
    },
];

/// Look up an attribute by name
pub fn attribute(name: &str) -> Option<&'static Attribute> {
    TABLE_SCHEMA.iter().find(|a| a.name == name)
}

/// Validate a configuration without touching the remote API
pub fn validate(desired: &DesiredState) -> Result<(), ValidationError> {
    throughput::desired_setting(desired)?;

    check("name", validate_table_name(&desired.name))?;
    check(
        "resource_group_name",
        validate_resource_group_name(&desired.resource_group_name),
    )?;
    check("account_name", validate_account_name(&desired.account_name))?;

    if let Some(value) = desired.throughput {
        check("throughput", validate_throughput(value))?;
    }
    if let Some(autoscale) = desired.autoscale_settings {
        check(
            "autoscale_settings.max_throughput",
            validate_max_throughput(autoscale.max_throughput),
        )?;
    }

    Ok(())
}

/// Create-only attributes whose configured value differs from the table
pub fn replacement_attributes(prior: &ObservedState, desired: &DesiredState) -> Vec<&'static str> {
    TABLE_SCHEMA
        .iter()
        .filter(|a| a.force_new)
        .filter(|a| match a.name {
            "name" => prior.name != desired.name,
            "resource_group_name" => prior.resource_group_name != desired.resource_group_name,
            "account_name" => prior.account_name != desired.account_name,
            _ => false,
        })
        .map(|a| a.name)
        .collect()
}

fn check(attribute: &'static str, result: Result<(), String>) -> Result<(), ValidationError> {
    result.map_err(|reason| ValidationError::InvalidAttribute { attribute, reason })
}

/// Table names are 1-255 characters, must not end with a space and
/// must not contain `/`, `\`, `#` or `?`
pub fn validate_table_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if len == 0 || len > 255 {
        return Err(format!("must be between 1 and 255 characters: {:?}", name));
    }
    if name.ends_with(' ') {
        return Err(format!("must not end with a space: {:?}", name));
    }
    if name.contains(['/', '\\', '#', '?']) {
        return Err(format!("must not contain /, \\, # or ?: {:?}", name));
    }
    Ok(())
}

/// Account names are 3-44 lowercase letters, digits and hyphens
pub fn validate_account_name(name: &str) -> Result<(), String> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !(3..=44).contains(&name.len()) || !valid_chars {
        return Err(
            "must be 3 - 44 characters long and contain only lowercase letters, numbers and hyphens"
                .to_string(),
        );
    }
    Ok(())
}

/// Resource group names are 1-90 characters of alphanumerics, `-`, `_`,
/// `.`, `(` and `)`, and must not end with a period
pub fn validate_resource_group_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > 90 {
        return Err("may not exceed 90 characters in length".to_string());
    }
    if name.ends_with('.') {
        return Err("may not end with a period".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')'))
    {
        return Err(
            "may only contain alphanumeric characters, dash, underscores, parentheses and periods"
                .to_string(),
        );
    }
    Ok(())
}

/// Fixed throughput is at least 400 RU/s, in steps of 100
pub fn validate_throughput(value: u32) -> Result<(), String> {
    if value < 400 {
        return Err("must be a minimum of 400".to_string());
    }
    if value % 100 != 0 {
        return Err("must be set in increments of 100".to_string());
    }
    Ok(())
}

/// Autoscale max throughput is at least 1000 RU/s, in steps of 1000
pub fn validate_max_throughput(value: u32) -> Result<(), String> {
    if value < 1000 {
        return Err("must be a minimum of 1000".to_string());
    }
    if value % 1000 != 0 {
        return Err("must be set in increments of 1000".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::id::TableId;
    use crate::resource::throughput::ThroughputSetting;

    fn desired() -> DesiredState {
        DesiredState::new("tbl1", "rg-test", "acc-test")
    }

    #[test]
    fn test_schema_declares_conflicts_symmetrically() {
        for attr in TABLE_SCHEMA {
            for other in attr.conflicts_with {
                let other = attribute(other).expect("conflicting attribute is declared");
                assert!(other.conflicts_with.contains(&attr.name));
            }
        }
    }

    #[test]
    fn test_identity_attributes_are_create_only() {
        for name in ["name", "resource_group_name", "account_name"] {
            let attr = attribute(name).unwrap();
            assert!(attr.force_new);
            assert_eq!(attr.presence, Presence::Required);
        }
        assert!(!attribute("throughput").unwrap().force_new);
    }

    #[test]
    fn test_validate_accepts_minimal_config() {
        assert!(validate(&desired()).is_ok());
        assert!(validate(&desired().with_throughput(400)).is_ok());
        assert!(validate(&desired().with_autoscale(4000)).is_ok());
    }

    #[test]
    fn test_validate_reports_conflict_first() {
        let both = desired().with_throughput(1).with_autoscale(1);
        assert_eq!(validate(&both), Err(ValidationError::ConflictingThroughput));
    }

    #[test]
    fn test_validate_rejects_bad_throughput() {
        assert!(matches!(
            validate(&desired().with_throughput(300)),
            Err(ValidationError::InvalidAttribute { attribute: "throughput", .. })
        ));
        assert!(matches!(
            validate(&desired().with_throughput(450)),
            Err(ValidationError::InvalidAttribute { attribute: "throughput", .. })
        ));
        assert!(matches!(
            validate(&desired().with_autoscale(1500)),
            Err(ValidationError::InvalidAttribute {
                attribute: "autoscale_settings.max_throughput",
                ..
            })
        ));
    }

    #[test]
    fn test_table_name_rules() {
        assert!(validate_table_name("orders").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("trailing ").is_err());
        assert!(validate_table_name("a/b").is_err());
        assert!(validate_table_name("a#b").is_err());
        assert!(validate_table_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_account_name_rules() {
        assert!(validate_account_name("acc-1").is_ok());
        assert!(validate_account_name("ab").is_err());
        assert!(validate_account_name("Upper").is_err());
        assert!(validate_account_name(&"a".repeat(45)).is_err());
    }

    #[test]
    fn test_resource_group_rules() {
        assert!(validate_resource_group_name("my_rg-(1).x").is_ok());
        assert!(validate_resource_group_name("rg.").is_err());
        assert!(validate_resource_group_name("rg with space").is_err());
        assert!(validate_resource_group_name(&"r".repeat(91)).is_err());
    }

    #[test]
    fn test_replacement_attributes() {
        let prior = ObservedState {
            id: TableId::new("sub", "rg-test", "acc-test", "tbl1").unwrap(),
            name: "tbl1".to_string(),
            resource_group_name: "rg-test".to_string(),
            account_name: "acc-test".to_string(),
            throughput: ThroughputSetting::Fixed(400),
        };
        assert!(replacement_attributes(&prior, &desired().with_throughput(800)).is_empty());

        let mut moved = desired();
        moved.name = "tbl2".to_string();
        moved.account_name = "acc-other".to_string();
        assert_eq!(replacement_attributes(&prior, &moved), vec!["name", "account_name"]);
    }
}
