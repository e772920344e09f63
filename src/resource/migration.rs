//! State upgrades
//!
//! Persisted records carry the schema version they were written with.
//! Older records are migrated one version at a time, on the raw JSON, before
//! they are deserialized into typed attributes.

use super::schema::SCHEMA_VERSION;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("state was written by a newer schema version {found} (this build supports up to {current})")]
    UnsupportedVersion { found: u64, current: u32 },

    #[error("state record is not an object")]
    NotAnObject,

    #[error("state record has no string `id`")]
    MissingId,
}

type Upgrade = fn(Value) -> Result<Value, MigrationError>;

/// Upgrades indexed by the version they start from
const UPGRADES: &[Upgrade] = &[table_v0_to_v1];

/// Schema version stored in a raw record (records without one are version 0)
pub fn record_version(record: &Value) -> Result<u32, MigrationError> {
    let object = record.as_object().ok_or(MigrationError::NotAnObject)?;
    let Some(found) = object.get("schema_version").and_then(|v| v.as_u64()) else {
        return Ok(0);
    };
    u32::try_from(found).map_err(|_| MigrationError::UnsupportedVersion {
        found,
        current: SCHEMA_VERSION,
    })
}

/// Upgrade a raw record to the current schema version
pub fn upgrade_record(mut record: Value) -> Result<Value, MigrationError> {
    let version = record_version(&record)?;
    if version > SCHEMA_VERSION {
        return Err(MigrationError::UnsupportedVersion {
            found: u64::from(version),
            current: SCHEMA_VERSION,
        });
    }

    for (from, upgrade) in UPGRADES.iter().enumerate().skip(version as usize) {
        record = upgrade(record)?;
        if let Some(object) = record.as_object_mut() {
            object.insert("schema_version".to_string(), Value::from(from as u32 + 1));
        }
        tracing::debug!("Upgraded state record from schema version {} to {}", from, from + 1);
    }

    Ok(record)
}

/// Version 0 ids addressed tables through the `apis/table` path
fn table_v0_to_v1(mut record: Value) -> Result<Value, MigrationError> {
    let object = record.as_object_mut().ok_or(MigrationError::NotAnObject)?;
    let old_id = object
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or(MigrationError::MissingId)?;

    let new_id = old_id.replacen("/apis/table/tables/", "/tables/", 1);
    if new_id != old_id {
        tracing::info!("Updating table id from {:?} to {:?}", old_id, new_id);
    }
    object.insert("id".to_string(), Value::String(new_id));

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const V0_ID: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/acc/apis/table/tables/tbl1";
    const V1_ID: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/acc/tables/tbl1";

    #[test]
    fn test_v0_record_is_upgraded() {
        let record = json!({ "id": V0_ID, "attributes": { "name": "tbl1" } });
        let upgraded = upgrade_record(record).unwrap();
        assert_eq!(upgraded["id"], V1_ID);
        assert_eq!(upgraded["schema_version"], 1);
        assert_eq!(upgraded["attributes"]["name"], "tbl1");
    }

    #[test]
    fn test_current_record_is_untouched() {
        let record = json!({ "schema_version": 1, "id": V1_ID });
        assert_eq!(upgrade_record(record.clone()).unwrap(), record);
    }

    #[test]
    fn test_upgrade_is_idempotent_on_new_style_ids() {
        let record = json!({ "schema_version": 0, "id": V1_ID });
        assert_eq!(upgrade_record(record).unwrap()["id"], V1_ID);
    }

    #[test]
    fn test_newer_versions_are_rejected() {
        let record = json!({ "schema_version": 7, "id": V1_ID });
        assert_eq!(
            upgrade_record(record),
            Err(MigrationError::UnsupportedVersion { found: 7, current: 1 })
        );
    }

    #[test]
    fn test_versions_beyond_u32_are_rejected() {
        let record = json!({ "schema_version": 4_294_967_297u64, "id": V1_ID });
        assert_eq!(
            upgrade_record(record),
            Err(MigrationError::UnsupportedVersion {
                found: 4_294_967_297,
                current: 1
            })
        );
    }

    #[test]
    fn test_v0_record_without_id_fails() {
        assert_eq!(upgrade_record(json!({ "schema_version": 0 })), Err(MigrationError::MissingId));
        assert_eq!(upgrade_record(json!([1, 2])), Err(MigrationError::NotAnObject));
    }
}
