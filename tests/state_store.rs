//! State file tests
//!
//! Round-trips state through a temporary directory and checks that records
//! written by older schema versions are upgraded on load.

use cosmotab::resource::{ObservedState, TableId, ThroughputSetting};
use cosmotab::state::{StateError, StateFile, STATE_FORMAT_VERSION};
use serde_json::json;

const ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/acc/tables/tbl1";
const V0_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/acc/apis/table/tables/tbl1";

fn observed(throughput: ThroughputSetting) -> ObservedState {
    let id: TableId = ID.parse().unwrap();
    ObservedState {
        name: id.name.clone(),
        resource_group_name: id.resource_group.clone(),
        account_name: id.account_name.clone(),
        id,
        throughput,
    }
}

#[test]
fn test_missing_file_is_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateFile::load(dir.path().join("absent.json")).unwrap();
    assert!(state.is_empty());
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut state = StateFile::empty(&path);
    state.put("orders", &observed(ThroughputSetting::Fixed(400)));
    state.put(
        "events",
        &observed(ThroughputSetting::Autoscale { max_throughput: 4000 }),
    );
    state.save().unwrap();

    let loaded = StateFile::load(&path).unwrap();
    assert_eq!(loaded.addresses(), vec!["events".to_string(), "orders".to_string()]);
    assert_eq!(
        loaded.observed("orders").unwrap(),
        Some(observed(ThroughputSetting::Fixed(400)))
    );
    assert_eq!(
        loaded.observed("events").unwrap().unwrap().throughput,
        ThroughputSetting::Autoscale { max_throughput: 4000 }
    );
    assert!(loaded.get("orders").unwrap().refreshed_at.is_some());
    assert!(!dir.path().join("nested").join("state.json.tmp").exists());
}

#[test]
fn test_remove_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut state = StateFile::empty(&path);
    state.put("orders", &observed(ThroughputSetting::Unset));
    state.save().unwrap();
    assert!(state.remove("orders").is_some());
    state.save().unwrap();

    let loaded = StateFile::load(&path).unwrap();
    assert!(!loaded.contains("orders"));
    assert_eq!(loaded.len(), 0);
}

#[test]
fn test_v0_records_are_upgraded_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let content = json!({
        "version": STATE_FORMAT_VERSION,
        "resources": {
            "orders": {
                "id": V0_ID,
                "attributes": {
                    "name": "tbl1",
                    "resource_group_name": "rg",
                    "account_name": "acc",
                    "throughput": 400
                }
            }
        }
    });
    std::fs::write(&path, content.to_string()).unwrap();

    let state = StateFile::load(&path).unwrap();
    let record = state.get("orders").unwrap();
    assert_eq!(record.schema_version, 1);
    assert_eq!(record.id, ID);
    assert_eq!(
        state.observed("orders").unwrap(),
        Some(observed(ThroughputSetting::Fixed(400)))
    );
}

#[test]
fn test_newer_records_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let content = json!({
        "version": STATE_FORMAT_VERSION,
        "resources": {
            "orders": { "schema_version": 99, "id": ID, "attributes": {} }
        }
    });
    std::fs::write(&path, content.to_string()).unwrap();

    let err = StateFile::load(&path).unwrap_err();
    assert!(matches!(err, StateError::Migration { ref address, .. } if address == "orders"));
}

#[test]
fn test_unknown_envelope_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"version": 42, "resources": {}}"#).unwrap();

    assert!(matches!(
        StateFile::load(&path),
        Err(StateError::UnsupportedFormat(42))
    ));
}

#[test]
fn test_garbage_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(matches!(StateFile::load(&path), Err(StateError::Parse { .. })));
}
