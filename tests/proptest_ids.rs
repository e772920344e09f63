//! Property-based tests using proptest
//!
//! These tests verify id parsing and formatting, attribute validation and
//! throughput rules using randomized inputs.

use cosmotab::resource::{schema, throughput, DesiredState, TableId, ThroughputSetting};
use proptest::prelude::*;

/// Generate an arbitrary id segment value
fn arb_segment() -> impl Strategy<Value = String> {
    "[^/]{1,40}"
}

/// Generate a table id from four segment values
fn arb_table_id() -> impl Strategy<Value = TableId> {
    (arb_segment(), arb_segment(), arb_segment(), arb_segment()).prop_map(
        |(subscription, group, account, name)| {
            TableId::new(&subscription, &group, &account, &name)
                .expect("segments without '/' are valid")
        },
    )
}

proptest! {
    /// Formatting and parsing an id gives the same id back
    #[test]
    fn test_id_round_trip(id in arb_table_id()) {
        let text = id.to_string();
        let parsed: TableId = text.parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Ids never parse with extra segments on the end
    #[test]
    fn test_trailing_segments_rejected(id in arb_table_id(), extra in "[a-z]{1,10}") {
        let text = format!("{}/{}", id, extra);
        prop_assert!(text.parse::<TableId>().is_err());
    }

    /// Ids never parse without the leading slash
    #[test]
    fn test_missing_leading_slash_rejected(id in arb_table_id()) {
        let text = id.to_string();
        prop_assert!(text[1..].parse::<TableId>().is_err());
    }

    /// Only the Cosmos DB provider namespace is accepted
    #[test]
    fn test_other_providers_rejected(id in arb_table_id(), provider in "Microsoft\\.[A-Z][a-z]{2,10}") {
        prop_assume!(provider != "Microsoft.DocumentDB");
        let text = id.to_string().replacen("Microsoft.DocumentDB", &provider, 1);
        prop_assert!(text.parse::<TableId>().is_err());
    }

    /// Request paths never contain raw spaces or extra separators
    #[test]
    fn test_request_path_is_encoded(id in arb_table_id()) {
        let path = id.to_request_path();
        prop_assert!(!path.contains(' '));
        prop_assert_eq!(path.matches('/').count(), 10);
    }

    /// Fixed throughput validity matches the 400 / step 100 rule
    #[test]
    fn test_throughput_validation(value in 0u32..100_000) {
        let valid = schema::validate_throughput(value).is_ok();
        prop_assert_eq!(valid, value >= 400 && value % 100 == 0);
    }

    /// Autoscale ceiling validity matches the 1000 / step 1000 rule
    #[test]
    fn test_max_throughput_validation(value in 0u32..1_000_000) {
        let valid = schema::validate_max_throughput(value).is_ok();
        prop_assert_eq!(valid, value >= 1000 && value % 1000 == 0);
    }

    /// Account names are accepted exactly when they fit the allowed alphabet and length
    #[test]
    fn test_account_name_validation(name in "[-a-zA-Z0-9_]{0,50}") {
        let expected = (3..=44).contains(&name.len())
            && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        prop_assert_eq!(schema::validate_account_name(&name).is_ok(), expected);
    }

    /// Setting both throughput kinds is always rejected before anything else
    #[test]
    fn test_conflicting_throughput_always_rejected(fixed in any::<u32>(), max in any::<u32>()) {
        let desired = DesiredState::new("tbl1", "rg", "acc")
            .with_throughput(fixed)
            .with_autoscale(max);
        prop_assert!(schema::validate(&desired).is_err());
        prop_assert!(throughput::desired_setting(&desired).is_err());
    }

    /// Omitted throughput never counts as a change
    #[test]
    fn test_omitted_throughput_is_never_a_change(value in 400u32..10_000) {
        let desired = DesiredState::new("tbl1", "rg", "acc");
        prop_assert!(!throughput::has_changed(&ThroughputSetting::Fixed(value), &desired));
        let autoscale = ThroughputSetting::Autoscale { max_throughput: value };
        prop_assert!(!throughput::has_changed(&autoscale, &desired));
    }
}

/// Deleting twice through the lifecycle never errors, driven by tokio-test
mod blocking_tests {
    use cosmotab::azure::auth::AzureCredentials;
    use cosmotab::azure::client::AzureClient;
    use cosmotab::azure::http::AzureHttpClient;
    use cosmotab::azure::operation::OperationContext;
    use cosmotab::resource::{lifecycle, ArmTableApi, TableId};
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_delete_is_idempotent() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("DELETE"))
                .respond_with(ResponseTemplate::new(200))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let client = AzureClient::new(
                AzureCredentials::static_token("t"),
                AzureHttpClient::new().unwrap(),
                "sub",
                url::Url::parse(&server.uri()).unwrap(),
            )
            .with_poll_interval(Duration::from_millis(1));
            let api = ArmTableApi::new(client);
            let id = TableId::new("sub", "rg", "acc", "tbl1").unwrap();
            let ctx = OperationContext::new();

            lifecycle::delete(&api, &ctx, &id).await.unwrap();
            lifecycle::delete(&api, &ctx, &id).await.unwrap();
        });
    }
}
