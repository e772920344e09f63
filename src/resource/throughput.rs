//! Throughput sub-resource
//!
//! A table's capacity is either a fixed provisioned value or an autoscale
//! ceiling, and neither applies on serverless accounts. The rules here are
//! checked before any remote mutation:
//!
//! - fixed and autoscale throughput are mutually exclusive
//! - an update may not switch a table between fixed and autoscale
//! - serverless accounts are never asked for throughput at all
//! - throughput left out of the configuration is computed, not removed

use super::api::ThroughputSettings;
use super::error::ValidationError;
use super::model::DesiredState;

/// Capacity of a table as seen by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThroughputSetting {
    Fixed(u32),
    Autoscale { max_throughput: u32 },
    #[default]
    Unset,
}

impl ThroughputSetting {
    pub fn is_set(&self) -> bool {
        !matches!(self, ThroughputSetting::Unset)
    }
}

/// Capacity mode of the parent database account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMode {
    Provisioned,
    Serverless,
}

/// Serverless accounts reject throughput queries outright
pub fn is_queryable(mode: CapacityMode) -> bool {
    mode != CapacityMode::Serverless
}

/// The throughput the configuration asks for
pub fn desired_setting(desired: &DesiredState) -> Result<ThroughputSetting, ValidationError> {
    match (desired.throughput, desired.autoscale_settings) {
        (Some(_), Some(_)) => Err(ValidationError::ConflictingThroughput),
        (Some(throughput), None) => Ok(ThroughputSetting::Fixed(throughput)),
        (None, Some(autoscale)) => Ok(ThroughputSetting::Autoscale {
            max_throughput: autoscale.max_throughput,
        }),
        (None, None) => Ok(ThroughputSetting::Unset),
    }
}

/// Payload for a throughput update
pub fn build_update_payload(desired: &DesiredState) -> Result<ThroughputSetting, ValidationError> {
    match desired_setting(desired)? {
        ThroughputSetting::Unset => Err(ValidationError::MissingThroughput),
        setting => Ok(setting),
    }
}

/// Whether an update has to touch the throughput sub-resource
///
/// Throughput omitted from the configuration is computed by the service, so
/// it never counts as a change.
pub fn has_changed(observed: &ThroughputSetting, desired: &DesiredState) -> bool {
    match desired_setting(desired) {
        Ok(ThroughputSetting::Unset) => false,
        Ok(setting) => setting != *observed,
        Err(_) => true,
    }
}

/// Reject moving between fixed and autoscale throughput in one update
pub fn check_mode_switch(
    observed: &ThroughputSetting,
    desired: &DesiredState,
) -> Result<(), ValidationError> {
    match (observed, desired_setting(desired)?) {
        (ThroughputSetting::Fixed(_), ThroughputSetting::Autoscale { .. })
        | (ThroughputSetting::Autoscale { .. }, ThroughputSetting::Fixed(_)) => {
            Err(ValidationError::ThroughputModeSwitch)
        },
        _ => Ok(()),
    }
}

/// Map the API's throughput settings to a setting
///
/// When autoscale is on, the reported `throughput` is the current scaled
/// value and is not configuration.
pub fn observed_setting(settings: &ThroughputSettings) -> ThroughputSetting {
    match (settings.autoscale_max_throughput, settings.throughput) {
        (Some(max_throughput), _) => ThroughputSetting::Autoscale { max_throughput },
        (None, Some(throughput)) => ThroughputSetting::Fixed(throughput),
        (None, None) => ThroughputSetting::Unset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired() -> DesiredState {
        DesiredState::new("tbl1", "rg", "acc")
    }

    #[test]
    fn test_serverless_is_not_queryable() {
        assert!(is_queryable(CapacityMode::Provisioned));
        assert!(!is_queryable(CapacityMode::Serverless));
    }

    #[test]
    fn test_both_modes_conflict() {
        let both = desired().with_throughput(400).with_autoscale(4000);
        assert_eq!(desired_setting(&both), Err(ValidationError::ConflictingThroughput));
        assert_eq!(build_update_payload(&both), Err(ValidationError::ConflictingThroughput));
    }

    #[test]
    fn test_build_update_payload() {
        assert_eq!(
            build_update_payload(&desired().with_throughput(500)),
            Ok(ThroughputSetting::Fixed(500))
        );
        assert_eq!(
            build_update_payload(&desired().with_autoscale(4000)),
            Ok(ThroughputSetting::Autoscale { max_throughput: 4000 })
        );
        assert_eq!(build_update_payload(&desired()), Err(ValidationError::MissingThroughput));
    }

    #[test]
    fn test_omitted_throughput_is_never_a_change() {
        assert!(!has_changed(&ThroughputSetting::Fixed(400), &desired()));
        assert!(!has_changed(&ThroughputSetting::Unset, &desired()));
    }

    #[test]
    fn test_has_changed() {
        let fixed = ThroughputSetting::Fixed(400);
        assert!(!has_changed(&fixed, &desired().with_throughput(400)));
        assert!(has_changed(&fixed, &desired().with_throughput(500)));
        assert!(has_changed(&ThroughputSetting::Unset, &desired().with_throughput(400)));
        assert!(has_changed(
            &ThroughputSetting::Autoscale { max_throughput: 1000 },
            &desired().with_autoscale(2000)
        ));
    }

    #[test]
    fn test_mode_switch_rejected() {
        assert_eq!(
            check_mode_switch(&ThroughputSetting::Fixed(400), &desired().with_autoscale(4000)),
            Err(ValidationError::ThroughputModeSwitch)
        );
        assert_eq!(
            check_mode_switch(
                &ThroughputSetting::Autoscale { max_throughput: 4000 },
                &desired().with_throughput(400)
            ),
            Err(ValidationError::ThroughputModeSwitch)
        );
        assert!(check_mode_switch(&ThroughputSetting::Unset, &desired().with_autoscale(4000)).is_ok());
        assert!(check_mode_switch(&ThroughputSetting::Fixed(400), &desired()).is_ok());
    }

    #[test]
    fn test_observed_setting_prefers_autoscale() {
        let settings = ThroughputSettings {
            throughput: Some(400),
            autoscale_max_throughput: Some(4000),
        };
        assert_eq!(
            observed_setting(&settings),
            ThroughputSetting::Autoscale { max_throughput: 4000 }
        );
        let settings = ThroughputSettings {
            throughput: Some(400),
            autoscale_max_throughput: None,
        };
        assert_eq!(observed_setting(&settings), ThroughputSetting::Fixed(400));
    }
}
