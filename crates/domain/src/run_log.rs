//! Run log — the persisted summary of one experiment run.
//!
//! Holds the start/end timestamps, the experiment metadata and, per device,
//! the bound configuration together with the final measurement record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use toml::Table;

use crate::experiment::ExperimentInfo;
use crate::id::RunId;
use crate::record::MeasurementRecord;
use crate::time::Timestamp;

/// Everything written to the run-log artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub experiment: RunSummary,
    #[serde(default, rename = "device")]
    pub devices: BTreeMap<String, DeviceLog>,
}

/// Run-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ExperimentInfo>,
}

/// One device's block in the run log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceLog {
    #[serde(default)]
    pub config: Table,
    #[serde(default)]
    pub data: MeasurementRecord,
}

impl RunLog {
    /// Experiment name used to derive the artifact file name.
    #[must_use]
    pub fn experiment_name(&self) -> Option<&str> {
        self.experiment
            .info
            .as_ref()
            .map(|info| info.experiment_name.as_str())
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::TimeDelta {
        self.experiment.end_time - self.experiment.start_time
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn run_log() -> RunLog {
        let mut devices = BTreeMap::new();
        let mut config = Table::new();
        config.insert("gate_time".to_string(), toml::Value::Integer(2));
        devices.insert(
            "D1".to_string(),
            DeviceLog {
                config,
                data: MeasurementRecord::new().with("x", [1_i64]),
            },
        );
        RunLog {
            experiment: RunSummary {
                run_id: RunId::new(),
                start_time: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap(),
                end_time: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 10, 5, 0).unwrap(),
                info: None,
            },
            devices,
        }
    }

    #[test]
    fn should_roundtrip_through_toml() {
        let log = run_log();
        let text = toml::to_string(&log).unwrap();
        let parsed: RunLog = toml::from_str(&text).unwrap();
        assert_eq!(parsed, log);
    }

    #[test]
    fn should_nest_device_blocks_under_device_table() {
        let text = toml::to_string(&run_log()).unwrap();
        assert!(text.contains("[device.D1.config]"));
        assert!(text.contains("[device.D1.data]"));
    }

    #[test]
    fn should_compute_run_duration() {
        assert_eq!(run_log().duration(), chrono::TimeDelta::minutes(5));
    }

    #[test]
    fn should_have_no_experiment_name_without_info() {
        assert!(run_log().experiment_name().is_none());
    }
}
