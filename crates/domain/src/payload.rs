//! Device telemetry payload sent to the Aggregator.

use serde::{Deserialize, Serialize};
use toml::Table;

use crate::record::MeasurementRecord;

/// Envelope carrying one device's configuration and current readings.
///
/// Built fresh for every send; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub device_name: String,
    pub device_config: Table,
    pub measurements: MeasurementRecord,
    /// Seconds since the device was constructed.
    pub elapsed_time_since_init: f64,
}

impl Payload {
    /// Serialize as one JSON object terminated by exactly one newline.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a value cannot be represented in JSON.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Payload {
        let mut config = Table::new();
        config.insert("gate_time".to_string(), toml::Value::Integer(2));
        config.insert("averages".to_string(), toml::Value::Integer(3));
        Payload {
            device_name: "DAQ1".to_string(),
            device_config: config,
            measurements: MeasurementRecord::new().with("counts", [5.0]),
            elapsed_time_since_init: 1.25,
        }
    }

    #[test]
    fn should_serialize_to_single_line_terminated_by_one_newline() {
        let line = payload().to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        assert!(!line.ends_with("\n\n"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn should_carry_expected_members() {
        let line = payload().to_json_line().unwrap();
        let json: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(json["device_name"], "DAQ1");
        assert_eq!(json["device_config"]["gate_time"], 2);
        assert_eq!(json["measurements"], serde_json::json!({"counts": [5.0]}));
        assert_eq!(json["elapsed_time_since_init"], 1.25);
    }

    #[test]
    fn should_decode_back_to_the_same_payload() {
        let original = payload();
        let line = original.to_json_line().unwrap();
        let decoded: Payload = serde_json::from_str(&line).unwrap();
        assert_eq!(decoded, original);
    }
}
