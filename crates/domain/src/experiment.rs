//! Experiment metadata announced to the Aggregator before a run.

use serde::{Deserialize, Serialize};

/// The `experiment.info` section of the configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub name: String,
    pub email: String,
    pub experiment_name: String,
    pub experiment_description: String,
}

/// Experiment announcement as sent over the wire.
///
/// The Aggregator distinguishes this message from device payloads by its
/// `info` member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentEnvelope {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub info: ExperimentInfo,
}

impl ExperimentEnvelope {
    /// Announce an experiment that started at `start_time`.
    #[must_use]
    pub fn started(info: ExperimentInfo, start_time: impl Into<String>) -> Self {
        Self {
            start_time: Some(start_time.into()),
            end_time: None,
            info,
        }
    }

    /// Serialize as one JSON object terminated by exactly one newline.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Make an experiment name safe to use in a file name.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.replace([' ', '/'], "_")
}
