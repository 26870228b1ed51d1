//! Run-log store port — persistence of finished experiment runs.

use std::future::Future;

use rexlab_domain::error::LabError;
use rexlab_domain::run_log::RunLog;

/// Persists [`RunLog`]s.
pub trait RunLogStore: Sync {
    /// Write the log and return a human-readable location (e.g. a file path).
    fn persist(&self, log: &RunLog) -> impl Future<Output = Result<String, LabError>> + Send;
}
