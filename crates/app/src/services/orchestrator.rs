//! Experiment orchestrator — top-level driver of one experiment run.
//!
//! A run loads the configuration document once, announces the experiment to
//! the Aggregator, hands control to a caller-supplied measurement routine and
//! finally persists a [`RunLog`] with every device's bound configuration and
//! last measurement record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rexlab_domain::error::LabError;
use rexlab_domain::experiment::{ExperimentEnvelope, ExperimentInfo};
use rexlab_domain::id::RunId;
use rexlab_domain::record::MeasurementRecord;
use rexlab_domain::run_log::{DeviceLog, RunLog, RunSummary};
use rexlab_domain::time::{self, Timestamp};

use crate::ports::{RunLogStore, WireConnector, WireLink, WireSettings};
use crate::services::config_binder::load_document;
use crate::services::telemetry::Telemetry;

/// Device name used in telemetry logs for the experiment announcement.
const ANNOUNCER: &str = "experiment";

/// What a measurement routine receives.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    /// Path of the configuration document each device binds against.
    pub config_path: PathBuf,
    /// Aggregator settings for this run; devices open their own links with it.
    pub wire: WireSettings,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub log: RunLog,
    /// Where the store put the log.
    pub location: String,
}

/// Drives experiment runs against one configuration document.
pub struct ExperimentOrchestrator<C, S> {
    config_path: PathBuf,
    wire: WireSettings,
    connector: C,
    store: S,
}

impl<C: WireConnector, S: RunLogStore> ExperimentOrchestrator<C, S> {
    /// Create an orchestrator for the document at `config_path`.
    pub fn new(config_path: impl Into<PathBuf>, wire: WireSettings, connector: C, store: S) -> Self {
        Self {
            config_path: config_path.into(),
            wire,
            connector,
            store,
        }
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub fn wire(&self) -> &WireSettings {
        &self.wire
    }

    /// Run one experiment.
    ///
    /// `routine` owns device construction and sequencing and returns the
    /// final record of every device it drove, keyed by device name.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Config`] if the document cannot be loaded or its
    /// `experiment.info` section is malformed, any error returned by
    /// `routine` (no log is written then), or a [`LabError::Storage`] from
    /// the run-log store. An unreachable Aggregator is not an error.
    #[tracing::instrument(skip(self, routine), fields(config = %self.config_path.display()))]
    pub async fn start<F>(&self, routine: F) -> Result<RunOutcome, LabError>
    where
        F: AsyncFnOnce(RunContext) -> Result<BTreeMap<String, MeasurementRecord>, LabError>,
    {
        let run_id = RunId::new();
        let start_time = time::now();
        let document = load_document(&self.config_path).await?;
        let info = document.experiment_info()?;

        let mut announcer: Telemetry<C::Link> =
            Telemetry::connect(ANNOUNCER, &self.connector, &self.wire).await;
        announce(&mut announcer, info.as_ref(), start_time).await;
        tracing::info!(%run_id, "experiment started");

        let context = RunContext {
            run_id,
            config_path: self.config_path.clone(),
            wire: self.wire.clone(),
        };
        let records = match routine(context).await {
            Ok(records) => records,
            Err(err) => {
                announcer.close().await;
                tracing::warn!(%run_id, error = %err, "measurement routine failed, no run log written");
                return Err(err);
            }
        };
        let end_time = time::now().max(start_time);
        announcer.close().await;

        let devices = records
            .into_iter()
            .map(|(name, data)| {
                let bound = document.bind(&name);
                if bound.is_empty() {
                    tracing::warn!(device = %name, "device has no configuration section");
                }
                let block = DeviceLog {
                    config: bound.snapshot(),
                    data,
                };
                (name, block)
            })
            .collect();
        let log = RunLog {
            experiment: RunSummary {
                run_id,
                start_time,
                end_time,
                info,
            },
            devices,
        };
        let location = self.store.persist(&log).await?;
        tracing::info!(
            %run_id,
            %location,
            devices = log.devices.len(),
            duration_ms = log.duration().num_milliseconds(),
            "experiment finished"
        );
        Ok(RunOutcome { log, location })
    }
}

async fn announce<L: WireLink>(
    announcer: &mut Telemetry<L>,
    info: Option<&ExperimentInfo>,
    start_time: Timestamp,
) {
    if !announcer.is_connected() {
        return;
    }
    let Some(info) = info else {
        tracing::warn!("no experiment.info section, experiment not announced");
        return;
    };
    match ExperimentEnvelope::started(info.clone(), time::log_stamp(start_time)).to_json_line() {
        Ok(line) => {
            announcer.send_line(&line).await;
        }
        Err(err) => {
            tracing::warn!(error = %err, "experiment info not serializable, not announced");
        }
    }
}
