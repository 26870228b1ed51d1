//! Device core — state shared by every device family.
//!
//! Owns the bound configuration, the measurement record, the lifecycle state
//! and the telemetry capability. Family implementations drive their hardware
//! and delegate every state transition and record update to this type.

use std::path::Path;
use std::time::Duration;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::{
    ConfigError, DeviceInitError, HardwareFault, LabError, LifecycleError, TransferError,
};
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;
use serde::de::DeserializeOwned;

use super::config_binder::bind_config;
use super::telemetry::Telemetry;
use crate::ports::{Hardware, WireConnector, WireLink, WireSettings};

/// Lifecycle, configuration, record and telemetry of one device.
#[derive(Debug)]
pub struct DeviceCore<L> {
    config: BoundConfig,
    record: MeasurementRecord,
    state: LifecycleState,
    telemetry: Telemetry<L>,
}

impl<L: WireLink> DeviceCore<L> {
    /// Assemble a core from an already bound configuration.
    pub fn new(config: BoundConfig, telemetry: Telemetry<L>) -> Self {
        Self {
            config,
            record: MeasurementRecord::new(),
            state: LifecycleState::Constructed,
            telemetry,
        }
    }

    /// Bind `name` to the document at `config_path` and open telemetry.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Config`] when the document cannot be loaded.
    /// Telemetry failures never surface here.
    pub async fn bind<C>(
        config_path: &Path,
        name: &str,
        connector: &C,
        wire: &WireSettings,
    ) -> Result<Self, LabError>
    where
        C: WireConnector<Link = L>,
    {
        let config = bind_config(config_path, name).await?;
        let telemetry = Telemetry::connect(name, connector, wire).await;
        Ok(Self::new(config, telemetry))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.config.device_name()
    }

    #[must_use]
    pub fn config(&self) -> &BoundConfig {
        &self.config
    }

    #[must_use]
    pub fn record(&self) -> &MeasurementRecord {
        &self.record
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry<L> {
        &self.telemetry
    }

    /// Look up a required key anywhere in the bound config.
    ///
    /// Logs a warning when the key occurs in more than one nested section.
    ///
    /// # Errors
    ///
    /// [`LabError::MissingConfigKey`] when absent, [`LabError::Config`] when
    /// the value has the wrong type.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, LabError> {
        self.warn_if_ambiguous(key);
        self.config.require_as(key)
    }

    /// Look up an optional key, falling back to `default`.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] when the key exists with the wrong type.
    pub fn optional<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, LabError> {
        self.warn_if_ambiguous(key);
        Ok(self.config.get_as(key)?.unwrap_or(default))
    }

    /// Optional positive duration given in seconds.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] when the value is not a positive number.
    pub fn optional_duration(&self, key: &str, default: Duration) -> Result<Duration, LabError> {
        self.warn_if_ambiguous(key);
        let Some(seconds) = self.config.get_as::<f64>(key)? else {
            return Ok(default);
        };
        Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|duration| !duration.is_zero())
            .ok_or_else(|| self.invalid(key, "must be a positive number of seconds"))
    }

    /// Build an [`InvalidValue`](ConfigError::InvalidValue) error for `key`.
    #[must_use]
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> LabError {
        ConfigError::InvalidValue {
            key: format!("{}.{key}", self.name()),
            reason: reason.into(),
        }
        .into()
    }

    fn warn_if_ambiguous(&self, key: &str) {
        let occurrences = self.config.occurrences(key);
        if occurrences > 1 {
            tracing::warn!(
                device = %self.name(),
                key,
                occurrences,
                "configuration key is ambiguous, using the first match"
            );
        }
    }

    /// Fail unless `allowed(state)` holds.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] naming `operation` and the current state.
    pub fn ensure(
        &self,
        operation: &'static str,
        allowed: fn(LifecycleState) -> bool,
    ) -> Result<(), LifecycleError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(self.refuse(operation))
        }
    }

    /// Lifecycle error for `operation` in the current state.
    #[must_use]
    pub fn refuse(&self, operation: &'static str) -> LifecycleError {
        LifecycleError {
            device: self.name().to_string(),
            operation,
            state: self.state,
        }
    }

    /// Enter a new lifecycle state.
    pub fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            tracing::debug!(device = %self.name(), from = %self.state, to = %next, "lifecycle transition");
            self.state = next;
        }
    }

    /// Guard for `setup_config()`.
    ///
    /// # Errors
    ///
    /// Fails while measuring or after close.
    pub fn begin_setup(&self) -> Result<(), LifecycleError> {
        self.ensure("configure", LifecycleState::can_configure)
    }

    /// `Ready → Measuring`.
    ///
    /// # Errors
    ///
    /// Fails unless the device is `Ready`.
    pub fn begin_measure(&mut self) -> Result<(), LifecycleError> {
        self.ensure("measure", LifecycleState::can_measure)?;
        self.transition(LifecycleState::Measuring);
        Ok(())
    }

    /// Complete a measurement started with [`begin_measure`](Self::begin_measure).
    ///
    /// On success the readings overwrite the record, the payload is published
    /// and the device returns to `Ready`; the returned record is a snapshot.
    /// On failure the device becomes `Uncertain` and nothing is published.
    ///
    /// # Errors
    ///
    /// Propagates `outcome`'s error.
    pub async fn finish_measure(
        &mut self,
        outcome: Result<MeasurementRecord, LabError>,
    ) -> Result<MeasurementRecord, LabError> {
        match outcome {
            Ok(readings) => {
                self.record.overwrite(readings);
                self.publish().await;
                self.transition(LifecycleState::Ready);
                Ok(self.record.clone())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Send the current record to the Aggregator, if connected.
    pub async fn publish(&mut self) {
        if !self.telemetry.is_connected() {
            return;
        }
        let payload = self.telemetry.build_payload(&self.config, &self.record);
        self.telemetry.send_payload(&payload).await;
    }

    /// Mark the device `Uncertain` and hand the error back.
    pub fn fail(&mut self, err: LabError) -> LabError {
        tracing::warn!(device = %self.name(), error = %err, "device left in uncertain state");
        self.transition(LifecycleState::Uncertain);
        err
    }

    /// Elevate a vendor success flag to a [`TransferError`].
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when `outcome` is `Ok(false)` or a fault.
    pub fn check(
        &self,
        operation: &'static str,
        outcome: Result<bool, HardwareFault>,
    ) -> Result<(), TransferError> {
        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.transfer_error(operation, HardwareFault::Rejected)),
            Err(fault) => Err(self.transfer_error(operation, fault)),
        }
    }

    /// Attach device and operation context to a vendor fault.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when `outcome` is a fault.
    pub fn fetched<T>(
        &self,
        operation: &'static str,
        outcome: Result<T, HardwareFault>,
    ) -> Result<T, TransferError> {
        outcome.map_err(|fault| self.transfer_error(operation, fault))
    }

    fn transfer_error(&self, operation: &'static str, source: HardwareFault) -> TransferError {
        TransferError {
            device: self.name().to_string(),
            operation,
            source,
        }
    }

    /// Open `hardware`, mapping any failure to [`DeviceInitError`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceInitError`] if the instrument is missing or refuses to open.
    pub async fn open_hardware<H: Hardware>(&self, hardware: &mut H) -> Result<(), DeviceInitError> {
        let source = match hardware.open().await {
            Ok(true) => {
                tracing::info!(device = %self.name(), "hardware opened");
                return Ok(());
            }
            Ok(false) => HardwareFault::Rejected,
            Err(fault) => fault,
        };
        Err(DeviceInitError {
            device: self.name().to_string(),
            source,
        })
    }

    /// Release `hardware` and telemetry. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] if the vendor refuses to release the handle;
    /// the device is `Closed` regardless.
    pub async fn close<H: Hardware>(&mut self, hardware: &mut H) -> Result<(), LabError> {
        if self.state == LifecycleState::Closed {
            return Ok(());
        }
        let released = hardware.close().await;
        self.telemetry.close().await;
        self.transition(LifecycleState::Closed);
        tracing::info!(device = %self.name(), "device closed");
        self.fetched("close", released)?;
        Ok(())
    }
}
