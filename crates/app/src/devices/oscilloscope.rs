//! Digital storage oscilloscope.
//!
//! In `area` mode a measurement integrates (sums) the fetched waveform; with
//! `reset_per` the averaging buffer is restarted for every measurement and
//! the scope dwells `averages / frequency + 1` seconds before the fetch. In
//! `trace` mode the full waveform is stored.

use std::path::Path;
use std::time::Duration;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::{LabError, TransferError};
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::{MeasurementRecord, MeasurementValue};
use serde::Deserialize;

use super::Device;
use crate::ports::hardware::ScopeSettings;
use crate::ports::{ScopeHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;

pub const VOLTAGE: &str = "voltage (mV)";
pub const TIME: &str = "time (s)";

/// Acquisition mode the scope returns to after a reset-per-measurement dwell.
const SAMPLING_MODE: &str = "SAMPLING";

/// What a measurement stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Sum of the waveform.
    Area,
    /// The whole waveform.
    Trace,
}

#[derive(Debug, Clone, PartialEq)]
struct Acquisition {
    settings: ScopeSettings,
    data_type: DataType,
    reset_per: bool,
    /// Wait before a reset-per-measurement fetch: `averages / frequency + 1` s.
    dwell: Duration,
}

#[derive(Debug)]
pub struct Oscilloscope<H, L> {
    core: DeviceCore<L>,
    hardware: H,
    acquisition: Option<Acquisition>,
}

impl<H: ScopeHardware, L: WireLink> Oscilloscope<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the scope.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the scope cannot be opened.
    pub async fn construct<C>(
        config_path: &Path,
        name: &str,
        hardware: H,
        connector: &C,
        wire: &WireSettings,
    ) -> Result<Self, LabError>
    where
        C: WireConnector<Link = L>,
    {
        let core = DeviceCore::bind(config_path, name, connector, wire).await?;
        Self::with_core(core, hardware).await
    }

    /// Open `hardware` behind an already assembled core.
    ///
    /// # Errors
    ///
    /// [`LabError::DeviceInit`] if the scope cannot be opened.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self {
            core,
            hardware,
            acquisition: None,
        })
    }

    fn read_acquisition(&self) -> Result<Acquisition, LabError> {
        let acquisition_mode: String = self.core.require("acquisition_mode")?;
        let averages: u32 = self.core.require("averages")?;
        let data_type: DataType = self.core.require("data_type")?;
        let reset_per: bool = self.core.require("reset_per")?;
        let frequency: f64 = self.core.require("frequency")?;
        let channel: String = self.core.require("channel")?;
        if averages == 0 {
            return Err(self.core.invalid("averages", "must be at least 1"));
        }
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(self.core.invalid("frequency", "must be a positive number of hertz"));
        }
        let dwell = Duration::try_from_secs_f64(f64::from(averages) / frequency + 1.0)
            .map_err(|_| {
                self.core.invalid(
                    "frequency",
                    format!("{averages} averages at {frequency} Hz never complete"),
                )
            })?;
        Ok(Acquisition {
            settings: ScopeSettings {
                acquisition_mode,
                averages,
                channel,
            },
            data_type,
            reset_per,
            dwell,
        })
    }

    async fn fetch(&mut self, acquisition: &Acquisition) -> Result<MeasurementRecord, TransferError> {
        let settings = &acquisition.settings;
        let record = match acquisition.data_type {
            DataType::Area if acquisition.reset_per => {
                self.core.check(
                    "set_acquisition",
                    self.hardware
                        .set_acquisition(&settings.acquisition_mode, settings.averages)
                        .await,
                )?;
                tokio::time::sleep(acquisition.dwell).await;
                let waveform = self.core.fetched("read", self.hardware.read().await)?;
                self.core.check(
                    "set_acquisition",
                    self.hardware.set_acquisition(SAMPLING_MODE, 1).await,
                )?;
                MeasurementRecord::new().with(VOLTAGE, [waveform.voltage.iter().sum::<f64>()])
            }
            DataType::Area => {
                let waveform = self.core.fetched("read", self.hardware.read().await)?;
                MeasurementRecord::new().with(VOLTAGE, [waveform.voltage.iter().sum::<f64>()])
            }
            DataType::Trace => {
                let waveform = self.core.fetched("read", self.hardware.read().await)?;
                MeasurementRecord::new()
                    .with(VOLTAGE, [MeasurementValue::Trace(waveform.voltage)])
                    .with(TIME, [MeasurementValue::Trace(waveform.time)])
            }
        };
        Ok(record)
    }
}

impl<H: ScopeHardware, L: WireLink> Device for Oscilloscope<H, L> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn state(&self) -> LifecycleState {
        self.core.state()
    }

    fn config(&self) -> &BoundConfig {
        self.core.config()
    }

    fn record(&self) -> &MeasurementRecord {
        self.core.record()
    }

    #[tracing::instrument(skip(self), fields(device = %self.core.name()))]
    async fn setup_config(&mut self) -> Result<(), LabError> {
        self.core.begin_setup()?;
        let acquisition = self.read_acquisition()?;
        let applied = self.hardware.configure(&acquisition.settings).await;
        if let Err(err) = self.core.check("configure", applied) {
            return Err(self.core.fail(err.into()));
        }
        self.acquisition = Some(acquisition);
        self.core.transition(LifecycleState::Configured);
        self.core.transition(LifecycleState::Ready);
        Ok(())
    }

    async fn measure(&mut self) -> Result<MeasurementRecord, LabError> {
        let acquisition = self
            .acquisition
            .clone()
            .ok_or_else(|| self.core.refuse("measure"))?;
        self.core.begin_measure()?;
        let outcome = self.fetch(&acquisition).await.map_err(LabError::from);
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}
