//! Source-measure unit sourcing a fixed current or voltage.
//!
//! The output is switched on only for the duration of one reading and is
//! switched off again even when the reading fails.

use std::path::Path;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::{LabError, TransferError};
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;

use super::Device;
use crate::ports::hardware::{SourceFunction, SourceMeterSettings};
use crate::ports::{SourceMeterHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;

pub const VOLTAGE: &str = "voltage (V)";
pub const CURRENT: &str = "current (A)";

/// Record key for a sensed quantity.
#[must_use]
pub fn quantity(sense: SourceFunction) -> &'static str {
    match sense {
        SourceFunction::Current => CURRENT,
        SourceFunction::Voltage => VOLTAGE,
    }
}

#[derive(Debug)]
pub struct SourceMeter<H, L> {
    core: DeviceCore<L>,
    hardware: H,
    settings: Option<SourceMeterSettings>,
}

impl<H: SourceMeterHardware, L: WireLink> SourceMeter<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the instrument.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the instrument cannot be found.
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
    /// [`LabError::DeviceInit`] if the instrument cannot be found.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self {
            core,
            hardware,
            settings: None,
        })
    }

    #[must_use]
    pub fn settings(&self) -> Option<&SourceMeterSettings> {
        self.settings.as_ref()
    }

    fn read_settings(&self) -> Result<SourceMeterSettings, LabError> {
        let source: SourceFunction = self.core.require("source_mode")?;
        let sense: SourceFunction = self.core.require("sense_mode")?;
        let (source_range, source_level): (f64, f64) = match source {
            SourceFunction::Current => (
                self.core.require("current_range")?,
                self.core.require("current_level")?,
            ),
            SourceFunction::Voltage => (
                self.core.require("voltage_range")?,
                self.core.require("voltage_level")?,
            ),
        };
        let (compliance, sense_range): (f64, f64) = match sense {
            SourceFunction::Current => (
                self.core.require("compliance_current")?,
                self.core.require("measurecurrent_range")?,
            ),
            SourceFunction::Voltage => (
                self.core.require("compliance_voltage")?,
                self.core.require("measurevolt_range")?,
            ),
        };
        if source_level.abs() > source_range {
            return Err(self.core.invalid(
                "level",
                format!("{source_level} exceeds the {source_range} source range"),
            ));
        }
        if !compliance.is_finite() || compliance <= 0.0 {
            return Err(self.core.invalid("compliance", "must be positive"));
        }
        Ok(SourceMeterSettings {
            source,
            source_range,
            source_level,
            sense,
            compliance,
            sense_range,
        })
    }

    async fn read_once(&mut self) -> Result<f64, TransferError> {
        self.core
            .check("output_on", self.hardware.set_output(true).await)?;
        let reading = self.core.fetched("read", self.hardware.read().await);
        let switched_off = self
            .core
            .check("output_off", self.hardware.set_output(false).await);
        let value = reading?;
        switched_off?;
        Ok(value)
    }
}

impl<H: SourceMeterHardware, L: WireLink> Device for SourceMeter<H, L> {
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
        let settings = self.read_settings()?;
        tracing::debug!(
            source = settings.source.mnemonic(),
            sense = settings.sense.mnemonic(),
            level = settings.source_level,
            "source meter settings"
        );
        if let Err(err) = self
            .core
            .check("configure", self.hardware.configure(&settings).await)
        {
            return Err(self.core.fail(err.into()));
        }
        self.settings = Some(settings);
        self.core.transition(LifecycleState::Configured);
        self.core.transition(LifecycleState::Ready);
        Ok(())
    }

    async fn measure(&mut self) -> Result<MeasurementRecord, LabError> {
        let settings = self.settings.ok_or_else(|| self.core.refuse("measure"))?;
        self.core.begin_measure()?;
        let outcome = self
            .read_once()
            .await
            .map(|value| MeasurementRecord::new().with(quantity(settings.sense), [value]))
            .map_err(LabError::from);
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}
