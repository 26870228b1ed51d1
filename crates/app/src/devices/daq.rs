//! Generic data-acquisition board.

use std::path::Path;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::LabError;
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;

use super::Device;
use crate::ports::hardware::DaqSettings;
use crate::ports::{DaqHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;

pub const COUNTS: &str = "counts";
pub const CURRENT: &str = "current (mA)";

/// A DAQ averaging `averages` samples per measurement, scaled by `gate_time`.
#[derive(Debug)]
pub struct Daq<H, L> {
    core: DeviceCore<L>,
    hardware: H,
    settings: Option<DaqSettings>,
}

impl<H: DaqHardware, L: WireLink> Daq<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the hardware.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the hardware cannot be opened.
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
    /// [`LabError::DeviceInit`] if the hardware cannot be opened.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self {
            core,
            hardware,
            settings: None,
        })
    }

    #[must_use]
    pub fn settings(&self) -> Option<&DaqSettings> {
        self.settings.as_ref()
    }

    async fn acquire(&mut self, settings: DaqSettings) -> Result<MeasurementRecord, LabError> {
        self.core.check("start", self.hardware.start().await)?;
        let mut counts = 0.0;
        let mut current = 0.0;
        for _ in 0..settings.averages {
            let sample = self.core.fetched("read", self.hardware.read().await)?;
            counts += sample.counts;
            current += sample.current_ma;
        }
        self.core.check("stop", self.hardware.stop().await)?;

        let samples = f64::from(settings.averages);
        Ok(MeasurementRecord::new()
            .with(COUNTS, [counts / samples * settings.gate_time])
            .with(CURRENT, [current / samples * settings.gate_time]))
    }
}

impl<H: DaqHardware, L: WireLink> Device for Daq<H, L> {
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
        let gate_time: f64 = self.core.require("gate_time")?;
        let averages: u32 = self.core.require("averages")?;
        if gate_time <= 0.0 {
            return Err(self.core.invalid("gate_time", "must be positive"));
        }
        if averages == 0 {
            return Err(self.core.invalid("averages", "must be at least 1"));
        }

        let settings = DaqSettings {
            gate_time,
            averages,
        };
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
        let outcome = self.acquire(settings).await;
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}
