//! Scanning spectrometer (monochromator with a grating turret).
//!
//! The mono is commanded in raw positions calibrated for a 1200 lines/mm
//! grating; wavelengths are scaled by the mounted grating's groove density.
//! Every move waits for the mono to report not-busy before and after.

use std::path::Path;
use std::time::Duration;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::LabError;
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;

use super::Device;
use crate::ports::hardware::{Grating, SpectrometerSettings};
use crate::ports::{SpectrometerHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;
use crate::services::sync_poller::{PollPolicy, wait_until_ready};

pub const WAVELENGTH: &str = "wavelength (nm)";

/// A spectrometer positioned in wavelength.
#[derive(Debug)]
pub struct Spectrometer<H, L> {
    core: DeviceCore<L>,
    hardware: H,
    settings: Option<SpectrometerSettings>,
    step_size: f64,
    policy: PollPolicy,
    wavelength: Option<f64>,
}

impl<H: SpectrometerHardware, L: WireLink> Spectrometer<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the hardware.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the mono cannot be opened.
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
    /// [`LabError::DeviceInit`] if the mono cannot be opened.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self {
            core,
            hardware,
            settings: None,
            step_size: 0.0,
            policy: PollPolicy::default(),
            wavelength: None,
        })
    }

    /// Last wavelength reached, in nanometres.
    #[must_use]
    pub fn wavelength(&self) -> Option<f64> {
        self.wavelength
    }

    /// Move to `wavelength` (nm) and return the wavelength actually reached.
    ///
    /// # Errors
    ///
    /// [`LabError::Lifecycle`] unless `Ready`; [`LabError::HardwareTimeout`]
    /// or [`LabError::Transfer`] if the move fails, which leaves the device
    /// `Uncertain`.
    #[tracing::instrument(skip(self), fields(device = %self.core.name()))]
    pub async fn goto_wavelength(&mut self, wavelength: f64) -> Result<f64, LabError> {
        let settings = self.settings.ok_or_else(|| self.core.refuse("move"))?;
        self.core.ensure("move", LifecycleState::can_measure)?;
        match self.move_mono(settings.grating, wavelength).await {
            Ok(reached) => Ok(reached),
            Err(err) => Err(self.core.fail(err)),
        }
    }

    /// Advance by the configured `step_size`.
    ///
    /// # Errors
    ///
    /// Same as [`goto_wavelength`](Self::goto_wavelength).
    pub async fn step(&mut self) -> Result<f64, LabError> {
        let current = self.wavelength.ok_or_else(|| self.core.refuse("step"))?;
        self.goto_wavelength(current + self.step_size).await
    }

    async fn move_mono(&mut self, grating: Grating, wavelength: f64) -> Result<f64, LabError> {
        let scaling = grating.scaling();
        wait_until_ready(&mut self.hardware, self.policy).await?;
        self.core
            .check("move", self.hardware.move_to(wavelength * scaling).await)?;
        wait_until_ready(&mut self.hardware, self.policy).await?;
        let raw = self.core.fetched("position", self.hardware.read().await)?;
        let reached = raw / scaling;
        tracing::debug!(device = %self.core.name(), reached, "mono in position");
        self.wavelength = Some(reached);
        Ok(reached)
    }

    async fn apply(&mut self, settings: SpectrometerSettings, initial: f64) -> Result<(), LabError> {
        self.core
            .check("configure", self.hardware.configure(&settings).await)?;
        self.core.transition(LifecycleState::Configured);
        self.move_mono(settings.grating, initial).await?;
        Ok(())
    }
}

impl<H: SpectrometerHardware, L: WireLink> Device for Spectrometer<H, L> {
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
        let initial: f64 = self.core.require("initial_position")?;
        let slit_width: f64 = self.core.require("slit_width")?;
        let step_size: f64 = self.core.require("step_size")?;
        let grating: Grating = self.core.optional("grating", Grating::default())?;
        let interval = self
            .core
            .optional_duration("poll_interval", Duration::from_millis(50))?;
        let timeout = self
            .core
            .optional_duration("move_timeout", Duration::from_secs(30))?;

        let settings = SpectrometerSettings {
            grating,
            slit_width,
        };
        self.step_size = step_size;
        self.policy = PollPolicy::new(interval, timeout);
        if let Err(err) = self.apply(settings, initial).await {
            return Err(self.core.fail(err));
        }
        self.settings = Some(settings);
        self.core.transition(LifecycleState::Ready);
        Ok(())
    }

    async fn measure(&mut self) -> Result<MeasurementRecord, LabError> {
        let settings = self.settings.ok_or_else(|| self.core.refuse("measure"))?;
        self.core.begin_measure()?;
        let outcome = match self.core.fetched("position", self.hardware.read().await) {
            Ok(raw) => {
                let wavelength = raw / settings.grating.scaling();
                let rounded = (wavelength * 100.0).round() / 100.0;
                Ok(MeasurementRecord::new().with(WAVELENGTH, [rounded]))
            }
            Err(err) => Err(err.into()),
        };
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}
