//! Virtual monochromator: moves at a fixed speed and reports busy while travelling.

use std::time::Duration;

use rexlab_app::ports::hardware::SpectrometerSettings;
use rexlab_app::ports::{BusyProbe, Hardware, SpectrometerHardware};
use rexlab_domain::error::HardwareFault;
use tokio::time::Instant;

use super::Handle;

/// Raw position units per second.
const DEFAULT_SPEED: f64 = 100.0;
const PARK_POSITION: f64 = 0.0;
const MAX_POSITION: f64 = 2_000.0;

/// A simulated mono with a grating turret.
#[derive(Debug)]
pub struct VirtualSpectrometer {
    handle: Handle,
    speed: f64,
    position: f64,
    arrival: Option<Instant>,
    settings: Option<SpectrometerSettings>,
}

impl Default for VirtualSpectrometer {
    fn default() -> Self {
        Self {
            handle: Handle::new("VMONO-1"),
            speed: DEFAULT_SPEED,
            position: PARK_POSITION,
            arrival: None,
            settings: None,
        }
    }
}

impl VirtualSpectrometer {
    /// Set the travel speed in raw position units per second.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// A mono that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut mono = Self::default();
        mono.handle.unplugged = true;
        mono
    }

    #[must_use]
    pub fn settings(&self) -> Option<&SpectrometerSettings> {
        self.settings.as_ref()
    }
}

impl BusyProbe for VirtualSpectrometer {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(self.arrival.is_some_and(|arrival| Instant::now() < arrival))
    }
}

impl Hardware for VirtualSpectrometer {
    type Settings = SpectrometerSettings;
    type Reading = f64;

    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.handle.open()
    }

    async fn configure(&mut self, settings: &SpectrometerSettings) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if settings.slit_width <= 0.0 {
            return Ok(false);
        }
        tracing::debug!(grating = ?settings.grating, slit_width = settings.slit_width, "turret set");
        self.settings = Some(*settings);
        Ok(true)
    }

    /// Current position; the target once the move has completed.
    async fn read(&mut self) -> Result<f64, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(self.position)
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.handle.close();
        Ok(())
    }
}

impl SpectrometerHardware for VirtualSpectrometer {
    async fn move_to(&mut self, position: f64) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if !(PARK_POSITION..=MAX_POSITION).contains(&position) {
            return Ok(false);
        }
        let travel = Duration::from_secs_f64((position - self.position).abs() / self.speed);
        self.arrival = Some(Instant::now() + travel);
        self.position = position;
        Ok(true)
    }
}
