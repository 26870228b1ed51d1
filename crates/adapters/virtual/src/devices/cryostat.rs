//! Virtual closed-cycle cryostat.
//!
//! Preparation stages complete after `stage_duration` (bakeout holds for its
//! own duration when shorter). Stability decays exponentially once the last
//! cooldown finished.

use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use rexlab_app::ports::hardware::{CryostatReading, CryostatSettings};
use rexlab_app::ports::{BusyProbe, CryostatHardware, Hardware};
use rexlab_domain::cryostat::{Bakeout, TemperatureProbe};
use rexlab_domain::error::HardwareFault;
use tokio::time::Instant;

use super::Handle;

const ROOM_TEMPERATURE: f64 = 295.0;
const ATMOSPHERE: f64 = 101_325.0;
const PURGED_PRESSURE: f64 = 1.0e-3;
/// Stability right after a thermal change, in kelvin.
const INITIAL_STABILITY: f64 = 0.5;
/// Platform thermometer sits slightly warmer than the sample.
const PLATFORM_OFFSET: f64 = 0.2;
const DEFAULT_STAGE_DURATION: Duration = Duration::from_secs(2);
const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(1);

/// A simulated cryostation.
#[derive(Debug)]
pub struct VirtualCryostat {
    handle: Handle,
    rng: StdRng,
    probe: TemperatureProbe,
    temperature: f64,
    pressure: f64,
    stage_duration: Duration,
    settle_time: Duration,
    stage_done: Option<Instant>,
    settled_from: Instant,
}

impl Default for VirtualCryostat {
    fn default() -> Self {
        Self {
            handle: Handle::new("VCRYO-1"),
            rng: super::entropy(),
            probe: TemperatureProbe::Sample,
            temperature: ROOM_TEMPERATURE,
            pressure: ATMOSPHERE,
            stage_duration: DEFAULT_STAGE_DURATION,
            settle_time: DEFAULT_SETTLE_TIME,
            stage_done: None,
            settled_from: Instant::now(),
        }
    }
}

impl VirtualCryostat {
    /// Time each preparation stage takes.
    #[must_use]
    pub fn with_stage_duration(mut self, duration: Duration) -> Self {
        self.stage_duration = duration;
        self
    }

    /// Time constant of the stability decay.
    #[must_use]
    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    /// Use a fixed random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = super::seeded(seed);
        self
    }

    /// A controller that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut cryostat = Self::default();
        cryostat.handle.unplugged = true;
        cryostat
    }

    fn begin_stage(&mut self, duration: Duration) {
        let done = Instant::now() + duration;
        self.stage_done = Some(done);
        self.settled_from = done;
    }

    fn stability(&self) -> f64 {
        let now = Instant::now();
        if now < self.settled_from {
            return INITIAL_STABILITY;
        }
        let elapsed = now.duration_since(self.settled_from).as_secs_f64();
        INITIAL_STABILITY * (-elapsed / self.settle_time.as_secs_f64()).exp()
    }
}

impl BusyProbe for VirtualCryostat {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(self.stage_done.is_some_and(|done| Instant::now() < done))
    }
}

impl Hardware for VirtualCryostat {
    type Settings = CryostatSettings;
    type Reading = CryostatReading;

    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.settled_from = Instant::now();
        self.handle.open()
    }

    async fn configure(&mut self, settings: &CryostatSettings) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.probe = settings.probe;
        Ok(true)
    }

    async fn read(&mut self) -> Result<CryostatReading, HardwareFault> {
        self.handle.ensure_open()?;
        let stability = self.stability();
        let offset = match self.probe {
            TemperatureProbe::Sample => 0.0,
            TemperatureProbe::Platform => PLATFORM_OFFSET,
        };
        let noise = if stability > 0.0 {
            self.rng.gen_range(-stability..=stability)
        } else {
            0.0
        };
        Ok(CryostatReading {
            temperature: self.temperature + offset + noise,
            stability,
            pressure: self.pressure,
        })
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.handle.close();
        Ok(())
    }
}

impl CryostatHardware for VirtualCryostat {
    async fn begin_bakeout(&mut self, bakeout: &Bakeout) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if bakeout.temperature <= 0.0 {
            return Ok(false);
        }
        self.temperature = bakeout.temperature;
        self.begin_stage(bakeout.duration.min(self.stage_duration));
        Ok(true)
    }

    async fn begin_purge(&mut self, cycles: u32) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if cycles == 0 {
            return Ok(false);
        }
        self.pressure = PURGED_PRESSURE;
        self.begin_stage(self.stage_duration);
        Ok(true)
    }

    async fn begin_cooldown(&mut self, target: f64) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if target <= 0.0 {
            return Ok(false);
        }
        self.temperature = target;
        self.begin_stage(self.stage_duration);
        Ok(true)
    }
}
