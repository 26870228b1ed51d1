//! Virtual source-measure unit driving a resistive load.

use rand::Rng;
use rand::rngs::StdRng;
use rexlab_app::ports::hardware::{SourceFunction, SourceMeterSettings};
use rexlab_app::ports::{BusyProbe, Hardware, SourceMeterHardware};
use rexlab_domain::error::HardwareFault;

use super::Handle;

const DEFAULT_LOAD_OHMS: f64 = 1_000.0;
/// Relative noise on every reading.
const NOISE: f64 = 0.001;
/// SCPI "settings conflict".
const SETTINGS_CONFLICT: i32 = -221;

/// A simulated sourcemeter wired to a fixed resistor.
#[derive(Debug)]
pub struct VirtualSourceMeter {
    handle: Handle,
    rng: StdRng,
    load_ohms: f64,
    settings: Option<SourceMeterSettings>,
    output: bool,
}

impl Default for VirtualSourceMeter {
    fn default() -> Self {
        Self {
            handle: Handle::new("VSMU-1"),
            rng: super::entropy(),
            load_ohms: DEFAULT_LOAD_OHMS,
            settings: None,
            output: false,
        }
    }
}

impl VirtualSourceMeter {
    /// Resistance of the simulated load, in ohms.
    #[must_use]
    pub fn with_load(mut self, ohms: f64) -> Self {
        self.load_ohms = ohms;
        self
    }

    /// Use a fixed random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = super::seeded(seed);
        self
    }

    /// An instrument that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut meter = Self::default();
        meter.handle.unplugged = true;
        meter
    }

    #[must_use]
    pub fn is_output_on(&self) -> bool {
        self.output
    }

    /// Noise-free value of the sensed quantity, limited by compliance.
    fn ideal(&self, settings: &SourceMeterSettings) -> f64 {
        let level = settings.source_level;
        let sensed = match (settings.source, settings.sense) {
            (source, sense) if source == sense => level,
            (SourceFunction::Current, _) => level * self.load_ohms,
            (SourceFunction::Voltage, _) => level / self.load_ohms,
        };
        sensed.clamp(-settings.compliance, settings.compliance)
    }
}

impl BusyProbe for VirtualSourceMeter {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(false)
    }
}

impl Hardware for VirtualSourceMeter {
    type Settings = SourceMeterSettings;
    type Reading = f64;

    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.handle.open()
    }

    async fn reset(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.output = false;
        self.settings = None;
        Ok(true)
    }

    async fn configure(&mut self, settings: &SourceMeterSettings) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if settings.source_level.abs() > settings.source_range || settings.compliance <= 0.0 {
            return Ok(false);
        }
        self.settings = Some(*settings);
        Ok(true)
    }

    async fn read(&mut self) -> Result<f64, HardwareFault> {
        self.handle.ensure_open()?;
        let Some(settings) = self.settings.filter(|_| self.output) else {
            return Err(HardwareFault::Vendor {
                code: SETTINGS_CONFLICT,
                message: "output off".to_string(),
            });
        };
        let noise = 1.0 + self.rng.gen_range(-NOISE..=NOISE);
        Ok(self.ideal(&settings) * noise)
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.output = false;
        self.handle.close();
        Ok(())
    }
}

impl SourceMeterHardware for VirtualSourceMeter {
    async fn set_output(&mut self, enabled: bool) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if enabled && self.settings.is_none() {
            return Ok(false);
        }
        self.output = enabled;
        Ok(true)
    }
}
