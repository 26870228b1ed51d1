//! Virtual gated photon counter.

use rand::Rng;
use rand::rngs::StdRng;
use rexlab_app::ports::{BusyProbe, Hardware};
use rexlab_domain::counting::CounterSettings;
use rexlab_domain::error::HardwareFault;

use super::Handle;

/// Mean photon rate in counts per second.
const DEFAULT_RATE: f64 = 5_000.0;
/// Relative spread of a single gate.
const SPREAD: f64 = 0.05;

/// A simulated photon-counting unit.
#[derive(Debug)]
pub struct VirtualPhotonCounter {
    handle: Handle,
    rng: StdRng,
    rate: f64,
    settings: Option<CounterSettings>,
    counting: bool,
}

impl Default for VirtualPhotonCounter {
    fn default() -> Self {
        Self {
            handle: Handle::new("VPC-1"),
            rng: super::entropy(),
            rate: DEFAULT_RATE,
            settings: None,
            counting: false,
        }
    }
}

impl VirtualPhotonCounter {
    /// Set the mean photon rate, in counts per second.
    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Use a fixed random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = super::seeded(seed);
        self
    }

    /// A counter that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut counter = Self::default();
        counter.handle.unplugged = true;
        counter
    }
}

impl BusyProbe for VirtualPhotonCounter {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(false)
    }
}

impl Hardware for VirtualPhotonCounter {
    type Settings = CounterSettings;
    type Reading = Vec<u32>;

    /// Opening an already open counter is accepted.
    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.handle.open()
    }

    async fn reset(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.counting = false;
        Ok(true)
    }

    async fn configure(&mut self, settings: &CounterSettings) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if settings.number_of_gates == 0 {
            return Ok(false);
        }
        tracing::trace!(
            gate_code = settings.gate_time.code(),
            transfer = settings.transfer_type.code(),
            trigger = settings.trigger_type.code(),
            "counter registers written"
        );
        self.settings = Some(*settings);
        Ok(true)
    }

    async fn start(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.counting = self.settings.is_some();
        Ok(self.counting)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn read(&mut self) -> Result<Vec<u32>, HardwareFault> {
        self.handle.ensure_open()?;
        let Some(settings) = self.settings.filter(|_| self.counting) else {
            return Err(HardwareFault::Vendor {
                code: 3,
                message: "no counting in progress".to_string(),
            });
        };
        let mean = self.rate * settings.gate_time.duration().as_secs_f64();
        let bins = (0..settings.number_of_gates)
            .map(|_| {
                let factor = 1.0 + self.rng.gen_range(-SPREAD..=SPREAD);
                (mean * factor).round().max(0.0) as u32
            })
            .collect();
        Ok(bins)
    }

    async fn stop(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.counting = false;
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.counting = false;
        self.handle.close();
        Ok(())
    }
}
