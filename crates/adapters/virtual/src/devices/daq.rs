//! Virtual DAQ board: a count rate and a supply current, both with jitter.

use rand::Rng;
use rand::rngs::StdRng;
use rexlab_app::ports::hardware::{DaqSample, DaqSettings};
use rexlab_app::ports::{BusyProbe, Hardware};
use rexlab_domain::error::HardwareFault;

use super::Handle;

const DEFAULT_RATE: f64 = 1_000.0;
const DEFAULT_CURRENT_MA: f64 = 4.0;
/// Relative jitter on every sample.
const JITTER: f64 = 0.02;

/// A simulated DAQ reporting counts per second.
#[derive(Debug)]
pub struct VirtualDaq {
    handle: Handle,
    rng: StdRng,
    rate: f64,
    current_ma: f64,
    settings: Option<DaqSettings>,
    running: bool,
}

impl Default for VirtualDaq {
    fn default() -> Self {
        Self {
            handle: Handle::new("VDAQ-1"),
            rng: super::entropy(),
            rate: DEFAULT_RATE,
            current_ma: DEFAULT_CURRENT_MA,
            settings: None,
            running: false,
        }
    }
}

impl VirtualDaq {
    /// Set the mean count rate, in counts per second.
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

    /// A board that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut daq = Self::default();
        daq.handle.unplugged = true;
        daq
    }

    fn jitter(&mut self) -> f64 {
        1.0 + self.rng.gen_range(-JITTER..=JITTER)
    }
}

impl BusyProbe for VirtualDaq {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(false)
    }
}

impl Hardware for VirtualDaq {
    type Settings = DaqSettings;
    type Reading = DaqSample;

    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.handle.open()
    }

    async fn configure(&mut self, settings: &DaqSettings) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if settings.gate_time <= 0.0 || settings.averages == 0 {
            return Ok(false);
        }
        self.settings = Some(*settings);
        Ok(true)
    }

    async fn start(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.running = self.settings.is_some();
        Ok(self.running)
    }

    async fn read(&mut self) -> Result<DaqSample, HardwareFault> {
        self.handle.ensure_open()?;
        if !self.running {
            return Err(HardwareFault::Vendor {
                code: -10,
                message: "acquisition not started".to_string(),
            });
        }
        let counts = self.rate * self.jitter();
        let current_ma = self.current_ma * self.jitter();
        Ok(DaqSample { counts, current_ma })
    }

    async fn stop(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.running = false;
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.running = false;
        self.handle.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: DaqSettings = DaqSettings {
        gate_time: 2.0,
        averages: 3,
    };

    #[tokio::test]
    async fn should_fail_to_open_when_unplugged() {
        let mut daq = VirtualDaq::unplugged();
        assert!(matches!(daq.open().await, Err(HardwareFault::NotFound)));
    }

    #[tokio::test]
    async fn should_require_open_before_configure() {
        let mut daq = VirtualDaq::default();
        assert!(matches!(
            daq.configure(&SETTINGS).await,
            Err(HardwareFault::Disconnected)
        ));
    }

    #[tokio::test]
    async fn should_read_rate_within_jitter() {
        let mut daq = VirtualDaq::default().with_rate(500.0).with_seed(7);
        daq.open().await.unwrap();
        assert!(daq.configure(&SETTINGS).await.unwrap());
        assert!(daq.start().await.unwrap());
        for _ in 0..10 {
            let sample = daq.read().await.unwrap();
            assert!((490.0..=510.0).contains(&sample.counts));
            assert!((3.9..=4.1).contains(&sample.current_ma));
        }
        assert!(daq.stop().await.unwrap());
    }

    #[tokio::test]
    async fn should_refuse_read_before_start() {
        let mut daq = VirtualDaq::default();
        daq.open().await.unwrap();
        daq.configure(&SETTINGS).await.unwrap();
        assert!(matches!(
            daq.read().await,
            Err(HardwareFault::Vendor { code: -10, .. })
        ));
    }

    #[tokio::test]
    async fn should_reject_start_when_unconfigured() {
        let mut daq = VirtualDaq::default();
        daq.open().await.unwrap();
        assert!(!daq.start().await.unwrap());
    }
}
