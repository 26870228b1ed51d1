//! Virtual oscilloscope: a Gaussian pulse on a noisy baseline.

use rand::Rng;
use rand::rngs::StdRng;
use rexlab_app::ports::hardware::{ScopeSettings, Waveform};
use rexlab_app::ports::{BusyProbe, Hardware, ScopeHardware};
use rexlab_domain::error::HardwareFault;

use super::Handle;

const SAMPLES: u32 = 200;
/// Seconds between samples.
const SAMPLE_PERIOD: f64 = 1.0e-6;
/// Millivolts.
const PULSE_AMPLITUDE: f64 = 50.0;
const PULSE_WIDTH: f64 = 10.0e-6;
/// Single-shot baseline noise, millivolts.
const NOISE: f64 = 2.0;
const CHANNELS: [&str; 4] = ["C1", "C2", "C3", "C4"];

/// A simulated digital storage oscilloscope.
#[derive(Debug)]
pub struct VirtualOscilloscope {
    handle: Handle,
    rng: StdRng,
    settings: Option<ScopeSettings>,
    mode: String,
    averages: u32,
}

impl Default for VirtualOscilloscope {
    fn default() -> Self {
        Self {
            handle: Handle::new("VDSO-1"),
            rng: super::entropy(),
            settings: None,
            mode: "SAMPLING".to_string(),
            averages: 1,
        }
    }
}

impl VirtualOscilloscope {
    /// Use a fixed random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = super::seeded(seed);
        self
    }

    /// A scope that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut scope = Self::default();
        scope.handle.unplugged = true;
        scope
    }

    /// Current acquisition mode and averaging depth.
    #[must_use]
    pub fn acquisition(&self) -> (&str, u32) {
        (&self.mode, self.averages)
    }
}

impl BusyProbe for VirtualOscilloscope {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(false)
    }
}

impl Hardware for VirtualOscilloscope {
    type Settings = ScopeSettings;
    type Reading = Waveform;

    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.handle.open()
    }

    async fn configure(&mut self, settings: &ScopeSettings) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if !CHANNELS.contains(&settings.channel.as_str()) || settings.averages == 0 {
            return Ok(false);
        }
        self.mode.clone_from(&settings.acquisition_mode);
        self.averages = settings.averages;
        self.settings = Some(settings.clone());
        Ok(true)
    }

    async fn read(&mut self) -> Result<Waveform, HardwareFault> {
        self.handle.ensure_open()?;
        if self.settings.is_none() {
            return Err(HardwareFault::Rejected);
        }
        let noise = NOISE / f64::from(self.averages).sqrt();
        let centre = f64::from(SAMPLES / 2) * SAMPLE_PERIOD;
        let mut waveform = Waveform::default();
        for index in 0..SAMPLES {
            let t = f64::from(index) * SAMPLE_PERIOD;
            let pulse = PULSE_AMPLITUDE * (-((t - centre) / PULSE_WIDTH).powi(2)).exp();
            waveform.time.push(t);
            waveform.voltage.push(pulse + self.rng.gen_range(-noise..=noise));
        }
        Ok(waveform)
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.handle.close();
        Ok(())
    }
}

impl ScopeHardware for VirtualOscilloscope {
    async fn set_acquisition(&mut self, mode: &str, averages: u32) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if averages == 0 {
            return Ok(false);
        }
        mode.clone_into(&mut self.mode);
        self.averages = averages;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(channel: &str) -> ScopeSettings {
        ScopeSettings {
            acquisition_mode: "AVERAGE".to_string(),
            averages: 16,
            channel: channel.to_string(),
        }
    }

    #[tokio::test]
    async fn should_fetch_pulse_centred_in_window() {
        let mut scope = VirtualOscilloscope::default().with_seed(5);
        scope.open().await.unwrap();
        assert!(scope.configure(&settings("C2")).await.unwrap());

        let waveform = scope.read().await.unwrap();
        assert_eq!(waveform.time.len(), 200);
        assert_eq!(waveform.voltage.len(), 200);
        let peak = waveform.voltage[100];
        assert!((peak - PULSE_AMPLITUDE).abs() <= 0.5);
        assert!(waveform.voltage[0].abs() <= 0.5);
    }

    #[tokio::test]
    async fn should_reject_unknown_channel() {
        let mut scope = VirtualOscilloscope::default();
        scope.open().await.unwrap();
        assert!(!scope.configure(&settings("C9")).await.unwrap());
    }

    #[tokio::test]
    async fn should_switch_acquisition_mode() {
        let mut scope = VirtualOscilloscope::default();
        scope.open().await.unwrap();
        scope.configure(&settings("C1")).await.unwrap();
        assert_eq!(scope.acquisition(), ("AVERAGE", 16));
        assert!(scope.set_acquisition("SAMPLING", 1).await.unwrap());
        assert_eq!(scope.acquisition(), ("SAMPLING", 1));
    }

    #[tokio::test]
    async fn should_refuse_fetch_before_configure() {
        let mut scope = VirtualOscilloscope::default();
        scope.open().await.unwrap();
        assert!(matches!(scope.read().await, Err(HardwareFault::Rejected)));
    }
}
