//! Hardware ports — the vendor boundary every device family sits on.
//!
//! A vendor driver is modelled as a mutable handle exposing a small set of
//! primitives. Primitives that the vendor reports as a success flag return
//! `Ok(bool)`; devices elevate `Ok(false)` to a
//! [`TransferError`](rexlab_domain::error::TransferError). Faults raised by
//! the driver itself surface as [`HardwareFault`].
//!
//! Each family adds its own settings/reading types and, where the vendor
//! offers more than the common primitives, an extension trait.

use std::collections::BTreeMap;
use std::future::Future;
use std::str::FromStr;

use rexlab_domain::counting::CounterSettings;
use rexlab_domain::cryostat::{Bakeout, TemperatureProbe};
use rexlab_domain::error::HardwareFault;
use serde::Deserialize;

/// Anything that can report whether it is still executing a previous command.
pub trait BusyProbe: Send + Sync {
    /// `Ok(true)` while the previous command is still running.
    fn is_busy(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send;
}

/// Minimal vendor interface shared by all device families.
pub trait Hardware: BusyProbe {
    /// Family-specific settings applied by [`Hardware::configure`].
    type Settings: Send + Sync;
    /// Family-specific result of [`Hardware::read`].
    type Reading: Send;

    /// Locate and open the instrument.
    fn open(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send;

    /// Return the instrument to its power-on state.
    fn reset(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
        async { Ok(true) }
    }

    /// Apply settings.
    fn configure(
        &mut self,
        settings: &Self::Settings,
    ) -> impl Future<Output = Result<bool, HardwareFault>> + Send;

    /// Start an acquisition.
    fn start(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
        async { Ok(true) }
    }

    /// Fetch the latest reading.
    fn read(&mut self) -> impl Future<Output = Result<Self::Reading, HardwareFault>> + Send;

    /// Stop a running acquisition.
    fn stop(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
        async { Ok(true) }
    }

    /// Release the vendor handle. Must tolerate being called more than once.
    fn close(&mut self) -> impl Future<Output = Result<(), HardwareFault>> + Send;
}

// ---------------------------------------------------------------------------
// Data acquisition board
// ---------------------------------------------------------------------------

/// Acquisition settings of a generic DAQ board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaqSettings {
    /// Integration time per sample, in seconds.
    pub gate_time: f64,
    /// Samples averaged into one measurement.
    pub averages: u32,
}

/// One raw DAQ sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaqSample {
    pub counts: f64,
    pub current_ma: f64,
}

/// Marker for DAQ drivers.
pub trait DaqHardware: Hardware<Settings = DaqSettings, Reading = DaqSample> {}

impl<T> DaqHardware for T where T: Hardware<Settings = DaqSettings, Reading = DaqSample> {}

// ---------------------------------------------------------------------------
// Spectrometer
// ---------------------------------------------------------------------------

/// Diffraction grating mounted in the spectrometer turret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grating {
    #[default]
    Vis,
    Nir,
    Mir,
}

impl Grating {
    /// Groove density in lines per millimetre.
    #[must_use]
    pub fn lines_per_mm(self) -> f64 {
        match self {
            Self::Vis => 1200.0,
            Self::Nir => 600.0,
            Self::Mir => 300.0,
        }
    }

    /// Factor between a wavelength in nanometres and the raw mono position.
    ///
    /// The mono is calibrated for a 1200 lines/mm grating.
    #[must_use]
    pub fn scaling(self) -> f64 {
        self.lines_per_mm() / 1200.0
    }
}

/// Spectrometer optics settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrometerSettings {
    pub grating: Grating,
    /// Entrance slit width in millimetres.
    pub slit_width: f64,
}

/// Monochromator driver. [`Hardware::read`] returns the raw mono position.
pub trait SpectrometerHardware: Hardware<Settings = SpectrometerSettings, Reading = f64> {
    /// Start moving the mono to a raw position.
    fn move_to(&mut self, position: f64) -> impl Future<Output = Result<bool, HardwareFault>> + Send;
}

// ---------------------------------------------------------------------------
// Cryostat
// ---------------------------------------------------------------------------

/// Cryostat read-out settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CryostatSettings {
    pub probe: TemperatureProbe,
}

/// Snapshot of the cryostat's thermal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CryostatReading {
    /// Kelvin.
    pub temperature: f64,
    /// Kelvin.
    pub stability: f64,
    /// Pascal.
    pub pressure: f64,
}

/// Cryostation driver. Preparation stages run on the controller; the driver
/// reports busy until the active stage has finished.
pub trait CryostatHardware:
    Hardware<Settings = CryostatSettings, Reading = CryostatReading>
{
    fn begin_bakeout(
        &mut self,
        bakeout: &Bakeout,
    ) -> impl Future<Output = Result<bool, HardwareFault>> + Send;

    fn begin_purge(&mut self, cycles: u32)
    -> impl Future<Output = Result<bool, HardwareFault>> + Send;

    fn begin_cooldown(
        &mut self,
        target: f64,
    ) -> impl Future<Output = Result<bool, HardwareFault>> + Send;
}

// ---------------------------------------------------------------------------
// Photon counter
// ---------------------------------------------------------------------------

/// Marker for photon-counting units. [`Hardware::read`] returns one count per gate.
pub trait PhotonCounterHardware: Hardware<Settings = CounterSettings, Reading = Vec<u32>> {}

impl<T> PhotonCounterHardware for T where T: Hardware<Settings = CounterSettings, Reading = Vec<u32>> {}

// ---------------------------------------------------------------------------
// Oscilloscope
// ---------------------------------------------------------------------------

/// Oscilloscope acquisition settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSettings {
    /// Vendor acquisition mode used while averaging (e.g. `AVERAGE`).
    pub acquisition_mode: String,
    pub averages: u32,
    /// Channel the waveform is fetched from (e.g. `C1`).
    pub channel: String,
}

/// A fetched waveform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    /// Seconds.
    pub time: Vec<f64>,
    /// Millivolts.
    pub voltage: Vec<f64>,
}

/// Oscilloscope driver. [`Hardware::read`] fetches a waveform from the configured channel.
pub trait ScopeHardware: Hardware<Settings = ScopeSettings, Reading = Waveform> {
    /// Switch acquisition mode and averaging depth.
    fn set_acquisition(
        &mut self,
        mode: &str,
        averages: u32,
    ) -> impl Future<Output = Result<bool, HardwareFault>> + Send;
}

// ---------------------------------------------------------------------------
// Switch box
// ---------------------------------------------------------------------------

/// One of the four switch-box output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SwitchChannel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl SwitchChannel {
    pub const ALL: [Self; 4] = [Self::Ch1, Self::Ch2, Self::Ch3, Self::Ch4];
}

impl FromStr for SwitchChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CH1" => Ok(Self::Ch1),
            "CH2" => Ok(Self::Ch2),
            "CH3" => Ok(Self::Ch3),
            "CH4" => Ok(Self::Ch4),
            _ => Err(format!("unknown switch channel `{s}`, expected CH1..CH4")),
        }
    }
}

impl std::fmt::Display for SwitchChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ch1 => f.write_str("CH1"),
            Self::Ch2 => f.write_str("CH2"),
            Self::Ch3 => f.write_str("CH3"),
            Self::Ch4 => f.write_str("CH4"),
        }
    }
}

/// Matrix code (`0x0..=0xF`) and polarity of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub matrix: u8,
    pub inverted: bool,
}

/// Desired routing, applied channel by channel. Channels not listed keep their state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchLayout {
    pub matrix: BTreeMap<SwitchChannel, u8>,
    pub polarity: BTreeMap<SwitchChannel, bool>,
}

/// Switch-box driver. [`Hardware::read`] queries the state of every channel.
pub trait SwitchBoxHardware:
    Hardware<Settings = SwitchLayout, Reading = BTreeMap<SwitchChannel, ChannelState>>
{
    fn set_matrix(
        &mut self,
        channel: SwitchChannel,
        code: u8,
    ) -> impl Future<Output = Result<bool, HardwareFault>> + Send;

    fn set_polarity(
        &mut self,
        channel: SwitchChannel,
        inverted: bool,
    ) -> impl Future<Output = Result<bool, HardwareFault>> + Send;
}

// ---------------------------------------------------------------------------
// Source meter
// ---------------------------------------------------------------------------

/// Quantity a source meter sources or senses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SourceFunction {
    #[serde(rename = "CURR")]
    Current,
    #[serde(rename = "VOLT")]
    Voltage,
}

impl SourceFunction {
    /// SCPI mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Current => "CURR",
            Self::Voltage => "VOLT",
        }
    }
}

/// Fixed-level sourcing with a compliance limit on the sensed quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMeterSettings {
    pub source: SourceFunction,
    /// Amperes or volts, matching `source`.
    pub source_range: f64,
    pub source_level: f64,
    pub sense: SourceFunction,
    /// Amperes or volts, matching `sense`.
    pub compliance: f64,
    pub sense_range: f64,
}

/// Source-measure unit. [`Hardware::read`] triggers one reading of the sensed
/// quantity and is only valid while the output is on.
pub trait SourceMeterHardware: Hardware<Settings = SourceMeterSettings, Reading = f64> {
    fn set_output(&mut self, enabled: bool) -> impl Future<Output = Result<bool, HardwareFault>> + Send;
}
