//! # rexlab-adapter-virtual
//!
//! Simulated instruments implementing the hardware ports, for testing and
//! demonstration without a lab.
//!
//! ## Provided instruments
//!
//! | Instrument | Port | Behaviour |
//! |------------|------|-----------|
//! | [`VirtualDaq`] | `DaqHardware` | Count rate and supply current with jitter |
//! | [`VirtualSpectrometer`] | `SpectrometerHardware` | Busy while the mono travels at a fixed speed |
//! | [`VirtualCryostat`] | `CryostatHardware` | Stages finish after a fixed time; stability decays after cooldown |
//! | [`VirtualPhotonCounter`] | `PhotonCounterHardware` | Per-gate counts proportional to gate time |
//! | [`VirtualOscilloscope`] | `ScopeHardware` | Gaussian pulse whose noise shrinks with averaging |
//! | [`VirtualSwitchBox`] | `SwitchBoxHardware` | Holds matrix and polarity per channel |
//! | [`VirtualSourceMeter`] | `SourceMeterHardware` | Sources into a resistive load, clipped at compliance |
//!
//! Every instrument can be built "unplugged", in which case `open` fails
//! with [`HardwareFault::NotFound`](rexlab_domain::error::HardwareFault::NotFound).
//! Time-dependent behaviour follows the tokio clock.
//!
//! ## Dependency rule
//!
//! Depends on `rexlab-app` (port traits) and `rexlab-domain` only.

mod devices;

pub use devices::{
    VirtualCryostat, VirtualDaq, VirtualOscilloscope, VirtualPhotonCounter, VirtualSourceMeter,
    VirtualSpectrometer, VirtualSwitchBox,
};
