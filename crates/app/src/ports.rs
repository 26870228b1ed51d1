//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod hardware;
pub mod run_log_store;
pub mod wire;

pub use hardware::{
    BusyProbe, CryostatHardware, DaqHardware, Hardware, PhotonCounterHardware, ScopeHardware,
    SourceMeterHardware, SpectrometerHardware, SwitchBoxHardware,
};
pub use run_log_store::RunLogStore;
pub use wire::{WireConnector, WireError, WireLink, WireSettings};
