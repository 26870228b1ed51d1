//! Application services — the instrument-control core.
//!
//! Services take port implementations as generic parameters, keeping this
//! layer decoupled from concrete hardware, transports and storage.

pub mod config_binder;
pub mod device_core;
pub mod orchestrator;
pub mod sync_poller;
pub mod telemetry;
