//! # rexlab-app
//!
//! Application layer — instrument-control services, device variants and
//! **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `Hardware` and its per-family refinements — the vendor boundary
//!     (`open/reset/configure/start/read/stop` plus `is_busy`)
//!   - `WireConnector` / `WireLink` — line-oriented link to the Aggregator
//!   - `RunLogStore` — persistence of finished runs
//! - Provide the shared device core: config binding, telemetry, lifecycle
//!   state and the bounded busy-wait poller
//! - Implement one device variant per hardware family on top of that core
//! - Drive an experiment run through `ExperimentOrchestrator`
//!
//! ## Dependency rule
//! Depends on `rexlab-domain` only (plus `tokio` for time, fs and sync).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod devices;
pub mod ports;
pub mod services;

#[cfg(test)]
mod testing;
