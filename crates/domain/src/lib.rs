//! # rexlab-domain
//!
//! Pure domain model for the rexlab instrument-control layer.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define the **configuration document** and the device-scoped **bound config**,
//!   including the documented any-depth key search
//! - Define **measurement records** (snapshot semantics) and the telemetry **payload**
//! - Define the **experiment announcement** and the persisted **run log**
//! - Define the device **lifecycle states** and family-specific settings
//!   (cryostat preparation plan, photon-counter gate times)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod config;
pub mod counting;
pub mod cryostat;
pub mod experiment;
pub mod lifecycle;
pub mod payload;
pub mod record;
pub mod run_log;
