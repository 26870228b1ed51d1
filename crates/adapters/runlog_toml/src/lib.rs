//! # rexlab-adapter-runlog-toml
//!
//! Run-log persistence as TOML files.
//!
//! ## Responsibilities
//! - Implement the [`RunLogStore`](rexlab_app::ports::RunLogStore) port
//! - Name artifacts after the experiment and its start time
//! - Read artifacts back into a [`RunLog`](rexlab_domain::run_log::RunLog)
//!
//! ## Artifact layout
//!
//! ```text
//! # Experiment started at 07-03-2026 14:05:09.000
//! [experiment]            run id, start/end time, experiment info
//! [device.<name>.config]  bound configuration
//! [device.<name>.data]    last measurement record
//! # <name>                tabulated record, as comments
//! # Experiment ended at 07-03-2026 14:07:41.250
//! ```
//!
//! ## Dependency rule
//! Depends on `rexlab-app` (for port traits) and `rexlab-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod store;

pub use error::RunLogError;
pub use store::{TomlRunLogStore, load, render};
