//! # rexlab-run — experiment runner
//!
//! Composition root that wires the instrument core to its adapters and runs
//! one experiment.
//!
//! ## Responsibilities
//! - Parse configuration (`rexlab.toml`, env vars)
//! - Initialise tracing
//! - Construct the TCP wire connector and the TOML run-log store
//! - Run the orchestrator with the virtual-hardware routine
//! - Abort on Ctrl-C, releasing every instrument and socket on the way out
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! Instrument behaviour lives in `rexlab-app`; this crate only wires it.

mod config;
mod routine;

use rexlab_adapter_runlog_toml::TomlRunLogStore;
use rexlab_adapter_wire_tcp::TcpConnector;
use rexlab_app::services::orchestrator::ExperimentOrchestrator;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let orchestrator = ExperimentOrchestrator::new(
        config.experiment.path.clone(),
        config.wire_settings(),
        TcpConnector,
        TomlRunLogStore::new(config.output.dir.clone()),
    );
    let measurements = config.routine.measurements;

    tokio::select! {
        outcome = orchestrator.start(async |context| routine::run(context, measurements).await) => {
            let outcome = outcome?;
            for (name, device) in &outcome.log.devices {
                println!("{name}\n{}", device.data.render_table());
            }
            println!("run log written to {}", outcome.location);
        }
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            tracing::warn!("interrupted, instruments released without a run log");
        }
    }
    Ok(())
}
