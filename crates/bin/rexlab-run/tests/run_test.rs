//! End-to-end run: virtual DAQ, TCP telemetry to a local aggregator and a
//! TOML run log on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rexlab_adapter_runlog_toml::{TomlRunLogStore, load};
use rexlab_adapter_virtual::VirtualDaq;
use rexlab_adapter_wire_tcp::TcpConnector;
use rexlab_app::devices::{Daq, Device, with_device};
use rexlab_app::ports::WireSettings;
use rexlab_app::services::orchestrator::ExperimentOrchestrator;
use rexlab_domain::record::MeasurementValue;
use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

const ACK: &str = "Device measurements recorded";

const DOCUMENT: &str = r#"
[experiment.info]
name = "Test User"
email = "test@example.com"
experiment_name = "Dark counts"
experiment_description = "Counts with the shutter closed."

[device.D1]
gate_time = 2
averages = 3
"#;

/// Accepts any number of connections and records every line in arrival order.
async fn aggregator() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let received = Arc::clone(&lines);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    received.lock().unwrap().push(line);
                    if write.write_all(format!("{ACK}\n").as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    (addr, lines)
}

fn document() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DOCUMENT.as_bytes()).unwrap();
    file
}

fn settings(addr: SocketAddr) -> WireSettings {
    WireSettings {
        enabled: true,
        host: addr.ip().to_string(),
        port: addr.port(),
    }
}

async fn run_daq(
    orchestrator: &ExperimentOrchestrator<TcpConnector, TomlRunLogStore>,
) -> rexlab_app::services::orchestrator::RunOutcome {
    orchestrator
        .start(async |context| {
            let mut daq = Daq::construct(
                &context.config_path,
                "D1",
                VirtualDaq::default(),
                &TcpConnector,
                &context.wire,
            )
            .await?;
            let record = with_device(&mut daq, async |daq: &mut Daq<_, _>| {
                daq.setup_config().await?;
                for _ in 0..2 {
                    daq.measure().await?;
                }
                daq.measure().await
            })
            .await?;
            Ok(BTreeMap::from([("D1".to_string(), record)]))
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn should_stream_three_independent_payloads_and_write_run_log() {
    let (addr, lines) = aggregator().await;
    let file = document();
    let output = TempDir::new().unwrap();
    let orchestrator = ExperimentOrchestrator::new(
        file.path(),
        settings(addr),
        TcpConnector,
        TomlRunLogStore::new(output.path()),
    );

    let outcome = run_daq(&orchestrator).await;

    let lines = lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 4);
    let sent: Vec<serde_json::Value> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(sent[0]["info"]["experiment_name"], "Dark counts");
    for payload in &sent[1..] {
        assert_eq!(payload["device_name"], "D1");
        assert_eq!(payload["device_config"]["averages"], 3);
        let counts = payload["measurements"]["counts"].as_array().unwrap();
        assert_eq!(counts.len(), 1);
        let counts = counts[0].as_f64().unwrap();
        assert!((1960.0..=2040.0).contains(&counts), "counts {counts} off 1000/s x 2s");
    }

    let counts = outcome.log.devices["D1"].data.scalar("counts").unwrap();
    assert!(matches!(counts, MeasurementValue::Float(_)));
    let written = outcome.location.clone();
    assert!(written.ends_with(".toml"));
    let reloaded = load(std::path::Path::new(&written)).await.unwrap();
    assert_eq!(reloaded, outcome.log);
}

#[tokio::test]
async fn should_complete_run_when_aggregator_is_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let file = document();
    let output = TempDir::new().unwrap();
    let orchestrator = ExperimentOrchestrator::new(
        file.path(),
        settings(addr),
        TcpConnector,
        TomlRunLogStore::new(output.path()),
    );

    let outcome = run_daq(&orchestrator).await;
    assert_eq!(outcome.log.devices.len(), 1);
    assert_eq!(outcome.log.experiment_name(), Some("Dark counts"));
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 1);
}
