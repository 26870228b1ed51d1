//! Telemetry capability — optional link from a device to the Aggregator.
//!
//! Telemetry is strictly best-effort: an unreachable Aggregator or a broken
//! link is logged once and then ignored. It never turns into a
//! hardware-control failure.

use std::time::Duration;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::payload::Payload;
use rexlab_domain::record::MeasurementRecord;
use tokio::time::Instant;

use crate::ports::{WireConnector, WireLink, WireSettings};

/// Dial the Aggregator, logging a warning instead of failing.
///
/// Returns `None` when telemetry is disabled or the connection is refused.
pub async fn open_wire<C: WireConnector>(connector: &C, settings: &WireSettings) -> Option<C::Link> {
    if !settings.enabled {
        tracing::debug!("telemetry disabled");
        return None;
    }
    match connector.connect(settings).await {
        Ok(link) => {
            tracing::debug!(addr = %settings.addr(), "connected to aggregator");
            Some(link)
        }
        Err(err) => {
            tracing::warn!(error = %err, "aggregator unreachable, continuing without telemetry");
            None
        }
    }
}

/// Per-device telemetry state: the optional link and the device's init instant.
#[derive(Debug)]
pub struct Telemetry<L> {
    device: String,
    link: Option<L>,
    initialised: Instant,
}

impl<L: WireLink> Telemetry<L> {
    /// Wrap an already opened (or absent) link. The init instant is now.
    pub fn new(device: impl Into<String>, link: Option<L>) -> Self {
        Self {
            device: device.into(),
            link,
            initialised: Instant::now(),
        }
    }

    /// Telemetry that never sends.
    pub fn detached(device: impl Into<String>) -> Self {
        Self::new(device, None)
    }

    /// Open a link for `device` via [`open_wire`].
    pub async fn connect<C>(device: impl Into<String>, connector: &C, settings: &WireSettings) -> Self
    where
        C: WireConnector<Link = L>,
    {
        let device = device.into();
        let link = open_wire(connector, settings).await;
        Self::new(device, link)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Time since the device was constructed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.initialised.elapsed()
    }

    /// Snapshot the device's config and record into a fresh payload.
    #[must_use]
    pub fn build_payload(&self, config: &BoundConfig, record: &MeasurementRecord) -> Payload {
        Payload {
            device_name: self.device.clone(),
            device_config: config.snapshot(),
            measurements: record.clone(),
            elapsed_time_since_init: self.elapsed().as_secs_f64(),
        }
    }

    /// Send a payload and wait for its acknowledgement. No-op when detached.
    pub async fn send_payload(&mut self, payload: &Payload) {
        if self.link.is_none() {
            return;
        }
        match payload.to_json_line() {
            Ok(line) => {
                self.send_line(&line).await;
            }
            Err(err) => {
                tracing::warn!(device = %self.device, error = %err, "payload not serializable, skipped");
            }
        }
    }

    /// Send one newline-terminated line and return the acknowledgement.
    ///
    /// The first failure drops the link; later calls are no-ops.
    pub async fn send_line(&mut self, line: &str) -> Option<String> {
        let link = self.link.as_mut()?;
        match link.exchange(line).await {
            Ok(ack) => {
                tracing::trace!(device = %self.device, %ack, "aggregator acknowledged");
                Some(ack)
            }
            Err(err) => {
                tracing::warn!(device = %self.device, error = %err, "telemetry link lost, dropping it");
                self.link = None;
                None
            }
        }
    }

    /// Shut down and drop the link.
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use rexlab_domain::config::ConfigDocument;

    use super::*;
    use crate::testing::{ACK, FakeConnector, FakeLink};

    fn config() -> BoundConfig {
        ConfigDocument::from_toml_str("[device.DAQ1]\ngate_time = 2\naverages = 3\n")
            .unwrap()
            .bind("DAQ1")
    }

    #[tokio::test]
    async fn should_warn_and_stay_detached_when_connection_refused() {
        let connector = FakeConnector::refusing();
        let telemetry = Telemetry::connect("DAQ1", &connector, &WireSettings::default()).await;
        assert!(!telemetry.is_connected());
    }

    #[tokio::test]
    async fn should_not_dial_when_disabled() {
        let connector = FakeConnector::default();
        let telemetry = Telemetry::connect("DAQ1", &connector, &WireSettings::disabled()).await;
        assert!(!telemetry.is_connected());
    }

    #[tokio::test]
    async fn should_send_payload_and_receive_ack() {
        let connector = FakeConnector::default();
        let mut telemetry = Telemetry::connect("DAQ1", &connector, &WireSettings::default()).await;
        let record = MeasurementRecord::new().with("counts", [4.0]);
        let payload = telemetry.build_payload(&config(), &record);
        telemetry.send_payload(&payload).await;

        let sent = connector.inbox.json();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["device_name"], "DAQ1");
        assert_eq!(sent[0]["device_config"]["averages"], 3);
        assert_eq!(sent[0]["measurements"]["counts"], serde_json::json!([4.0]));
    }

    #[tokio::test]
    async fn should_return_ack_from_send_line() {
        let connector = FakeConnector::default();
        let mut telemetry = Telemetry::connect("DAQ1", &connector, &WireSettings::default()).await;
        assert_eq!(telemetry.send_line("{}\n").await.as_deref(), Some(ACK));
    }

    #[tokio::test]
    async fn should_drop_link_after_first_failure() {
        let connector = FakeConnector::failing_after(1);
        let mut telemetry = Telemetry::connect("DAQ1", &connector, &WireSettings::default()).await;
        assert!(telemetry.send_line("{}\n").await.is_some());
        assert!(telemetry.send_line("{}\n").await.is_none());
        assert!(!telemetry.is_connected());
        assert!(telemetry.send_line("{}\n").await.is_none());
        assert_eq!(connector.inbox.lines().len(), 1);
    }

    #[tokio::test]
    async fn should_ignore_sends_when_detached() {
        let mut telemetry: Telemetry<FakeLink> = Telemetry::detached("DAQ1");
        let payload = telemetry.build_payload(&config(), &MeasurementRecord::new());
        telemetry.send_payload(&payload).await;
        assert!(telemetry.send_line("{}\n").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_elapsed_time_since_init() {
        let telemetry: Telemetry<FakeLink> = Telemetry::detached("DAQ1");
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let payload = telemetry.build_payload(&config(), &MeasurementRecord::new());
        assert!((payload.elapsed_time_since_init - 1.5).abs() < 1e-9);
    }
}
