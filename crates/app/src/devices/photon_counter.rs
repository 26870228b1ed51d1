//! Gated photon-counting unit.
//!
//! One measurement runs `averages` full counting cycles
//! (`open → reset → configure → start → read → stop → reset`) and reports
//! the per-gate and total averages.

use std::path::Path;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::counting::{CounterSettings, GateTime, TransferType, TriggerType};
use rexlab_domain::error::{HardwareFault, LabError, TransferError};
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;

use super::Device;
use crate::ports::{PhotonCounterHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;

pub const COUNTS: &str = "counts";
pub const TOTAL_COUNTS: &str = "total counts";

#[derive(Debug)]
pub struct PhotonCounter<H, L> {
    core: DeviceCore<L>,
    hardware: H,
    settings: Option<CounterSettings>,
    averages: u32,
}

impl<H: PhotonCounterHardware, L: WireLink> PhotonCounter<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the counter.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the counter cannot be opened.
    pub async fn construct<C>(
        config_path: &Path,
        name: &str,
        hardware: H,
        connector: &C,
        wire: &WireSettings,
    ) -> Result<Self, LabError>
    where
        C: WireConnector<Link = L>,
    {
        let core = DeviceCore::bind(config_path, name, connector, wire).await?;
        Self::with_core(core, hardware).await
    }

    /// Open `hardware` behind an already assembled core.
    ///
    /// # Errors
    ///
    /// [`LabError::DeviceInit`] if the counter cannot be opened.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self {
            core,
            hardware,
            settings: None,
            averages: 1,
        })
    }

    #[must_use]
    pub fn settings(&self) -> Option<&CounterSettings> {
        self.settings.as_ref()
    }

    fn read_settings(&self) -> Result<(CounterSettings, u32), LabError> {
        let number_of_gates: u16 = self.core.require("number_of_gates")?;
        if number_of_gates == 0 {
            return Err(self.core.invalid("number_of_gates", "must be at least 1"));
        }
        let literal: String = self.core.require("gate_time")?;
        let gate_time: GateTime = literal
            .parse()
            .map_err(|reason: String| self.core.invalid("gate_time", reason))?;
        let transfer_type: TransferType = self.core.require("transfer_type")?;
        let trigger_type: TriggerType = self.core.require("trigger_type")?;
        let averages: u32 = self.core.require("averages")?;
        if averages == 0 {
            return Err(self.core.invalid("averages", "must be at least 1"));
        }
        let settings = CounterSettings {
            gate_time,
            transfer_type,
            trigger_type,
            number_of_gates,
        };
        Ok((settings, averages))
    }

    async fn apply(&mut self, settings: &CounterSettings) -> Result<(), TransferError> {
        self.core.check("reset", self.hardware.reset().await)?;
        self.core
            .check("configure", self.hardware.configure(settings).await)
    }

    async fn count_once(&mut self, settings: &CounterSettings) -> Result<Vec<u32>, LabError> {
        self.core.check("open", self.hardware.open().await)?;
        self.core.check("reset", self.hardware.reset().await)?;
        self.core
            .check("configure", self.hardware.configure(settings).await)?;
        self.core.check("start", self.hardware.start().await)?;
        let expected = usize::from(settings.number_of_gates);
        let read = self.hardware.read().await.and_then(|bins| {
            if bins.len() == expected {
                return Ok(bins);
            }
            tracing::warn!(
                device = %self.core.name(),
                expected,
                received = bins.len(),
                "counter returned a different number of gates"
            );
            Err(HardwareFault::Rejected)
        });
        let bins = self.core.fetched("read", read)?;
        self.core.check("stop", self.hardware.stop().await)?;
        self.core.check("reset", self.hardware.reset().await)?;
        Ok(bins)
    }

    async fn acquire(&mut self, settings: CounterSettings) -> Result<MeasurementRecord, LabError> {
        let mut sums: Vec<u64> = vec![0; usize::from(settings.number_of_gates)];
        let mut total: u64 = 0;
        for _ in 0..self.averages {
            let bins = self.count_once(&settings).await?;
            for (sum, count) in sums.iter_mut().zip(&bins) {
                *sum += u64::from(*count);
            }
            total += bins.iter().copied().map(u64::from).sum::<u64>();
        }

        let cycles = f64::from(self.averages);
        #[allow(clippy::cast_precision_loss)]
        let per_gate: Vec<f64> = sums.iter().map(|sum| *sum as f64 / cycles).collect();
        #[allow(clippy::cast_precision_loss)]
        let total = total as f64 / cycles;
        Ok(MeasurementRecord::new()
            .with(COUNTS, per_gate)
            .with(TOTAL_COUNTS, [total]))
    }
}

impl<H: PhotonCounterHardware, L: WireLink> Device for PhotonCounter<H, L> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn state(&self) -> LifecycleState {
        self.core.state()
    }

    fn config(&self) -> &BoundConfig {
        self.core.config()
    }

    fn record(&self) -> &MeasurementRecord {
        self.core.record()
    }

    #[tracing::instrument(skip(self), fields(device = %self.core.name()))]
    async fn setup_config(&mut self) -> Result<(), LabError> {
        self.core.begin_setup()?;
        let (settings, averages) = self.read_settings()?;
        tracing::debug!(gate_time = %settings.gate_time, gate_code = settings.gate_time.code(), "counter settings");

        if let Err(err) = self.apply(&settings).await {
            return Err(self.core.fail(err.into()));
        }
        self.settings = Some(settings);
        self.averages = averages;
        self.core.transition(LifecycleState::Configured);
        self.core.transition(LifecycleState::Ready);
        Ok(())
    }

    async fn measure(&mut self) -> Result<MeasurementRecord, LabError> {
        let settings = self.settings.ok_or_else(|| self.core.refuse("measure"))?;
        self.core.begin_measure()?;
        let outcome = self.acquire(settings).await;
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use rexlab_domain::config::ConfigDocument;

    use super::*;
    use crate::ports::{BusyProbe, Hardware};
    use crate::services::telemetry::Telemetry;
    use crate::testing::FakeLink;

    /// Counter whose `n`-th read returns `[n, 2n, 3n, …]`.
    #[derive(Debug, Default)]
    struct ScriptedCounter {
        calls: Vec<&'static str>,
        reads: u32,
        gates: usize,
        reject_start: bool,
        short_read: bool,
    }

    impl BusyProbe for ScriptedCounter {
        fn is_busy(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            async { Ok(false) }
        }
    }

    impl Hardware for ScriptedCounter {
        type Settings = CounterSettings;
        type Reading = Vec<u32>;

        fn open(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.calls.push("open");
            async { Ok(true) }
        }

        fn reset(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.calls.push("reset");
            async { Ok(true) }
        }

        fn configure(
            &mut self,
            settings: &CounterSettings,
        ) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.calls.push("configure");
            self.gates = usize::from(settings.number_of_gates);
            async { Ok(true) }
        }

        fn start(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.calls.push("start");
            let accepted = !self.reject_start;
            async move { Ok(accepted) }
        }

        fn read(&mut self) -> impl Future<Output = Result<Vec<u32>, HardwareFault>> + Send {
            self.calls.push("read");
            self.reads += 1;
            let n = self.reads;
            let mut bins: Vec<u32> = (1..=u32::try_from(self.gates).unwrap()).map(|gate| gate * n).collect();
            if self.short_read {
                bins.pop();
            }
            async move { Ok(bins) }
        }

        fn stop(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.calls.push("stop");
            async { Ok(true) }
        }

        fn close(&mut self) -> impl Future<Output = Result<(), HardwareFault>> + Send {
            async { Ok(()) }
        }
    }

    const DOCUMENT: &str = r#"
[device.counter]
number_of_gates = 3
gate_time = "1ms"
transfer_type = "block_transfer"
trigger_type = "software"
averages = 2
"#;

    async fn counter(document: &str, hardware: ScriptedCounter) -> PhotonCounter<ScriptedCounter, FakeLink> {
        let config = ConfigDocument::from_toml_str(document).unwrap().bind("counter");
        PhotonCounter::with_core(DeviceCore::new(config, Telemetry::detached("counter")), hardware)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn should_parse_counter_settings() {
        let mut counter = counter(DOCUMENT, ScriptedCounter::default()).await;
        counter.setup_config().await.unwrap();
        let settings = counter.settings().unwrap();
        assert_eq!(settings.gate_time.code(), 0x06);
        assert_eq!(settings.transfer_type, TransferType::BlockTransfer);
        assert_eq!(settings.trigger_type, TriggerType::Software);
        assert_eq!(settings.number_of_gates, 3);
    }

    #[tokio::test]
    async fn should_run_full_cycle_per_average() {
        let mut counter = counter(DOCUMENT, ScriptedCounter::default()).await;
        counter.setup_config().await.unwrap();
        counter.hardware.calls.clear();
        counter.measure().await.unwrap();

        let cycle = ["open", "reset", "configure", "start", "read", "stop", "reset"];
        let expected: Vec<&str> = cycle.iter().chain(cycle.iter()).copied().collect();
        assert_eq!(counter.hardware.calls, expected);
    }

    #[tokio::test]
    async fn should_average_bins_and_totals_over_cycles() {
        let mut counter = counter(DOCUMENT, ScriptedCounter::default()).await;
        counter.setup_config().await.unwrap();
        let record = counter.measure().await.unwrap();

        // reads [1, 2, 3] and [2, 4, 6]
        let counts: Vec<f64> = record
            .get(COUNTS)
            .unwrap()
            .iter()
            .filter_map(|value| value.as_f64())
            .collect();
        assert_eq!(counts, vec![1.5, 3.0, 4.5]);
        assert_eq!(record.scalar(TOTAL_COUNTS).unwrap().as_f64(), Some(9.0));
    }

    #[tokio::test]
    async fn should_reject_unknown_gate_time() {
        let document = DOCUMENT.replace("\"1ms\"", "\"3ms\"");
        let mut counter = counter(&document, ScriptedCounter::default()).await;
        let err = counter.setup_config().await.unwrap_err();
        assert!(matches!(err, LabError::Config(_)));
    }

    #[tokio::test]
    async fn should_reject_unknown_transfer_type() {
        let document = DOCUMENT.replace("block_transfer", "burst");
        let mut counter = counter(&document, ScriptedCounter::default()).await;
        assert!(matches!(
            counter.setup_config().await.unwrap_err(),
            LabError::Config(_)
        ));
    }

    #[tokio::test]
    async fn should_fail_measure_when_start_rejected() {
        let mut counter = counter(DOCUMENT, ScriptedCounter::default()).await;
        counter.setup_config().await.unwrap();
        counter.hardware.reject_start = true;
        let err = counter.measure().await.unwrap_err();
        let LabError::Transfer(transfer) = err else {
            panic!("expected transfer error");
        };
        assert_eq!(transfer.operation, "start");
        assert_eq!(counter.state(), LifecycleState::Uncertain);
    }

    #[tokio::test]
    async fn should_fail_measure_when_gate_count_differs() {
        let mut counter = counter(DOCUMENT, ScriptedCounter::default()).await;
        counter.setup_config().await.unwrap();
        counter.hardware.short_read = true;
        let err = counter.measure().await.unwrap_err();
        let LabError::Transfer(transfer) = err else {
            panic!("expected transfer error");
        };
        assert_eq!(transfer.operation, "read");
        assert!(matches!(transfer.source, HardwareFault::Rejected));
        assert_eq!(counter.state(), LifecycleState::Uncertain);
        assert!(counter.record().is_empty());
    }
}
