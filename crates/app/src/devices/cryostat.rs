//! Closed-cycle cryostat with a preparation pipeline.
//!
//! `setup_config()` walks `Idle → Bakeout → Purge → Cooldown → Stable`,
//! skipping disabled stages. Each stage is started on the controller and then
//! awaited through the poller; `Stable` is reached once the reported
//! temperature stability is within `desired_stability`.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::cryostat::{Bakeout, PreparationPlan, PreparationStage, TemperatureProbe};
use rexlab_domain::error::{HardwareFault, LabError};
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;

use super::Device;
use crate::ports::hardware::CryostatSettings;
use crate::ports::{BusyProbe, CryostatHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;
use crate::services::sync_poller::{PollPolicy, wait_until_ready};

pub const TEMPERATURE: &str = "temperature (K)";
pub const STABILITY: &str = "stability (K)";
pub const PRESSURE: &str = "pressure (Pa)";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// Busy until the cryostat's stability is within `desired` kelvin. A
/// non-finite stability never counts as settled.
struct StabilityProbe<'a, H> {
    hardware: &'a mut H,
    desired: f64,
}

impl<H: CryostatHardware> BusyProbe for StabilityProbe<'_, H> {
    fn is_busy(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
        let desired = self.desired;
        let reading = self.hardware.read();
        async move {
            let stability = reading.await?.stability;
            Ok(!stability.is_finite() || stability.abs() > desired)
        }
    }
}

/// A cryostat that prepares itself during setup.
#[derive(Debug)]
pub struct Cryostat<H, L> {
    core: DeviceCore<L>,
    hardware: H,
    settings: Option<CryostatSettings>,
    plan: Option<PreparationPlan>,
    stage: PreparationStage,
    policy: PollPolicy,
}

impl<H: CryostatHardware, L: WireLink> Cryostat<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the controller.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the controller cannot be reached.
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
    /// [`LabError::DeviceInit`] if the controller cannot be reached.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self {
            core,
            hardware,
            settings: None,
            plan: None,
            stage: PreparationStage::Idle,
            policy: PollPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_STAGE_TIMEOUT),
        })
    }

    /// Last preparation stage entered.
    #[must_use]
    pub fn stage(&self) -> PreparationStage {
        self.stage
    }

    #[must_use]
    pub fn plan(&self) -> Option<&PreparationPlan> {
        self.plan.as_ref()
    }

    fn read_plan(&self) -> Result<PreparationPlan, LabError> {
        let desired_stability: f64 = self.core.require("desired_stability")?;
        if desired_stability <= 0.0 {
            return Err(self.core.invalid("desired_stability", "must be positive"));
        }

        let bakeout = if self.core.optional("enable_bakeout", false)? {
            let temperature: f64 = self.core.require("bakeout_temperature")?;
            let minutes: f64 = self.core.require("bakeout_time")?;
            let duration = Duration::try_from_secs_f64(minutes * 60.0)
                .map_err(|_| self.core.invalid("bakeout_time", "must be a non-negative number of minutes"))?;
            Some(Bakeout {
                temperature,
                duration,
            })
        } else {
            None
        };

        let purges = if self.core.optional("enable_purge", false)? {
            Some(self.core.require::<u32>("purges")?)
        } else {
            None
        };

        let cooldown_target = if self.core.optional("enable_cooldown", true)? {
            Some(self.core.require::<f64>("inital_cooldown_target")?)
        } else {
            None
        };

        Ok(PreparationPlan {
            bakeout,
            purges,
            cooldown_target,
            desired_stability,
        })
    }

    async fn prepare(&mut self, settings: CryostatSettings, plan: &PreparationPlan) -> Result<(), LabError> {
        self.core
            .check("configure", self.hardware.configure(&settings).await)?;
        self.core.transition(LifecycleState::Configured);
        self.stage = PreparationStage::Idle;

        for stage in plan.stages() {
            self.stage = stage;
            tracing::info!(device = %self.core.name(), %stage, "entering preparation stage");
            match stage {
                PreparationStage::Bakeout => {
                    if let Some(bakeout) = plan.bakeout {
                        self.core
                            .check("bakeout", self.hardware.begin_bakeout(&bakeout).await)?;
                        let policy = self
                            .policy
                            .with_timeout(bakeout.duration + self.policy.timeout);
                        wait_until_ready(&mut self.hardware, policy).await?;
                    }
                }
                PreparationStage::Purge => {
                    if let Some(cycles) = plan.purges {
                        self.core
                            .check("purge", self.hardware.begin_purge(cycles).await)?;
                        wait_until_ready(&mut self.hardware, self.policy).await?;
                    }
                }
                PreparationStage::Cooldown => {
                    if let Some(target) = plan.cooldown_target {
                        self.core
                            .check("cooldown", self.hardware.begin_cooldown(target).await)?;
                        wait_until_ready(&mut self.hardware, self.policy).await?;
                    }
                }
                PreparationStage::Stable => {
                    let mut probe = StabilityProbe {
                        hardware: &mut self.hardware,
                        desired: plan.desired_stability,
                    };
                    wait_until_ready(&mut probe, self.policy).await?;
                }
                PreparationStage::Idle => {}
            }
        }
        Ok(())
    }
}

impl<H: CryostatHardware, L: WireLink> Device for Cryostat<H, L> {
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
        let plan = self.read_plan()?;
        let probe: TemperatureProbe = self
            .core
            .optional("temperature_probe", TemperatureProbe::Sample)?;
        let interval = self
            .core
            .optional_duration("poll_interval", DEFAULT_POLL_INTERVAL)?;
        let timeout = self
            .core
            .optional_duration("stage_timeout", DEFAULT_STAGE_TIMEOUT)?;
        self.policy = PollPolicy::new(interval, timeout);

        let settings = CryostatSettings { probe };
        if let Err(err) = self.prepare(settings, &plan).await {
            return Err(self.core.fail(err));
        }
        self.settings = Some(settings);
        self.plan = Some(plan);
        self.core.transition(LifecycleState::Ready);
        Ok(())
    }

    async fn measure(&mut self) -> Result<MeasurementRecord, LabError> {
        self.core.begin_measure()?;
        let outcome = match self.core.fetched("read", self.hardware.read().await) {
            Ok(reading) => Ok(MeasurementRecord::new()
                .with(TEMPERATURE, [reading.temperature])
                .with(STABILITY, [reading.stability])
                .with(PRESSURE, [reading.pressure])),
            Err(err) => Err(err.into()),
        };
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}

#[cfg(test)]
mod tests {
    use rexlab_domain::config::ConfigDocument;

    use super::*;
    use crate::ports::Hardware;
    use crate::ports::hardware::CryostatReading;
    use crate::services::telemetry::Telemetry;
    use crate::testing::FakeLink;

    /// Controller where each stage runs for `stage_polls` busy queries and
    /// stability halves on every read.
    #[derive(Debug)]
    struct ScriptedCryostat {
        stage_polls: usize,
        remaining: usize,
        stability: f64,
        commands: Vec<String>,
    }

    impl ScriptedCryostat {
        fn new(stage_polls: usize) -> Self {
            Self {
                stage_polls,
                remaining: 0,
                stability: 0.8,
                commands: Vec::new(),
            }
        }

        fn begin(&mut self, command: String) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.commands.push(command);
            self.remaining = self.stage_polls;
            async { Ok(true) }
        }
    }

    impl BusyProbe for ScriptedCryostat {
        fn is_busy(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            let busy = self.remaining > 0;
            self.remaining = self.remaining.saturating_sub(1);
            async move { Ok(busy) }
        }
    }

    impl Hardware for ScriptedCryostat {
        type Settings = CryostatSettings;
        type Reading = CryostatReading;

        fn open(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            async { Ok(true) }
        }

        fn configure(
            &mut self,
            settings: &CryostatSettings,
        ) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.commands.push(format!("probe {:?}", settings.probe));
            async { Ok(true) }
        }

        fn read(&mut self) -> impl Future<Output = Result<CryostatReading, HardwareFault>> + Send {
            self.stability /= 2.0;
            let reading = CryostatReading {
                temperature: 4.2,
                stability: self.stability,
                pressure: 1e-4,
            };
            async move { Ok(reading) }
        }

        fn close(&mut self) -> impl Future<Output = Result<(), HardwareFault>> + Send {
            async { Ok(()) }
        }
    }

    impl CryostatHardware for ScriptedCryostat {
        fn begin_bakeout(
            &mut self,
            bakeout: &Bakeout,
        ) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.begin(format!("bakeout {} {:?}", bakeout.temperature, bakeout.duration))
        }

        fn begin_purge(&mut self, cycles: u32) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.begin(format!("purge {cycles}"))
        }

        fn begin_cooldown(&mut self, target: f64) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.begin(format!("cooldown {target}"))
        }
    }

    async fn cryostat(document: &str, hardware: ScriptedCryostat) -> Cryostat<ScriptedCryostat, FakeLink> {
        let config = ConfigDocument::from_toml_str(document).unwrap().bind("cryo");
        Cryostat::with_core(DeviceCore::new(config, Telemetry::detached("cryo")), hardware)
            .await
            .unwrap()
    }

    const FULL: &str = r#"
[device.cryo]
desired_stability = 0.1
inital_cooldown_target = 4.0
enable_bakeout = true
bakeout_temperature = 320.0
bakeout_time = 2
enable_purge = true
purges = 3
temperature_probe = "platform"
poll_interval = 0.5
stage_timeout = 10
"#;

    #[tokio::test(start_paused = true)]
    async fn should_run_every_enabled_stage_in_order() {
        let mut cryo = cryostat(FULL, ScriptedCryostat::new(2)).await;
        cryo.setup_config().await.unwrap();

        assert_eq!(cryo.state(), LifecycleState::Ready);
        assert_eq!(cryo.stage(), PreparationStage::Stable);
        assert_eq!(
            cryo.hardware.commands,
            vec![
                "probe Platform".to_string(),
                "bakeout 320 120s".to_string(),
                "purge 3".to_string(),
                "cooldown 4".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_disabled_stages() {
        let document = "[device.cryo]\ndesired_stability = 0.1\ninital_cooldown_target = 10\n";
        let mut cryo = cryostat(document, ScriptedCryostat::new(0)).await;
        cryo.setup_config().await.unwrap();
        assert_eq!(cryo.hardware.commands, vec!["probe Sample", "cooldown 10"]);
        assert_eq!(cryo.plan().unwrap().stages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_in_a_stuck_stage() {
        let mut cryo = cryostat(FULL, ScriptedCryostat::new(usize::MAX)).await;
        let started = tokio::time::Instant::now();
        let err = cryo.setup_config().await.unwrap_err();

        assert!(matches!(err, LabError::HardwareTimeout(_)));
        assert_eq!(cryo.stage(), PreparationStage::Bakeout);
        assert_eq!(cryo.state(), LifecycleState::Uncertain);
        // bakeout hold (2 min) plus the 10 s stage timeout
        assert_eq!(started.elapsed(), Duration::from_secs(130));
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_until_stability_reached() {
        let document = "[device.cryo]\ndesired_stability = 0.1\nenable_cooldown = false\n";
        let mut cryo = cryostat(document, ScriptedCryostat::new(0)).await;
        let started = tokio::time::Instant::now();
        cryo.setup_config().await.unwrap();
        // 0.4, 0.2, 0.1 -> stable on the third read
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(cryo.stage(), PreparationStage::Stable);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_settle_on_nan_stability() {
        let document = "[device.cryo]\ndesired_stability = 0.1\nenable_cooldown = false\nstage_timeout = 5\n";
        let mut hardware = ScriptedCryostat::new(0);
        hardware.stability = f64::NAN;
        let mut cryo = cryostat(document, hardware).await;
        let err = cryo.setup_config().await.unwrap_err();
        assert!(matches!(err, LabError::HardwareTimeout(_)));
        assert_eq!(cryo.stage(), PreparationStage::Stable);
        assert_eq!(cryo.state(), LifecycleState::Uncertain);
    }

    #[tokio::test(start_paused = true)]
    async fn should_record_thermal_state() {
        let document = "[device.cryo]\ndesired_stability = 1\nenable_cooldown = false\n";
        let mut cryo = cryostat(document, ScriptedCryostat::new(0)).await;
        cryo.setup_config().await.unwrap();
        let record = cryo.measure().await.unwrap();
        assert_eq!(record.scalar(TEMPERATURE).unwrap().as_f64(), Some(4.2));
        assert!(record.get(STABILITY).is_some());
        assert_eq!(record.scalar(PRESSURE).unwrap().as_f64(), Some(1e-4));
    }

    #[tokio::test]
    async fn should_require_bakeout_parameters_when_enabled() {
        let document = "[device.cryo]\ndesired_stability = 0.1\nenable_bakeout = true\nenable_cooldown = false\n";
        let mut cryo = cryostat(document, ScriptedCryostat::new(0)).await;
        let err = cryo.setup_config().await.unwrap_err();
        assert!(matches!(err, LabError::MissingConfigKey(ref missing) if missing.key == "bakeout_temperature"));
        assert_eq!(cryo.state(), LifecycleState::Constructed);
    }
}
