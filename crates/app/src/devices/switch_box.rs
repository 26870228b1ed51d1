//! Mixed-signal switch box: four output channels, each routed through a
//! 16-way matrix with selectable polarity.

use std::collections::BTreeMap;
use std::path::Path;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::LabError;
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;
use toml::Value;

use super::Device;
use crate::ports::hardware::{SwitchChannel, SwitchLayout};
use crate::ports::{SwitchBoxHardware, WireConnector, WireLink, WireSettings};
use crate::services::device_core::DeviceCore;

/// Highest matrix code.
pub const MAX_MATRIX_CODE: u8 = 0xF;

fn parse_matrix_code(value: &Value) -> Option<u8> {
    match value {
        Value::Integer(code) => u8::try_from(*code).ok(),
        Value::String(digit) => u8::from_str_radix(digit.trim(), 16).ok(),
        _ => None,
    }
    .filter(|code| *code <= MAX_MATRIX_CODE)
}

fn parse_polarity(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(inverted) => Some(*inverted),
        Value::Integer(0) => Some(false),
        Value::Integer(1) => Some(true),
        _ => None,
    }
}

#[derive(Debug)]
pub struct SwitchBox<H, L> {
    core: DeviceCore<L>,
    hardware: H,
}

impl<H: SwitchBoxHardware, L: WireLink> SwitchBox<H, L> {
    /// Bind `name` in the document at `config_path`, open telemetry and the box.
    ///
    /// # Errors
    ///
    /// [`LabError::Config`] if the document cannot be loaded,
    /// [`LabError::DeviceInit`] if the box cannot be opened.
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
    /// [`LabError::DeviceInit`] if the box cannot be opened.
    pub async fn with_core(core: DeviceCore<L>, mut hardware: H) -> Result<Self, LabError> {
        core.open_hardware(&mut hardware).await?;
        Ok(Self { core, hardware })
    }

    /// Route `channel` through matrix position `code` (`0x0..=0xF`).
    ///
    /// # Errors
    ///
    /// [`LabError::Lifecycle`] unless `Ready`, [`LabError::Config`] for a code
    /// out of range, [`LabError::Transfer`] if the box rejects the command.
    pub async fn set_channel_matrix(&mut self, channel: SwitchChannel, code: u8) -> Result<(), LabError> {
        self.core.ensure("switch", LifecycleState::can_measure)?;
        if code > MAX_MATRIX_CODE {
            return Err(self.core.invalid("matrix", format!("code {code} exceeds 0xF")));
        }
        let applied = self.hardware.set_matrix(channel, code).await;
        if let Err(err) = self.core.check("set_matrix", applied) {
            return Err(self.core.fail(err.into()));
        }
        tracing::debug!(device = %self.core.name(), %channel, code, "matrix switched");
        Ok(())
    }

    /// Set the polarity of `channel`.
    ///
    /// # Errors
    ///
    /// [`LabError::Lifecycle`] unless `Ready`, [`LabError::Transfer`] if the
    /// box rejects the command.
    pub async fn set_channel_polarity(
        &mut self,
        channel: SwitchChannel,
        inverted: bool,
    ) -> Result<(), LabError> {
        self.core.ensure("switch", LifecycleState::can_measure)?;
        let applied = self.hardware.set_polarity(channel, inverted).await;
        if let Err(err) = self.core.check("set_polarity", applied) {
            return Err(self.core.fail(err.into()));
        }
        tracing::debug!(device = %self.core.name(), %channel, inverted, "polarity switched");
        Ok(())
    }

    fn read_layout(&self) -> Result<SwitchLayout, LabError> {
        let mut layout = SwitchLayout::default();
        let matrix: BTreeMap<String, Value> = self.core.optional("matrix", BTreeMap::new())?;
        for (name, value) in &matrix {
            let channel: SwitchChannel = name
                .parse()
                .map_err(|reason: String| self.core.invalid("matrix", reason))?;
            let code = parse_matrix_code(value).ok_or_else(|| {
                self.core
                    .invalid("matrix", format!("`{value}` for {channel} is not a code 0..=F"))
            })?;
            layout.matrix.insert(channel, code);
        }

        let polarity: BTreeMap<String, Value> = self.core.optional("polarity", BTreeMap::new())?;
        for (name, value) in &polarity {
            let channel: SwitchChannel = name
                .parse()
                .map_err(|reason: String| self.core.invalid("polarity", reason))?;
            let inverted = parse_polarity(value).ok_or_else(|| {
                self.core
                    .invalid("polarity", format!("`{value}` for {channel} is not a polarity"))
            })?;
            layout.polarity.insert(channel, inverted);
        }
        Ok(layout)
    }
}

impl<H: SwitchBoxHardware, L: WireLink> Device for SwitchBox<H, L> {
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
        let layout = self.read_layout()?;
        let applied = self.hardware.configure(&layout).await;
        if let Err(err) = self.core.check("configure", applied) {
            return Err(self.core.fail(err.into()));
        }
        self.core.transition(LifecycleState::Configured);
        self.core.transition(LifecycleState::Ready);
        Ok(())
    }

    async fn measure(&mut self) -> Result<MeasurementRecord, LabError> {
        self.core.begin_measure()?;
        let outcome = match self.core.fetched("read", self.hardware.read().await) {
            Ok(states) => {
                let mut record = MeasurementRecord::new();
                for (channel, state) in states {
                    record.set(format!("{channel}_matrix"), [i64::from(state.matrix)]);
                    record.set(format!("{channel}_polarity"), [i64::from(state.inverted)]);
                }
                Ok(record)
            }
            Err(err) => Err(err.into()),
        };
        self.core.finish_measure(outcome).await
    }

    async fn close(&mut self) -> Result<(), LabError> {
        self.core.close(&mut self.hardware).await
    }
}
