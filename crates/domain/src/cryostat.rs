//! Cryostat preparation pipeline: `Idle → Bakeout → Purge → Cooldown → Stable`.
//!
//! Every intermediate stage can be switched off in the configuration; the
//! pipeline always ends in [`PreparationStage::Stable`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A stage of the cryostat preparation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreparationStage {
    Idle,
    Bakeout,
    Purge,
    Cooldown,
    Stable,
}

impl std::fmt::Display for PreparationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Bakeout => f.write_str("bakeout"),
            Self::Purge => f.write_str("purge"),
            Self::Cooldown => f.write_str("cooldown"),
            Self::Stable => f.write_str("stable"),
        }
    }
}

/// Which thermometer the cryostat reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureProbe {
    Sample,
    Platform,
}

/// Bakeout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bakeout {
    /// Target temperature in kelvin.
    pub temperature: f64,
    /// Hold time at temperature.
    pub duration: Duration,
}

/// The ordered, enabled stages a cryostat walks through during setup.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparationPlan {
    pub bakeout: Option<Bakeout>,
    pub purges: Option<u32>,
    /// Cooldown target in kelvin, when cooldown is enabled.
    pub cooldown_target: Option<f64>,
    /// Stability (kelvin) that must be reached before the cryostat is `Stable`.
    pub desired_stability: f64,
}

impl PreparationPlan {
    /// Stages to execute after `Idle`, in pipeline order.
    #[must_use]
    pub fn stages(&self) -> Vec<PreparationStage> {
        let mut stages = Vec::with_capacity(4);
        if self.bakeout.is_some() {
            stages.push(PreparationStage::Bakeout);
        }
        if self.purges.is_some() {
            stages.push(PreparationStage::Purge);
        }
        if self.cooldown_target.is_some() {
            stages.push(PreparationStage::Cooldown);
        }
        stages.push(PreparationStage::Stable);
        stages
    }
}
