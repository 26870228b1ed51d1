//! Device lifecycle — `Constructed → Configured → Ready → (Measuring → Ready)* → Closed`.
//!
//! A device that failed mid-acquisition (timeout, rejected vendor call) is
//! [`Uncertain`](LifecycleState::Uncertain): it keeps its configuration but
//! must not be commanded again until it has been set up anew.

use serde::{Deserialize, Serialize};

/// Where a device currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Constructed,
    Configured,
    Ready,
    Measuring,
    Uncertain,
    Closed,
}

impl LifecycleState {
    /// Whether `setup_config()` may run from this state.
    #[must_use]
    pub fn can_configure(self) -> bool {
        !matches!(self, Self::Measuring | Self::Closed)
    }

    /// Whether `measure()` (or any other hardware command) may run.
    #[must_use]
    pub fn can_measure(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether hardware commands issued from this state leave the device in
    /// a known condition.
    #[must_use]
    pub fn is_trusted(self) -> bool {
        !matches!(self, Self::Uncertain | Self::Closed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constructed => f.write_str("constructed"),
            Self::Configured => f.write_str("configured"),
            Self::Ready => f.write_str("ready"),
            Self::Measuring => f.write_str("measuring"),
            Self::Uncertain => f.write_str("uncertain"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_constructed() {
        assert_eq!(LifecycleState::default(), LifecycleState::Constructed);
    }

    #[test]
    fn should_only_measure_when_ready() {
        assert!(LifecycleState::Ready.can_measure());
        assert!(!LifecycleState::Constructed.can_measure());
        assert!(!LifecycleState::Configured.can_measure());
        assert!(!LifecycleState::Uncertain.can_measure());
        assert!(!LifecycleState::Closed.can_measure());
    }

    #[test]
    fn should_allow_reconfiguring_an_uncertain_device() {
        assert!(LifecycleState::Uncertain.can_configure());
        assert!(!LifecycleState::Closed.can_configure());
    }

    #[test]
    fn should_not_trust_uncertain_or_closed_devices() {
        assert!(!LifecycleState::Uncertain.is_trusted());
        assert!(!LifecycleState::Closed.is_trusted());
        assert!(LifecycleState::Configured.is_trusted());
    }

    #[test]
    fn should_display_lowercase_variant_name() {
        assert_eq!(LifecycleState::Measuring.to_string(), "measuring");
        assert_eq!(LifecycleState::Uncertain.to_string(), "uncertain");
    }
}
