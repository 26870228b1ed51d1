//! Common error types used across the workspace.
//!
//! Each failure class of the instrument layer has its own typed error and
//! converts into [`LabError`] via `#[from]`. Only the telemetry path is
//! allowed to degrade silently; every hardware-control failure is surfaced.

use std::time::Duration;

use crate::lifecycle::LifecycleState;

/// Top-level error for the rexlab workspace.
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    /// A required configuration key is absent at every depth.
    #[error("missing configuration key")]
    MissingConfigKey(#[from] MissingConfigKey),

    /// The configuration document could not be loaded or a value has the wrong shape.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// Hardware could not be located or opened while constructing a device.
    #[error("device initialisation failed")]
    DeviceInit(#[from] DeviceInitError),

    /// Hardware stayed busy past the poll timeout.
    #[error("hardware timeout")]
    HardwareTimeout(#[from] HardwareTimeout),

    /// A vendor call reported failure.
    #[error("hardware transfer failed")]
    Transfer(#[from] TransferError),

    /// The Aggregator could not be reached.
    #[error("telemetry connection failed")]
    WireConnect(#[from] WireConnectError),

    /// An operation was attempted in a lifecycle state that forbids it.
    #[error("invalid device lifecycle transition")]
    Lifecycle(#[from] LifecycleError),

    /// Persistence of the run log failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A required key was not found anywhere in a device's bound configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("key `{key}` not found in configuration of device `{device}`")]
pub struct MissingConfigKey {
    /// Device whose bound configuration was searched.
    pub device: String,
    /// The key (or dotted path) that was looked up.
    pub key: String,
}

/// Loading or interpreting the configuration document failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document could not be read.
    #[error("failed to read configuration document {path}")]
    Io {
        /// Path of the document.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML.
    #[error("failed to parse configuration document")]
    Parse(#[from] toml::de::Error),

    /// A value exists but cannot be interpreted as the requested type.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Human-readable explanation.
        reason: String,
    },
}

/// Vendor-level cause of a hardware failure.
#[derive(Debug, thiserror::Error)]
pub enum HardwareFault {
    /// The vendor primitive returned a failure flag.
    #[error("vendor call reported failure")]
    Rejected,

    /// No matching instrument was found on any bus.
    #[error("instrument not found")]
    NotFound,

    /// The instrument handle is no longer usable.
    #[error("instrument disconnected")]
    Disconnected,

    /// A vendor error code.
    #[error("vendor error {code}: {message}")]
    Vendor {
        /// Raw vendor error code.
        code: i32,
        /// Vendor-supplied message.
        message: String,
    },

    /// Transport-level I/O failure.
    #[error("instrument I/O error")]
    Io(#[from] std::io::Error),
}

/// The hardware behind a device could not be opened during construction.
#[derive(Debug, thiserror::Error)]
#[error("failed to open hardware for device `{device}`")]
pub struct DeviceInitError {
    /// Device being constructed.
    pub device: String,
    #[source]
    pub source: HardwareFault,
}

/// The busy predicate kept reporting busy until the timeout elapsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hardware still busy after {waited:?} (timeout {timeout:?})")]
pub struct HardwareTimeout {
    /// Time spent polling before giving up.
    pub waited: Duration,
    /// Configured bound.
    pub timeout: Duration,
}

/// A vendor call failed or reported an unsuccessful transfer.
#[derive(Debug, thiserror::Error)]
#[error("`{operation}` failed on device `{device}`")]
pub struct TransferError {
    /// Device issuing the call.
    pub device: String,
    /// Vendor primitive that failed (`open`, `configure`, `read`, …).
    pub operation: &'static str,
    #[source]
    pub source: HardwareFault,
}

/// The Aggregator did not accept a connection.
#[derive(Debug, thiserror::Error)]
#[error("could not connect to aggregator at {addr}")]
pub struct WireConnectError {
    /// `host:port` that was dialled.
    pub addr: String,
    #[source]
    pub source: std::io::Error,
}

/// An operation is not permitted in the device's current lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {operation} device `{device}` while {state}")]
pub struct LifecycleError {
    /// Device the operation targeted.
    pub device: String,
    /// Attempted operation.
    pub operation: &'static str,
    /// State at the time of the attempt.
    pub state: LifecycleState,
}

impl From<toml::de::Error> for LabError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(ConfigError::Parse(err))
    }
}
