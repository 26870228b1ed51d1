//! Wire port — line-oriented connection to the Aggregator.
//!
//! The protocol is one JSON object per line from the client, answered by one
//! acknowledgement line from the Aggregator. Exactly one outstanding line
//! per connection.

use std::future::Future;

use rexlab_domain::error::WireConnectError;

/// Default Aggregator host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default Aggregator port.
pub const DEFAULT_PORT: u16 = 8080;

/// Where (and whether) to connect to the Aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireSettings {
    /// When `false`, no connection is attempted and telemetry stays detached.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for WireSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl WireSettings {
    /// Settings that never dial the Aggregator.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// `host:port`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Failure on an established link.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Writing the line or reading the acknowledgement failed.
    #[error("wire I/O error")]
    Io(#[from] std::io::Error),

    /// The Aggregator closed the connection before acknowledging.
    #[error("aggregator closed the connection")]
    Closed,
}

/// An open, exclusively owned connection to the Aggregator.
pub trait WireLink: Send + Sync {
    /// Write one newline-terminated line, then wait for one acknowledgement
    /// line. Returns the acknowledgement without its line terminator.
    fn exchange(&mut self, line: &str) -> impl Future<Output = Result<String, WireError>> + Send;

    /// Close the write side. Errors are not reported.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Dials the Aggregator.
pub trait WireConnector: Sync {
    type Link: WireLink;

    /// Open a new link.
    fn connect(
        &self,
        settings: &WireSettings,
    ) -> impl Future<Output = Result<Self::Link, WireConnectError>> + Send;
}
