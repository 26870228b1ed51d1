//! In-memory fakes shared by the unit tests of this crate.

use std::future::Future;
use std::sync::{Arc, Mutex};

use rexlab_domain::error::WireConnectError;

use crate::ports::{WireConnector, WireError, WireLink, WireSettings};

pub(crate) const ACK: &str = "Device measurements recorded";

/// Lines received by every link of one [`FakeConnector`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Inbox(Arc<Mutex<Vec<String>>>);

impl Inbox {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn json(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Connector handing out in-memory links.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    pub(crate) inbox: Inbox,
    /// Refuse every connection.
    pub(crate) refuse: bool,
    /// Links fail every exchange after this many successful ones.
    pub(crate) fail_after: Option<usize>,
}

impl FakeConnector {
    pub(crate) fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_after(sends: usize) -> Self {
        Self {
            fail_after: Some(sends),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeLink {
    inbox: Inbox,
    remaining: Option<usize>,
}

impl WireLink for FakeLink {
    fn exchange(&mut self, line: &str) -> impl Future<Output = Result<String, WireError>> + Send {
        let result = match self.remaining {
            Some(0) => Err(WireError::Closed),
            _ => {
                self.remaining = self.remaining.map(|n| n - 1);
                assert!(line.ends_with('\n'), "lines must be newline-terminated");
                self.inbox.0.lock().unwrap().push(line.trim_end().to_string());
                Ok(ACK.to_string())
            }
        };
        async move { result }
    }

    fn shutdown(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl WireConnector for FakeConnector {
    type Link = FakeLink;

    fn connect(
        &self,
        settings: &WireSettings,
    ) -> impl Future<Output = Result<FakeLink, WireConnectError>> + Send {
        let result = if self.refuse {
            Err(WireConnectError {
                addr: settings.addr(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            })
        } else {
            Ok(FakeLink {
                inbox: self.inbox.clone(),
                remaining: self.fail_after,
            })
        };
        async move { result }
    }
}
