//! # rexlab-adapter-wire-tcp
//!
//! TCP transport to the Aggregator.
//!
//! ## Responsibilities
//! - Implement [`WireConnector`](rexlab_app::ports::WireConnector) by dialing
//!   `host:port` with a tokio [`TcpStream`](tokio::net::TcpStream)
//! - Implement [`WireLink`](rexlab_app::ports::WireLink): write one line,
//!   block for exactly one acknowledgement line
//!
//! No reconnection is attempted; a broken link reports its error once and the
//! caller drops it.
//!
//! ## Dependency rule
//! Depends on `rexlab-app` (for port traits) and `rexlab-domain` (for error types).
//! The `app` and `domain` crates must never reference this adapter.

mod link;

pub use link::{TcpConnector, TcpLink};
