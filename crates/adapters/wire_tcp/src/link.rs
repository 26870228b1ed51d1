//! TCP connector and link.

use rexlab_app::ports::{WireConnector, WireError, WireLink, WireSettings};
use rexlab_domain::error::WireConnectError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Dials the Aggregator over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl WireConnector for TcpConnector {
    type Link = TcpLink;

    async fn connect(&self, settings: &WireSettings) -> Result<TcpLink, WireConnectError> {
        let addr = settings.addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| WireConnectError {
                addr: addr.clone(),
                source,
            })?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %err, "could not disable Nagle");
        }
        Ok(TcpLink::new(stream, addr))
    }
}

/// One exclusively owned connection to the Aggregator.
///
/// Dropping the link closes the socket.
#[derive(Debug)]
pub struct TcpLink {
    addr: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpLink {
    fn new(stream: TcpStream, addr: String) -> Self {
        let (read, write) = stream.into_split();
        Self {
            addr,
            reader: BufReader::new(read),
            writer: write,
        }
    }

    /// `host:port` this link was dialed to.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl WireLink for TcpLink {
    async fn exchange(&mut self, line: &str) -> Result<String, WireError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        // ack content is not interpreted, bytes need not be UTF-8
        let mut ack = Vec::new();
        if self.reader.read_until(b'\n', &mut ack).await? == 0 {
            return Err(WireError::Closed);
        }
        Ok(String::from_utf8_lossy(&ack)
            .trim_end_matches(['\r', '\n'])
            .to_string())
    }

    async fn shutdown(&mut self) {
        if let Err(err) = self.writer.shutdown().await {
            tracing::debug!(addr = %self.addr, error = %err, "wire shutdown failed");
        }
    }
}
