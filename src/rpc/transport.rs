//! One-shot TCP transport.
//!
//! Every call opens its own connection, writes one frame, waits for one
//! frame back and closes. The firmware runs a single-connection listener,
//! so connections are never pooled or shared.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::rpc::error::RpcError;
use crate::rpc::framing::{decode_frame, read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};

/// Connection settings for one-shot calls.
///
/// A `Transport` holds no socket; each [`call`](Self::call) opens and
/// closes its own connection, so one value can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct Transport {
    /// Upper bound on establishing the TCP connection.
    connect_timeout: Duration,
    /// Idle-read timeout while awaiting the response frame.
    read_timeout: Option<Duration>,
    /// Largest response payload accepted before the delimiter.
    max_frame_size: usize,
    /// How long to drain after half-closing before dropping the socket.
    close_timeout: Duration,
}

impl Transport {
    /// Create a transport with the given connect timeout, no idle-read
    /// timeout and the default frame cap.
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            close_timeout: Duration::from_secs(1),
        }
    }

    /// Create a transport from the timeouts and limits in `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            max_frame_size: config.max_frame_size,
            close_timeout: config.close_timeout,
        }
    }

    /// Send one encoded frame to `host:port` and return the decoded reply.
    ///
    /// The connection is closed on every exit path. Dropping the returned
    /// future mid-call drops the socket with it.
    pub async fn call(&self, frame: &[u8], host: &str, port: u16) -> Result<Value, RpcError> {
        let addr = format!("{}:{}", host, port);
        let mut stream = self.connect(host, port, &addr).await?;
        debug!(%addr, "connected");

        let outcome = self.exchange(&mut stream, frame).await;
        close_gracefully(stream, self.close_timeout).await;
        debug!(%addr, ok = outcome.is_ok(), "connection closed");

        outcome
    }

    async fn connect(&self, host: &str, port: u16, addr: &str) -> Result<TcpStream, RpcError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(RpcError::Connection {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(RpcError::ConnectTimeout {
                    addr: addr.to_string(),
                    timeout: self.connect_timeout,
                })
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }
        Ok(stream)
    }

    async fn exchange(&self, stream: &mut TcpStream, frame: &[u8]) -> Result<Value, RpcError> {
        write_frame(stream, frame).await?;
        let payload = read_frame(stream, self.max_frame_size, self.read_timeout).await?;
        decode_frame(payload)
    }
}

/// Half-close our side, drain until the device closes (bounded by
/// `linger`), then drop the socket.
async fn close_gracefully(mut stream: TcpStream, linger: Duration) {
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown failed; dropping connection");
        return;
    }

    let drain = async {
        let mut sink = [0u8; 256];
        let mut drained = 0usize;
        loop {
            match stream.read(&mut sink).await {
                Ok(0) | Err(_) => break drained,
                Ok(n) => drained += n,
            }
        }
    };

    match timeout(linger, drain).await {
        Ok(0) => {}
        Ok(drained) => warn!(drained, "device sent data after the response frame"),
        Err(_) => debug!(?linger, "device did not close in time; dropping connection"),
    }
}
