//! Error taxonomy for the doser RPC client.
//!
//! Every variant is surfaced to the caller of `call`/`call_batch`; the
//! client never retries. Use [`RpcError::is_transport`] to decide whether a
//! failure happened before any request byte reached the device.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::rpc::message::RemoteError;

#[derive(Debug, Error)]
pub enum RpcError {
    /// TCP connection was not established within the connect timeout.
    #[error("Connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// Connection refused, reset, or the host could not be resolved.
    #[error("Connection to {addr} failed: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The request frame could not be written in full.
    #[error("Failed to send request: {0}")]
    Write(#[source] io::Error),

    /// The socket failed while waiting for the response frame.
    #[error("Failed to read response: {0}")]
    Read(#[source] io::Error),

    /// Peer closed the stream before sending a NUL delimiter.
    #[error("Connection closed after {received} bytes without a frame delimiter")]
    Framing { received: usize },

    /// More than the configured maximum was buffered without a delimiter.
    #[error("Response frame exceeds maximum of {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// No bytes arrived within the idle-read timeout.
    #[error("No response data received for {0:?}")]
    ReadTimeout(Duration),

    /// The frame payload is not UTF-8 or not JSON.
    #[error("Malformed response payload ({reason}): {}", String::from_utf8_lossy(.raw))]
    Decode { reason: String, raw: Vec<u8> },

    /// The request could not be serialized.
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// A batch call was made with no calls in it.
    #[error("Batch request must contain at least one call")]
    EmptyBatch,

    /// Well-formed JSON with the wrong shape, or ids that do not correlate.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device reported an application-level error.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl RpcError {
    /// True for failures that happened while establishing the connection.
    ///
    /// Such calls never reached the device and are safe to retry.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectTimeout { .. } | RpcError::Connection { .. }
        )
    }

    /// The device error, when this failure came from the device itself.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            RpcError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_error_display() {
        let timeout_err = RpcError::ConnectTimeout {
            addr: "192.168.1.20:1022".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(
            timeout_err.to_string(),
            "Connection to 192.168.1.20:1022 timed out after 5s"
        );

        let framing_err = RpcError::Framing { received: 12 };
        assert_eq!(
            framing_err.to_string(),
            "Connection closed after 12 bytes without a frame delimiter"
        );

        let protocol_err = RpcError::Protocol("id mismatch".to_string());
        assert_eq!(protocol_err.to_string(), "Protocol error: id mismatch");
    }

    #[test]
    fn test_decode_error_includes_raw_bytes() {
        let err = RpcError::Decode {
            reason: "expected value at line 1 column 1".to_string(),
            raw: b"garbage".to_vec(),
        };
        let message = err.to_string();
        assert!(message.contains("garbage"), "missing raw bytes: {}", message);
    }

    #[test]
    fn test_remote_error_is_transparent() {
        let remote = RemoteError::new(json!({"code": 100, "message": "Pump is running"}));
        let err: RpcError = remote.clone().into();
        assert_eq!(err.to_string(), remote.to_string());
        assert_eq!(err.as_remote(), Some(&remote));
    }

    #[test]
    fn test_is_transport() {
        let refused = RpcError::Connection {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(refused.is_transport());
        assert!(!RpcError::Framing { received: 0 }.is_transport());
        assert!(!RpcError::Write(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).is_transport());
    }
}
