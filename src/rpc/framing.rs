//! NUL-delimited message framing for JSON-RPC over TCP.
//!
//! The doser firmware treats a single `0x00` byte as the end of a message,
//! in both directions. There is no length prefix and no header.
//!
//! # Wire Format
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"sys.hello","params":[]}\0
//! ```
//!
//! Compact JSON never contains a raw NUL (serde_json escapes U+0000 inside
//! strings as `\u0000`), so the delimiter cannot appear inside a payload we
//! produce.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::rpc::error::RpcError;

/// The frame terminator.
pub const FRAME_DELIMITER: u8 = 0x00;

/// Default cap on a single response frame (1 MiB).
///
/// The firmware's transmit buffer is 8 KiB, so anything near this size means
/// the stream is desynchronised.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

const READ_CHUNK_SIZE: usize = 1024;

/// Serialize `value` as compact JSON followed by the delimiter.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RpcError> {
    let mut frame = serde_json::to_vec(value).map_err(RpcError::Encode)?;
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Decode a frame payload (delimiter already stripped) into JSON.
///
/// The raw bytes are kept in the error for firmware debugging.
pub fn decode_frame(payload: Vec<u8>) -> Result<Value, RpcError> {
    let decoded = match std::str::from_utf8(&payload) {
        Ok(text) => serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e)),
        Err(e) => Err(format!("invalid UTF-8: {}", e)),
    };

    decoded.map_err(|reason| RpcError::Decode {
        reason,
        raw: payload,
    })
}

/// Write a complete frame and flush it.
///
/// The write only counts as done once the stream has accepted and flushed
/// every byte.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await.map_err(RpcError::Write)?;
    writer.flush().await.map_err(RpcError::Write)?;
    debug!(bytes = frame.len(), "request frame written");
    Ok(())
}

/// Read bytes until the next delimiter and return the payload before it.
///
/// Data may arrive in arbitrarily small pieces; the result is the same as if
/// the frame had arrived in one read. Bytes received after the delimiter are
/// discarded, as each connection carries exactly one exchange.
///
/// # Errors
///
/// - [`RpcError::Framing`] if the peer closes before a delimiter arrives
/// - [`RpcError::FrameTooLarge`] if the payload grows past `max_frame_size`
/// - [`RpcError::ReadTimeout`] if `idle_timeout` elapses between reads
/// - [`RpcError::Read`] on socket errors
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_size: usize,
    idle_timeout: Option<Duration>,
) -> Result<Vec<u8>, RpcError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let read = match idle_timeout {
            Some(limit) => timeout(limit, reader.read(&mut chunk))
                .await
                .map_err(|_| RpcError::ReadTimeout(limit))?,
            None => reader.read(&mut chunk).await,
        };
        let n = read.map_err(RpcError::Read)?;

        if n == 0 {
            return Err(RpcError::Framing {
                received: frame.len(),
            });
        }

        let received = &chunk[..n];
        let delimiter = received.iter().position(|&b| b == FRAME_DELIMITER);
        let payload = match delimiter {
            Some(pos) => &received[..pos],
            None => received,
        };

        if frame.len() + payload.len() > max_frame_size {
            return Err(RpcError::FrameTooLarge {
                limit: max_frame_size,
            });
        }
        frame.extend_from_slice(payload);

        if let Some(pos) = delimiter {
            let trailing = n - pos - 1;
            if trailing > 0 {
                warn!(trailing, "discarding bytes received after frame delimiter");
            }
            debug!(bytes = frame.len(), "response frame received");
            return Ok(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Test timeout to prevent hanging tests.
    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Reader that hands out at most `step` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Trickle {
        fn new(data: &[u8], step: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                step,
            }
        }
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let start = self.pos;
            let end = (start + self.step)
                .min(self.data.len())
                .min(start + buf.remaining());
            buf.put_slice(&self.data[start..end]);
            self.pos = end;
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_encode_appends_single_delimiter() {
        let frame = encode_frame(&json!({"a": 1})).unwrap();
        assert_eq!(frame, b"{\"a\":1}\0".to_vec());
        assert_eq!(frame.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
    }

    #[test]
    fn test_encode_escapes_nul_inside_strings() {
        let frame = encode_frame(&json!({"name": "a\u{0}b"})).unwrap();
        assert_eq!(frame.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
        let decoded = decode_frame(frame[..frame.len() - 1].to_vec()).unwrap();
        assert_eq!(decoded, json!({"name": "a\u{0}b"}));
    }

    #[test]
    fn test_decode_reproduces_encoded_value() {
        let value = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "doser.schedule_set",
            "params": [{"name": "添加Mg", "payloads": [0.8, 0.2, 0, 0], "when": {"minute": 45}}]
        });
        let frame = encode_frame(&value).unwrap();
        let decoded = decode_frame(frame[..frame.len() - 1].to_vec()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode_frame(vec![b'"', 0xff, b'"']).unwrap_err();
        match err {
            RpcError::Decode { reason, raw } => {
                assert!(reason.contains("UTF-8"), "unexpected reason: {}", reason);
                assert_eq!(raw, vec![b'"', 0xff, b'"']);
            }
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = decode_frame(b"{\"id\":1,".to_vec()).unwrap_err();
        assert!(matches!(err, RpcError::Decode { .. }));
        assert!(err.to_string().contains("{\"id\":1,"));
    }

    #[tokio::test]
    async fn test_read_single_chunk() {
        let mut reader: &[u8] = b"{\"id\":1,\"result\":true}\0";
        let frame = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE, None)
            .await
            .expect("Read failed");
        assert_eq!(frame, b"{\"id\":1,\"result\":true}".to_vec());
    }

    #[tokio::test]
    async fn test_read_one_byte_at_a_time() {
        let wire = b"{\"jsonrpc\":\"2.0\",\"id\":9,\"result\":{\"name\":\"doser-42\"}}\0";
        let mut whole: &[u8] = wire;
        let mut trickle = Trickle::new(wire, 1);

        let expected = read_frame(&mut whole, DEFAULT_MAX_FRAME_SIZE, None)
            .await
            .unwrap();
        let assembled = timeout(
            TEST_TIMEOUT,
            read_frame(&mut trickle, DEFAULT_MAX_FRAME_SIZE, None),
        )
        .await
        .expect("Test timed out")
        .expect("Read failed");

        assert_eq!(assembled, expected);
    }

    #[tokio::test]
    async fn test_read_uneven_chunks() {
        let wire = b"[{\"id\":2,\"result\":1},{\"id\":1,\"result\":2}]\0";
        for step in [2, 3, 7, 13] {
            let mut trickle = Trickle::new(wire, step);
            let frame = read_frame(&mut trickle, DEFAULT_MAX_FRAME_SIZE, None)
                .await
                .unwrap();
            assert_eq!(frame, wire[..wire.len() - 1].to_vec(), "step {}", step);
        }
    }

    #[tokio::test]
    async fn test_read_discards_trailing_bytes() {
        let mut reader: &[u8] = b"{\"id\":1,\"result\":1}\0{\"id\":2";
        let frame = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE, None)
            .await
            .unwrap();
        assert_eq!(frame, b"{\"id\":1,\"result\":1}".to_vec());
    }

    #[tokio::test]
    async fn test_eof_without_delimiter_is_framing_error() {
        let mut reader: &[u8] = b"{\"id\":1,\"result\":1}";
        let err = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RpcError::Framing { received: 20 }),
            "Expected framing error, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_immediate_eof_is_framing_error() {
        let mut reader: &[u8] = b"";
        let err = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Framing { received: 0 }));
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_frame() {
        let mut wire = vec![b' '; 64];
        wire.push(FRAME_DELIMITER);
        let mut trickle = Trickle::new(&wire, 8);
        let err = read_frame(&mut trickle, 32, None).await.unwrap_err();
        assert!(matches!(err, RpcError::FrameTooLarge { limit: 32 }));
    }

    #[tokio::test]
    async fn test_frame_exactly_at_limit_is_accepted() {
        let mut wire = vec![b'1'; 32];
        wire.push(FRAME_DELIMITER);
        let mut reader: &[u8] = &wire;
        let frame = read_frame(&mut reader, 32, None).await.unwrap();
        assert_eq!(frame.len(), 32);
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"{\"id\":1").await.unwrap();

        let limit = Duration::from_millis(50);
        let err = timeout(TEST_TIMEOUT, read_frame(&mut server, 1024, Some(limit)))
            .await
            .expect("Test timed out")
            .unwrap_err();
        assert!(matches!(err, RpcError::ReadTimeout(d) if d == limit));
        drop(client);
    }

    #[tokio::test]
    async fn test_write_frame_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(16);
        let frame = encode_frame(&json!({"method": "sys.hello", "params": []})).unwrap();

        let writer = tokio::spawn(async move {
            write_frame(&mut client, &frame).await.expect("Write failed");
            client
        });

        let received = timeout(
            TEST_TIMEOUT,
            read_frame(&mut server, DEFAULT_MAX_FRAME_SIZE, None),
        )
        .await
        .expect("Test timed out")
        .expect("Read failed");
        writer.await.unwrap();

        assert_eq!(
            decode_frame(received).unwrap(),
            json!({"method": "sys.hello", "params": []})
        );
    }
}
