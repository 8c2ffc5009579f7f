//! Length-prefixed byte-stream transport (C4) over a child's stdio pipes.
//!
//! Holds no state beyond the `AsyncRead`/`AsyncWrite` handles passed in by
//! the caller; `fip-master` and `fip-slave` own the actual pipe handles.

mod error;

pub use error::TransportError;

use fip_proto::FIP_MAX_PAYLOAD;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Writes exactly `frame.len()` bytes (a complete `encode_frame` output,
/// length prefix included) and flushes.
pub async fn write_message<W>(stream: &mut W, frame: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    stream
        .write_all(frame)
        .await
        .map_err(TransportError::WriteFailed)?;
    stream.flush().await.map_err(TransportError::WriteFailed)
}

/// Reads one frame: a 4-byte little-endian length `L` with `1 <= L <=
/// FIP_MAX_PAYLOAD`, then exactly `L` payload bytes.
///
/// Returns `Ok(None)` only when the stream is closed cleanly before any
/// byte of a new frame arrives (the child exited). Any other short read —
/// a partial length prefix or a payload cut off mid-frame — is
/// [`TransportError::ShortRead`], per `spec.md` §4.4: "Short reads after
/// the length header are a protocol error (not a recoverable condition)."
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; 4];
    let first = stream
        .read(&mut len_buf[..1])
        .await
        .map_err(TransportError::ReadFailed)?;
    if first == 0 {
        return Ok(None);
    }
    stream
        .read_exact(&mut len_buf[1..])
        .await
        .map_err(|_| TransportError::ShortRead)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 || len > FIP_MAX_PAYLOAD {
        return Err(TransportError::InvalidLength(len));
    }
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|_| TransportError::ShortRead)?;
    Ok(Some(payload))
}

/// Continuously forwards bytes from `stream` to `sink` until the stream
/// closes, tolerating partial UTF-8 and applying no framing — this is the
/// `drain_stderr` operation from `spec.md` §4.4, realized as a standing
/// forwarder task rather than a manually-polled non-blocking read (see
/// `SPEC_FULL.md` §4.11).
pub async fn forward_stderr<R, W>(mut stream: R, mut sink: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if sink.write_all(&buf[..n]).await.is_err() {
                    break;
                }
                let _ = sink.flush().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fip_proto::{encode_frame, FIP_MSG_SIZE};
    use fip_proto::{KillReason, Message};

    #[tokio::test]
    async fn write_then_read_round_trips_a_frame() {
        let msg = Message::Kill {
            reason: KillReason::Finish,
        };
        let mut buf = [0u8; FIP_MSG_SIZE];
        let total = encode_frame(&msg, &mut buf).unwrap();

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, &buf[..total]).await.unwrap();
        drop(client);

        let payload = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(payload, &buf[4..total]);
    }

    #[tokio::test]
    async fn clean_close_before_any_byte_is_none() {
        let (client, mut server) = tokio::io::duplex(4096);
        drop(client);
        let result = read_frame(&mut server).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn partial_frame_is_short_read_error() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        // Declare a 10-byte payload but only send 3 bytes of it, then close.
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        drop(client);

        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(TransportError::ShortRead)));
    }

    #[tokio::test]
    async fn invalid_length_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(&0u32.to_le_bytes()).await.unwrap();
        drop(client);

        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(TransportError::InvalidLength(0))));
    }

    #[tokio::test]
    async fn forward_stderr_copies_bytes_verbatim() {
        let (mut child_stderr_w, child_stderr_r) = tokio::io::duplex(64);
        let (sink_w, mut sink_r) = tokio::io::duplex(64);

        let handle = tokio::spawn(forward_stderr(child_stderr_r, sink_w));
        child_stderr_w.write_all(b"hello from child\n").await.unwrap();
        drop(child_stderr_w);
        handle.await.unwrap();

        let mut received = vec![0u8; 64];
        let n = sink_r.read(&mut received).await.unwrap();
        assert_eq!(&received[..n], b"hello from child\n");
    }
}
