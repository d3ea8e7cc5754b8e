/// Frame codec: length-prefixed units over a byte stream
///
/// Format:
/// [4 bytes] payload length N (BE u32)
/// [N bytes] payload (the envelope's outer JSON)
///
/// The codec enforces no maximum length. `read_frame_bounded` is there for
/// callers that want to cap what a peer may declare.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length prefix size
pub const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The stream closed after part of a frame had been read
    #[error("connection lost: got {received} of {expected} bytes")]
    ConnectionLost { expected: usize, received: usize },
    #[error("frame too large: max {max} got {got}")]
    TooLarge { max: usize, got: usize },
}

/// Prefix a payload with its length.
pub fn frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let length = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        max: u32::MAX as usize,
        got: payload.len(),
    })?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Write one frame and flush.
///
/// `write_all` keeps writing until the whole unit is accepted by the
/// transport, whatever the size of the individual writes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = frame(payload)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame.
///
/// - `Ok(Some(payload))`: a complete frame
/// - `Ok(None)`: the peer closed the stream cleanly, before any byte of a new frame
/// - `Err(FrameError::ConnectionLost { .. })`: the stream closed inside a frame
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_frame_inner(reader, None).await
}

/// Like `read_frame`, but rejects frames declaring more than `max_len` bytes
/// before reading their payload.
pub async fn read_frame_bounded<R>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_frame_inner(reader, Some(max_len)).await
}

async fn read_frame_inner<R>(
    reader: &mut R,
    max_len: Option<usize>,
) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0usize;
    while filled < FRAME_HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::ConnectionLost {
                expected: FRAME_HEADER_LEN,
                received: filled,
            });
        }
        filled += n;
    }

    let length = u32::from_be_bytes(header) as usize;
    if let Some(max) = max_len {
        if length > max {
            return Err(FrameError::TooLarge { max, got: length });
        }
    }

    // Grow with the data actually received rather than trusting the prefix.
    let mut payload = Vec::new();
    let mut limited = (&mut *reader).take(length as u64);
    let received = limited.read_to_end(&mut payload).await?;
    if received < length {
        return Err(FrameError::ConnectionLost {
            expected: length,
            received,
        });
    }

    Ok(Some(payload))
}
