//! Async frame I/O over byte streams.
//!
//! Works with any tokio stream: QUIC streams in production, `turmoil` TCP in
//! simulation and `tokio::io::duplex` in tests.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    Frame, FrameHeader,
    errors::{ProtocolError, Result},
};

/// Upper bound on the body buffer reserved before any body bytes arrive.
const INITIAL_BODY_CAPACITY: usize = 64 * 1024;

/// Read one frame from a stream.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
///
/// # Errors
///
/// - `ProtocolError::FrameTooShort` if the stream ends inside a header
/// - `ProtocolError::Io` if the stream fails or ends inside a body
/// - Header and body validation errors from [`Frame::from_parts`]
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];
    let mut filled = 0;

    while filled < FrameHeader::SIZE {
        let n = reader.read(&mut header_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::FrameTooShort { expected: FrameHeader::SIZE, actual: filled });
        }
        filled += n;
    }

    let header = *FrameHeader::from_bytes(&header_buf)?;
    let body_len = header.body_len();

    // The buffer grows with the bytes that actually arrive, never with the
    // length the header claims.
    let mut body = Vec::with_capacity(body_len.min(INITIAL_BODY_CAPACITY));
    (&mut *reader).take(body_len as u64).read_to_end(&mut body).await?;
    if body.len() < body_len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }

    Frame::from_parts(header, Bytes::from(body)).map(Some)
}

/// Write one frame to a stream and flush it.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.to_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
