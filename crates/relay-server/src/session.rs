//! Per-session I/O tasks.
//!
//! Bridges byte streams to the [`RelayLoop`](crate::RelayLoop) inbox. Generic
//! over tokio streams so QUIC, simulated TCP and in-memory pipes share the
//! same code path.

use bytes::Bytes;
use relay_proto::io;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

use crate::{error::ServerError, event_loop::Inbound};

/// Spawn the session's writer task and announce the session to the loop.
///
/// The writer drains a bounded queue of encoded frames into `writer`. It
/// stops, shutting the stream down, once the loop drops the queue on
/// disconnect or a write fails.
pub async fn attach<W>(
    session_id: u64,
    writer: W,
    inbox: &mpsc::Sender<Inbound>,
    outbound_capacity: usize,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(outbound_capacity.max(1));
    tokio::spawn(write_loop(session_id, writer, rx));

    inbox
        .send(Inbound::Connected { session_id, outbound: tx })
        .await
        .map_err(|_| ServerError::Internal("relay loop stopped".to_string()))
}

async fn write_loop<W>(session_id: u64, mut writer: W, mut queue: mpsc::Receiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(wire) = queue.recv().await {
        let written = async {
            writer.write_all(&wire).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            tracing::debug!(session_id, error = %e, "outbound write failed");
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(session_id, error = %e, "outbound shutdown failed");
    }
}

/// Forward every frame read from `reader` to the loop.
///
/// Returns `Ok(())` when the stream ends cleanly.
pub async fn pump_frames<R>(
    session_id: u64,
    mut reader: R,
    inbox: &mpsc::Sender<Inbound>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = io::read_frame(&mut reader).await? {
        inbox
            .send(Inbound::Frame { session_id, frame })
            .await
            .map_err(|_| ServerError::Internal("relay loop stopped".to_string()))?;
    }

    Ok(())
}

/// Tell the loop the session is gone.
pub async fn detach(session_id: u64, reason: impl Into<String>, inbox: &mpsc::Sender<Inbound>) {
    let closed = Inbound::Closed { session_id, reason: reason.into() };
    if inbox.send(closed).await.is_err() {
        tracing::debug!(session_id, "relay loop already stopped");
    }
}

/// Serve a session carried on a single bidirectional byte stream.
///
/// Attaches, pumps frames until the stream ends or fails, then detaches.
/// A malformed frame ends the session.
pub async fn serve_stream<R, W>(
    session_id: u64,
    reader: R,
    writer: W,
    inbox: mpsc::Sender<Inbound>,
    outbound_capacity: usize,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    attach(session_id, writer, &inbox, outbound_capacity).await?;

    let result = pump_frames(session_id, reader, &inbox).await;
    let reason = match &result {
        Ok(()) => "peer closed stream".to_string(),
        Err(e) => e.to_string(),
    };
    detach(session_id, reason, &inbox).await;

    result
}
