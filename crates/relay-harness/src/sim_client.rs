//! Relay client over simulated TCP.

use std::io;

use relay_client::{client_event, server_event};
use relay_proto::{Frame, io as frame_io};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use turmoil::net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

/// A relay client connected to a [`SimServer`](crate::SimServer).
pub struct SimClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl SimClient {
    /// Connect to a simulated relay server.
    pub async fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self { reader, writer })
    }

    /// Emit `value` for relaying to every client.
    pub async fn emit<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let frame = client_event(value).map_err(io::Error::other)?;
        self.send_frame(&frame).await
    }

    /// Send an arbitrary frame.
    pub async fn send_frame(&mut self, frame: &Frame) -> io::Result<()> {
        frame_io::write_frame(&mut self.writer, frame).await.map_err(io::Error::other)
    }

    /// Write raw bytes, bypassing framing.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await
    }

    /// Next frame from the server, or `None` once the server closed the
    /// session.
    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        frame_io::read_frame(&mut self.reader).await.map_err(io::Error::other)
    }

    /// Next relayed value, or `None` once the server closed the session.
    pub async fn next_event<T: DeserializeOwned>(&mut self) -> io::Result<Option<T>> {
        match self.next_frame().await? {
            Some(frame) => server_event(&frame).map(Some).map_err(io::Error::other),
            None => Ok(None),
        }
    }

    /// Disconnect and wait until the server has dropped the session.
    ///
    /// Frames still in flight are discarded.
    pub async fn close(mut self) -> io::Result<()> {
        self.writer.shutdown().await?;
        while self.next_frame().await?.is_some() {}
        Ok(())
    }
}
