//! Typed relay client over QUIC.

use bytes::Bytes;
use relay_proto::{EVENT_FROM_CLIENT, EVENT_FROM_SERVER, Frame};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::ClientError,
    event::{client_event, server_event},
    transport::{self, ConnectedClient, TransportConfig, TransportError},
};

/// A connected relay client.
///
/// Everything passed to [`emit`](Self::emit) by any client, this one
/// included, comes back out of [`next_event`](Self::next_event).
pub struct RelayClient {
    conn: ConnectedClient,
}

impl RelayClient {
    /// Connect with development transport settings.
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        Self::connect_with_config(server_addr, TransportConfig::development()).await
    }

    /// Connect with explicit transport settings.
    pub async fn connect_with_config(
        server_addr: &str,
        config: TransportConfig,
    ) -> Result<Self, ClientError> {
        let conn = transport::connect_with_config(server_addr, config).await?;
        Ok(Self { conn })
    }

    /// Send `value` to be relayed to every connected client.
    pub async fn emit<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ClientError> {
        self.send(client_event(value)?).await
    }

    /// Send an already-encoded payload.
    ///
    /// The server relays the bytes without inspecting them.
    pub async fn emit_raw(&self, payload: impl Into<Bytes>) -> Result<(), ClientError> {
        self.send(Frame::new(EVENT_FROM_CLIENT, payload)?).await
    }

    async fn send(&self, frame: Frame) -> Result<(), ClientError> {
        self.conn.to_server.send(frame).await.map_err(|_| TransportError::Closed)?;
        Ok(())
    }

    /// Wait for the next relayed value.
    ///
    /// Returns `Ok(None)` once the connection is closed.
    pub async fn next_event<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ClientError> {
        match self.conn.from_server.recv().await {
            Some(frame) => server_event(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for the next relayed payload, undecoded.
    pub async fn next_raw(&mut self) -> Result<Option<Bytes>, ClientError> {
        match self.conn.from_server.recv().await {
            Some(frame) if frame.name() == EVENT_FROM_SERVER => {
                Ok(Some(frame.into_parts().1))
            },
            Some(frame) => Err(ClientError::UnexpectedEvent(frame.name().to_string())),
            None => Ok(None),
        }
    }

    /// Disconnect from the server.
    pub fn close(&self) {
        self.conn.stop();
    }
}
