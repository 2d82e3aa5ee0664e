//! Opaque event payloads.
//!
//! The relay forwards payload bytes verbatim and never decodes them. Clients
//! that want structured values encode them as CBOR, which is self-describing
//! and needs no schema shared with the server.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Payload bytes carried by a frame.
///
/// An empty payload stands for an absent value. It is relayed like any other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    /// Payload carrying no value.
    #[must_use]
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Encode a value as CBOR.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let mut writer = BytesMut::new().writer();
        ciborium::ser::into_writer(value, &mut writer)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Self(writer.into_inner().freeze()))
    }

    /// Decode the payload as a CBOR value.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Decode` if the bytes are not CBOR for `T`, including
    ///   when the payload is empty
    pub fn to_value<T: DeserializeOwned>(&self) -> Result<T> {
        ciborium::de::from_reader(self.0.as_ref()).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Whether the payload carries no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Take the raw payload bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<Payload> for Bytes {
    fn from(payload: Payload) -> Self {
        payload.0
    }
}
