//! Frame type combining header, event name and payload.
//!
//! Layout on the wire:
//! `[FrameHeader: 12 bytes] + [event name: name_len bytes, UTF-8] + [payload:
//! payload_size bytes]`

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// One named event on the wire.
///
/// Holds the payload as raw bytes. The server relays frames without ever
/// deserializing the payload.
///
/// # Invariants
///
/// - `header.name_len()` equals `name.len()` and `header.payload_size()`
///   equals `payload.len()`. Enforced by [`Frame::new`] and verified by
///   [`Frame::decode`]; fields are private so the header cannot drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    name: String,
    payload: Bytes,
}

impl Frame {
    /// Create a frame, deriving the header from the name and payload.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::NameTooLong` if the name exceeds `u16::MAX` bytes
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds `u32::MAX`
    ///   bytes
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Result<Self> {
        let name = name.into();
        let payload = payload.into();

        let name_len = u16::try_from(name.len())
            .map_err(|_| ProtocolError::NameTooLong { len: name.len(), max: u16::MAX as usize })?;
        let payload_size = u32::try_from(payload.len()).map_err(|_| {
            ProtocolError::PayloadTooLarge { size: payload.len(), max: u32::MAX as usize }
        })?;

        Ok(Self { header: FrameHeader::new(name_len, payload_size), name, payload })
    }

    /// Same payload under a different event name.
    ///
    /// The payload bytes are shared, not copied.
    pub fn renamed(&self, name: impl Into<String>) -> Result<Self> {
        Self::new(name, self.payload.clone())
    }

    /// Frame header.
    #[must_use]
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Split into event name and payload.
    #[must_use]
    pub fn into_parts(self) -> (String, Bytes) {
        (self.name, self.payload)
    }

    /// Number of bytes [`Frame::encode`] writes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.header.body_len()
    }

    /// Encode frame into buffer
    ///
    /// Writes: `[header] + [name] + [payload]`
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert_eq!(self.name.len(), usize::from(self.header.name_len()));
        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(self.name.as_bytes());
        dst.put_slice(&self.payload);
    }

    /// Encode into a freshly allocated buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode frame from wire format
    ///
    /// Trailing bytes after the frame are ignored.
    ///
    /// # Errors
    ///
    /// - Header errors from [`FrameHeader::from_bytes`]
    /// - `ProtocolError::FrameTruncated` if fewer body bytes are present than
    ///   the header claims
    /// - `ProtocolError::InvalidEventName` if the name is not UTF-8
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = *FrameHeader::from_bytes(bytes)?;
        let body_len = header.body_len();

        let body = bytes
            .get(FrameHeader::SIZE..FrameHeader::SIZE + body_len)
            .ok_or(ProtocolError::FrameTruncated {
                expected: body_len,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            })?;

        Self::from_parts(header, Bytes::copy_from_slice(body))
    }

    /// Assemble a frame from an already parsed header and its body bytes.
    ///
    /// Used by stream readers that read the header and body separately.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTruncated` if `body` is shorter than the header
    ///   claims
    /// - `ProtocolError::InvalidEventName` if the name is not UTF-8
    pub fn from_parts(header: FrameHeader, body: Bytes) -> Result<Self> {
        let body_len = header.body_len();
        if body.len() < body_len {
            return Err(ProtocolError::FrameTruncated { expected: body_len, actual: body.len() });
        }

        let name_len = usize::from(header.name_len());
        let name = std::str::from_utf8(&body[..name_len])
            .map_err(|_| ProtocolError::InvalidEventName)?
            .to_owned();
        let payload = body.slice(name_len..body_len);

        Ok(Self { header, name, payload })
    }
}
