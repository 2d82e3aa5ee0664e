//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 12-byte structure serialized as raw binary
//! (Big Endian). It tells a reader exactly how many body bytes follow, so a
//! stream can be cut into frames without looking at the body.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Fixed 12-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so the struct has alignment 1 and no
/// padding; every 12-byte pattern is a valid value, which lets us cast
/// untrusted network bytes directly.
///
/// Layout:
///
/// | Offset | Size | Field                 |
/// |--------|------|-----------------------|
/// | 0      | 4    | magic (`"RLAY"`)      |
/// | 4      | 1    | version               |
/// | 5      | 1    | flags (reserved)      |
/// | 6      | 2    | event name length     |
/// | 8      | 4    | payload length        |
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],
    version: u8,
    flags: u8,
    name_len: [u8; 2],
    payload_size: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 12;

    /// Magic number: "RLAY" in ASCII (0x524C4159)
    pub const MAGIC: u32 = 0x524C_4159;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Create a header describing a body of the given sizes.
    #[must_use]
    pub fn new(name_len: u16, payload_size: u32) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            flags: 0,
            name_len: name_len.to_be_bytes(),
            payload_size: payload_size.to_be_bytes(),
        }
    }

    /// Parse header from network bytes (zero-copy)
    ///
    /// Only the first [`Self::SIZE`] bytes are inspected; trailing bytes are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than the header
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        if header.magic() != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        Ok(header)
    }

    /// Serialize header to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(self.as_bytes());
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Reserved flag byte. Always zero in version 1.
    #[must_use]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Length of the event name in bytes.
    #[must_use]
    pub fn name_len(&self) -> u16 {
        u16::from_be_bytes(self.name_len)
    }

    /// Length of the payload in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Total bytes following the header (name + payload).
    #[must_use]
    pub fn body_len(&self) -> usize {
        usize::from(self.name_len()) + self.payload_size() as usize
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("flags", &self.flags())
            .field("name_len", &self.name_len())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}
