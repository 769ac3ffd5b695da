//! Framing of the metadata container
//!
//! ```text
//! [ContainerHeader: 16 bytes]
//! [ChunkFrame: 9 bytes][stored bytes]   repeated, one per chunk
//! [ChunkFrame: raw_len = 0]             end of payload
//! [Trailer: 16 bytes]
//! ```
//!
//! All integers are little-endian. The trailer repeats the total payload
//! length and a CRC32 of the uncompressed payload, so truncation or bit rot
//! anywhere in the file is detected on load.

use super::compression::CompressionMethod;
use crate::error::{FragmentError, Result};
use std::io::Read;

pub const MAGIC: [u8; 8] = *b"FRBK\x00\x01\x00\x00";
pub const TRAILER_MAGIC: [u8; 4] = *b"KBRF";
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

pub const HEADER_SIZE: usize = 16;
pub const FRAME_SIZE: usize = 9;
pub const TRAILER_SIZE: usize = 16;

/// Upper bound on a single chunk, compressed or not
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Container header, first bytes of every metadata file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Magic number: "FRBK\x00\x01\x00\x00"
    pub magic: [u8; 8],

    /// Format version (major)
    pub version_major: u16,

    /// Format version (minor)
    pub version_minor: u16,

    /// Method the writer was configured with; each chunk still carries its own
    pub method: CompressionMethod,

    /// Reserved for future flags
    pub reserved: [u8; 3],
}

impl ContainerHeader {
    pub fn new(method: CompressionMethod) -> Self {
        ContainerHeader {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            method,
            reserved: [0; 3],
        }
    }

    /// Validate the header magic and version
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(FragmentError::InvalidMagic);
        }

        // Readers accept any minor revision of the major version they know
        if self.version_major != VERSION_MAJOR {
            return Err(FragmentError::UnsupportedVersion {
                major: self.version_major,
                minor: self.version_minor,
            });
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..10].copy_from_slice(&self.version_major.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.version_minor.to_le_bytes());
        bytes[12] = self.method as u8;
        bytes[13..16].copy_from_slice(&self.reserved);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        if magic != MAGIC {
            return Err(FragmentError::InvalidMagic);
        }

        let method = CompressionMethod::from_u8(bytes[12]).ok_or_else(|| {
            FragmentError::CorruptData(format!("unknown compression method {}", bytes[12]))
        })?;

        let mut reserved = [0u8; 3];
        reserved.copy_from_slice(&bytes[13..16]);

        Ok(ContainerHeader {
            magic,
            version_major: u16::from_le_bytes([bytes[8], bytes[9]]),
            version_minor: u16::from_le_bytes([bytes[10], bytes[11]]),
            method,
            reserved,
        })
    }

    pub fn read_from<R: Read>(source: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        read_exact_or_corrupt(source, &mut bytes, "container header")?;
        let header = Self::from_bytes(&bytes)?;
        header.validate()?;
        Ok(header)
    }
}

/// Frame preceding each stored chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkFrame {
    pub method: CompressionMethod,
    /// Uncompressed length, zero marks the end of the payload
    pub raw_len: u32,
    /// Length of the bytes that follow the frame
    pub stored_len: u32,
}

impl ChunkFrame {
    pub fn end() -> Self {
        ChunkFrame {
            method: CompressionMethod::None,
            raw_len: 0,
            stored_len: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.raw_len == 0
    }

    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0] = self.method as u8;
        bytes[1..5].copy_from_slice(&self.raw_len.to_le_bytes());
        bytes[5..9].copy_from_slice(&self.stored_len.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; FRAME_SIZE]) -> Result<Self> {
        let method = CompressionMethod::from_u8(bytes[0]).ok_or_else(|| {
            FragmentError::CorruptData(format!("unknown chunk compression method {}", bytes[0]))
        })?;
        let raw_len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let stored_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

        if raw_len as usize > MAX_CHUNK_SIZE || stored_len as usize > MAX_CHUNK_SIZE {
            return Err(FragmentError::CorruptData(format!(
                "chunk frame exceeds {} bytes (raw {}, stored {})",
                MAX_CHUNK_SIZE, raw_len, stored_len
            )));
        }

        let frame = ChunkFrame {
            method,
            raw_len,
            stored_len,
        };

        if frame.is_end() && (stored_len != 0 || method != CompressionMethod::None) {
            return Err(FragmentError::CorruptData(
                "malformed end-of-payload frame".to_string(),
            ));
        }

        if method == CompressionMethod::None && stored_len != raw_len {
            return Err(FragmentError::CorruptData(format!(
                "uncompressed chunk declares {} raw bytes but stores {}",
                raw_len, stored_len
            )));
        }

        Ok(frame)
    }
}

/// Trailer closing the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Total uncompressed payload bytes
    pub payload_len: u64,
    /// CRC32 of the uncompressed payload
    pub checksum: u32,
}

impl Trailer {
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut bytes = [0u8; TRAILER_SIZE];
        bytes[0..8].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[12..16].copy_from_slice(&TRAILER_MAGIC);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; TRAILER_SIZE]) -> Result<Self> {
        if bytes[12..16] != TRAILER_MAGIC {
            return Err(FragmentError::CorruptData(
                "missing trailer magic".to_string(),
            ));
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[0..8]);

        Ok(Trailer {
            payload_len: u64::from_le_bytes(len),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }
}

/// `read_exact` that reports a short read as corruption instead of an I/O failure
pub(crate) fn read_exact_or_corrupt<R: Read + ?Sized>(
    source: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<()> {
    source.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            FragmentError::CorruptData(format!("truncated {}", what))
        }
        _ => FragmentError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = ContainerHeader::new(CompressionMethod::Zstd);
        let bytes = header.to_bytes();
        let parsed = ContainerHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_header_bad_magic() {
        let mut bytes = ContainerHeader::new(CompressionMethod::None).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            ContainerHeader::from_bytes(&bytes),
            Err(FragmentError::InvalidMagic)
        ));
    }

    #[test]
    fn test_header_future_major_version() {
        let mut header = ContainerHeader::new(CompressionMethod::Lz4);
        header.version_major = VERSION_MAJOR + 1;
        assert!(matches!(
            header.validate(),
            Err(FragmentError::UnsupportedVersion { .. })
        ));

        header.version_major = VERSION_MAJOR;
        header.version_minor = VERSION_MINOR + 3;
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = ChunkFrame {
            method: CompressionMethod::Lz4,
            raw_len: 10_000,
            stored_len: 812,
        };
        assert_eq!(ChunkFrame::from_bytes(&frame.to_bytes()).unwrap(), frame);
        assert!(ChunkFrame::from_bytes(&ChunkFrame::end().to_bytes()).unwrap().is_end());
    }

    #[test]
    fn test_frame_rejects_oversized() {
        let frame = ChunkFrame {
            method: CompressionMethod::Lz4,
            raw_len: u32::MAX,
            stored_len: 10,
        };
        assert!(ChunkFrame::from_bytes(&frame.to_bytes()).is_err());
    }

    #[test]
    fn test_frame_rejects_inconsistent_plain_chunk() {
        let frame = ChunkFrame {
            method: CompressionMethod::None,
            raw_len: 100,
            stored_len: 99,
        };
        assert!(ChunkFrame::from_bytes(&frame.to_bytes()).is_err());
    }

    #[test]
    fn test_trailer_round_trip() {
        let trailer = Trailer {
            payload_len: 123_456,
            checksum: 0xDEAD_BEEF,
        };
        assert_eq!(Trailer::from_bytes(&trailer.to_bytes()).unwrap(), trailer);

        let mut bytes = trailer.to_bytes();
        bytes[15] ^= 0xFF;
        assert!(Trailer::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_short_read_is_corruption() {
        let mut source: &[u8] = &[1, 2, 3];
        let mut buf = [0u8; 8];
        let err = read_exact_or_corrupt(&mut source, &mut buf, "field").unwrap_err();
        assert!(err.is_corruption());
    }
}
