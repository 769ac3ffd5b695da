//! Persistence codec for book-keeping catalogs
//!
//! Logical payload (little-endian):
//!
//! ```text
//! [range_byte_length: u64][range_bytes]
//! [attribute_count: u64]
//! for each attribute:
//!     [entry_count: u64][offset_0: u64] .. [offset_{entry_count-1}: u64]
//! ```
//!
//! The payload is streamed through [`io::ChunkWriter`] into the container
//! described in [`header`]. Decoding builds a complete catalog before handing
//! it back, so a failed load never exposes partial state.

pub mod compression;
pub mod header;
pub mod io;

use crate::book_keeping::BookKeeping;
use crate::config::CatalogConfig;
use crate::error::{FragmentError, Result};
use crate::range::SpatialRange;
use self::header::{ContainerHeader, HEADER_SIZE};
use self::io::{from_io_error, from_write_error, ChunkReader, ChunkWriter};
use std::io::{Read, Write};
use tracing::debug;

// Pre-allocation caps; declared counts are untrusted until the bytes arrive
const MAX_PREALLOCATED_ATTRIBUTES: usize = 4096;
const MAX_PREALLOCATED_OFFSETS: usize = 64 * 1024;

/// Byte counts reported by [`encode_catalog_with_stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeStats {
    /// Uncompressed payload bytes
    pub payload_len: u64,
    /// Bytes written to the sink, header and trailer included
    pub stored_len: u64,
    pub chunks: u64,
}

/// Serialize a catalog into `sink`, returning the sink
pub fn encode_catalog<W: Write>(
    catalog: &BookKeeping,
    sink: W,
    config: &CatalogConfig,
) -> Result<W> {
    encode_catalog_with_stats(catalog, sink, config).map(|(sink, _)| sink)
}

/// Serialize a catalog into `sink`, returning the sink and byte counts
pub fn encode_catalog_with_stats<W: Write>(
    catalog: &BookKeeping,
    mut sink: W,
    config: &CatalogConfig,
) -> Result<(W, EncodeStats)> {
    config.validate()?;
    let range = catalog.range().ok_or(FragmentError::InvalidState {
        expected: "initialized",
        actual: catalog.state().name(),
    })?;

    sink.write_all(&ContainerHeader::new(config.compression).to_bytes())?;

    let mut writer = ChunkWriter::new(sink, config.chunk_size, config.compression_config());
    write_payload(&mut writer, range, catalog).map_err(from_write_error)?;

    let (sink, chunk_stats) = writer.finish_with_stats()?;
    let stats = EncodeStats {
        payload_len: chunk_stats.payload_len,
        stored_len: chunk_stats.stored_len + HEADER_SIZE as u64,
        chunks: chunk_stats.chunks,
    };

    debug!(
        "Encoded catalog: {} attributes, {} range bytes, {} payload bytes in {} chunks",
        catalog.attribute_count(),
        range.len(),
        stats.payload_len,
        stats.chunks
    );

    Ok((sink, stats))
}

/// Deserialize a catalog from `source`
///
/// The returned catalog is finalized.
pub fn decode_catalog<R: Read>(mut source: R) -> Result<BookKeeping> {
    let header = ContainerHeader::read_from(&mut source)?;
    let mut reader = ChunkReader::new(source);

    let range_len = read_u64(&mut reader)?;
    let range = read_bytes(&mut reader, range_len, "range")?;
    if range.is_empty() {
        return Err(FragmentError::CorruptData("empty range".to_string()));
    }

    let attribute_count = read_u64(&mut reader)?;
    if attribute_count == 0 {
        return Err(FragmentError::CorruptData(
            "catalog declares zero attributes".to_string(),
        ));
    }
    let attribute_count = usize::try_from(attribute_count).map_err(|_| {
        FragmentError::CorruptData(format!("attribute count {} too large", attribute_count))
    })?;

    let mut tile_offsets = Vec::with_capacity(attribute_count.min(MAX_PREALLOCATED_ATTRIBUTES));
    for attribute in 0..attribute_count {
        let entry_count = read_u64(&mut reader)?;
        let capacity = usize::try_from(entry_count)
            .unwrap_or(usize::MAX)
            .min(MAX_PREALLOCATED_OFFSETS);

        let mut offsets = Vec::with_capacity(capacity);
        for _ in 0..entry_count {
            offsets.push(read_u64(&mut reader).map_err(|e| match e {
                FragmentError::CorruptData(msg) => FragmentError::CorruptData(format!(
                    "attribute {}: {}",
                    attribute, msg
                )),
                other => other,
            })?);
        }
        tile_offsets.push(offsets);
    }

    let payload_len = reader.payload_len();
    reader.finish()?;

    debug!(
        "Decoded catalog: {} attributes, {} range bytes, {} payload bytes ({:?} container)",
        attribute_count, range_len, payload_len, header.method
    );

    Ok(BookKeeping::from_parts(
        SpatialRange::from_bytes(range),
        tile_offsets,
    ))
}

fn write_payload<W: Write>(
    writer: &mut ChunkWriter<W>,
    range: &SpatialRange,
    catalog: &BookKeeping,
) -> std::io::Result<()> {
    writer.write_all(&(range.len() as u64).to_le_bytes())?;
    writer.write_all(range.as_bytes())?;

    writer.write_all(&(catalog.attribute_count() as u64).to_le_bytes())?;
    for offsets in catalog.all_tile_offsets() {
        writer.write_all(&(offsets.len() as u64).to_le_bytes())?;
        for offset in offsets {
            writer.write_all(&offset.to_le_bytes())?;
        }
    }
    Ok(())
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(from_io_error)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_bytes<R: Read>(reader: &mut R, len: u64, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(len)
        .read_to_end(&mut buf)
        .map_err(from_io_error)?;

    if buf.len() as u64 != len {
        return Err(FragmentError::CorruptData(format!(
            "{} declares {} bytes, only {} available",
            what,
            len,
            buf.len()
        )));
    }
    Ok(buf)
}
