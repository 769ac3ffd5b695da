//! Per-chunk compression for metadata containers
//!
//! Each chunk of the serialized catalog is compressed on its own, so a reader
//! never has to hold more than one chunk in memory.
//!
//! **Design**:
//! - Compression threshold: only compress chunks >= 512 bytes (avoid overhead)
//! - Compression detection: method byte in every chunk frame
//! - Fallback: store uncompressed if compression ratio >= 0.9

use crate::error::{FragmentError, Result};
use serde::{Deserialize, Serialize};
use std::io;

/// Compression method for metadata chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionMethod {
    /// No compression
    None = 0,
    /// LZ4 compression (fast, moderate ratio)
    Lz4 = 1,
    /// Zstd compression (slower, better ratio)
    Zstd = 2,
}

impl CompressionMethod {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::None),
            1 => Some(CompressionMethod::Lz4),
            2 => Some(CompressionMethod::Zstd),
            _ => None,
        }
    }
}

/// Compression configuration
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Compression method to use
    pub method: CompressionMethod,

    /// Minimum size to compress (bytes)
    /// Chunks smaller than this will not be compressed
    pub threshold: usize,

    /// Minimum compression ratio (compressed_size / original_size)
    /// If ratio is worse than this, store uncompressed
    pub min_ratio: f32,

    /// Zstd compression level
    pub zstd_level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            method: CompressionMethod::Lz4,
            threshold: 512,
            min_ratio: 0.9,
            zstd_level: 3,
        }
    }
}

impl CompressionConfig {
    /// Create config with no compression
    pub fn none() -> Self {
        CompressionConfig {
            method: CompressionMethod::None,
            threshold: usize::MAX,
            min_ratio: 0.0,
            ..Default::default()
        }
    }

    /// Create config with LZ4 compression
    pub fn lz4() -> Self {
        CompressionConfig {
            method: CompressionMethod::Lz4,
            ..Default::default()
        }
    }

    /// Create config with Zstd compression
    pub fn zstd() -> Self {
        CompressionConfig {
            method: CompressionMethod::Zstd,
            threshold: 1024, // Zstd overhead is higher
            min_ratio: 0.85,
            ..Default::default()
        }
    }
}

/// Compress one chunk
pub fn compress(data: &[u8], method: CompressionMethod, zstd_level: i32) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => Ok(lz4_flex::compress(data)),
        CompressionMethod::Zstd => zstd::bulk::compress(data, zstd_level).map_err(|e| {
            FragmentError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("Zstd compression failed: {}", e),
            ))
        }),
    }
}

/// Decompress one chunk whose uncompressed length is known from its frame
pub fn decompress(data: &[u8], method: CompressionMethod, raw_len: usize) -> Result<Vec<u8>> {
    let decompressed = match method {
        CompressionMethod::None => data.to_vec(),
        CompressionMethod::Lz4 => lz4_flex::decompress(data, raw_len).map_err(|e| {
            FragmentError::CorruptData(format!("LZ4 decompression failed: {}", e))
        })?,
        CompressionMethod::Zstd => zstd::bulk::decompress(data, raw_len).map_err(|e| {
            FragmentError::CorruptData(format!("Zstd decompression failed: {}", e))
        })?,
    };

    if decompressed.len() != raw_len {
        return Err(FragmentError::CorruptData(format!(
            "chunk decompressed to {} bytes, frame declares {}",
            decompressed.len(),
            raw_len
        )));
    }

    Ok(decompressed)
}

/// Compress data if beneficial, returns (data, method_used)
pub fn compress_if_beneficial(
    data: &[u8],
    config: &CompressionConfig,
) -> Result<(Vec<u8>, CompressionMethod)> {
    // Skip compression if below threshold
    if data.len() < config.threshold {
        return Ok((data.to_vec(), CompressionMethod::None));
    }

    // Skip if method is None
    if matches!(config.method, CompressionMethod::None) {
        return Ok((data.to_vec(), CompressionMethod::None));
    }

    let compressed = compress(data, config.method, config.zstd_level)?;

    let ratio = compressed.len() as f32 / data.len() as f32;
    if ratio < config.min_ratio {
        Ok((compressed, config.method))
    } else {
        Ok((data.to_vec(), CompressionMethod::None))
    }
}
