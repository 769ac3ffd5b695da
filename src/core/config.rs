//! Catalog persistence configuration
//!
//! Loaded from TOML, every field optional:
//!
//! ```toml
//! compression = "zstd"     # none | lz4 | zstd
//! chunk_size = 10000       # payload bytes per compressed chunk
//! zstd_level = 3
//! sync_on_commit = true
//! ```

use crate::codec::compression::{CompressionConfig, CompressionMethod};
use crate::codec::header::MAX_CHUNK_SIZE;
use crate::error::{FragmentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default payload bytes per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Compression applied to each chunk
    pub compression: CompressionMethod,

    /// Payload bytes buffered before a chunk is compressed and written
    pub chunk_size: usize,

    /// Zstd compression level (1-22)
    pub zstd_level: i32,

    /// Chunks smaller than this are stored uncompressed
    pub compression_threshold: usize,

    /// Store a chunk uncompressed unless compression beats this ratio
    pub min_ratio: f32,

    /// fsync the metadata file and fragment directory when a fragment commits
    pub sync_on_commit: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            compression: CompressionMethod::Lz4,
            chunk_size: DEFAULT_CHUNK_SIZE,
            zstd_level: 3,
            compression_threshold: 512,
            min_ratio: 0.9,
            sync_on_commit: true,
        }
    }
}

impl CatalogConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CatalogConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| FragmentError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(FragmentError::Config(format!(
                "chunk_size must be between 1 and {} bytes, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }

        if !(1..=22).contains(&self.zstd_level) {
            return Err(FragmentError::Config(format!(
                "zstd_level must be between 1 and 22, got {}",
                self.zstd_level
            )));
        }

        if !(self.min_ratio > 0.0 && self.min_ratio <= 1.0) {
            return Err(FragmentError::Config(format!(
                "min_ratio must be in (0, 1], got {}",
                self.min_ratio
            )));
        }

        Ok(())
    }

    /// Per-chunk compression settings derived from this config
    pub fn compression_config(&self) -> CompressionConfig {
        match self.compression {
            CompressionMethod::None => CompressionConfig::none(),
            method => CompressionConfig {
                method,
                threshold: self.compression_threshold,
                min_ratio: self.min_ratio,
                zstd_level: self.zstd_level,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.compression, CompressionMethod::Lz4);
        assert_eq!(config.chunk_size, 10_000);
        assert!(config.sync_on_commit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config =
            CatalogConfig::from_toml_str("compression = \"zstd\"\nzstd_level = 9\n").unwrap();
        assert_eq!(config.compression, CompressionMethod::Zstd);
        assert_eq!(config.zstd_level, 9);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            CatalogConfig::from_toml_str("compression = \"brotli\""),
            Err(FragmentError::Config(_))
        ));
        assert!(matches!(
            CatalogConfig::from_toml_str("chunk_size = 0"),
            Err(FragmentError::Config(_))
        ));
        assert!(matches!(
            CatalogConfig::from_toml_str("zstd_level = 40"),
            Err(FragmentError::Config(_))
        ));
        assert!(matches!(
            CatalogConfig::from_toml_str("unknown_key = 1"),
            Err(FragmentError::Config(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CatalogConfig {
            compression: CompressionMethod::None,
            chunk_size: 4096,
            sync_on_commit: false,
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(CatalogConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "compression = \"none\"").unwrap();
        writeln!(file, "chunk_size = 2048").unwrap();

        let config = CatalogConfig::from_file(file.path()).unwrap();
        assert_eq!(config.compression, CompressionMethod::None);
        assert_eq!(config.chunk_size, 2048);

        assert!(matches!(
            CatalogConfig::from_file("/nonexistent/catalog.toml"),
            Err(FragmentError::Io(_))
        ));
    }

    #[test]
    fn test_compression_config_for_none() {
        let config = CatalogConfig {
            compression: CompressionMethod::None,
            ..Default::default()
        };
        assert_eq!(config.compression_config().method, CompressionMethod::None);
    }
}
