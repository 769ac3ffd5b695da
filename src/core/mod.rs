//! Fragment identity and book-keeping internals
//!
//! - [`error`] - Error types for fragment operations
//! - [`uuid`] - Time-ordered fragment identifiers and their generator
//! - [`range`] - Spatial range bytes and their schema-side layout
//! - [`book_keeping`] - Per-fragment tile-offset catalog
//! - [`codec`] - Persistence of catalogs:
//!   - [`codec::header`] - Container header, chunk frames, trailer
//!   - [`codec::compression`] - Per-chunk LZ4/Zstd compression
//!   - [`codec::io`] - Streaming chunked reader/writer
//! - [`config`] - TOML-backed persistence settings
//! - [`fragment`] - Fragment directories, commit and discovery
//! - [`validation`] - Fragment id and directory name checks

pub mod book_keeping;
pub mod codec;
pub mod config;
pub mod error;
pub mod fragment;
pub mod range;
pub mod uuid;
pub mod validation;
