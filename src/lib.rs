//! # Fragment Catalog - Fragment Identity and Book-Keeping for Array Storage
//!
//! Every write to a multi-dimensional array produces an immutable *fragment*.
//! This crate provides the layer that names fragments and indexes their tiles:
//!
//! - **Time-ordered identifiers**: 128-bit ids, unique across threads, that
//!   sort in generation order within a millisecond
//! - **Book-keeping catalogs**: per-attribute tile offsets plus the fragment's
//!   spatial range, built incrementally during a write
//! - **Compact persistence**: chunked, optionally compressed metadata files with
//!   truncation and checksum detection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fragment_catalog::{
//!     list_fragments, CatalogConfig, Datatype, DomainLayout, FragmentReader, FragmentWriter,
//!     Result, SpatialRange,
//! };
//!
//! # fn main() -> Result<()> {
//! let layout = DomainLayout::new(Datatype::Int64, 2);
//! let range = SpatialRange::from_pairs(&[(0i64, 99i64), (0, 99)]);
//!
//! // Two attributes; record tiles as they are written
//! let config = CatalogConfig::default();
//! let mut writer = FragmentWriter::create("my_array", &layout, 2, range, config)?;
//! writer.append_tile(0, 4096)?;
//! writer.append_tile(1, 1024)?;
//! writer.commit()?;
//!
//! for (id, path) in list_fragments("my_array")? {
//!     let fragment = FragmentReader::open(&path)?;
//!     let bounds = fragment.range().to_pairs::<i64>()?;
//!     println!("{}: {:?}, {} tiles", id, bounds, fragment.tile_offsets(0)?.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Catalog Without a Filesystem
//!
//! ```rust
//! use fragment_catalog::{BookKeeping, CatalogConfig, SpatialRange};
//!
//! # fn main() -> fragment_catalog::Result<()> {
//! let mut catalog = BookKeeping::new();
//! catalog.init(2, SpatialRange::from_pairs(&[(0i32, 10i32)]))?;
//! catalog.append_tile_offset(0, 100)?;
//! catalog.append_tile_offset(0, 220)?;
//! catalog.append_tile_offset(1, 150)?;
//! catalog.finalize()?;
//!
//! let bytes = catalog.flush(Vec::new(), &CatalogConfig::default())?;
//!
//! let mut loaded = BookKeeping::new();
//! loaded.load(bytes.as_slice())?;
//! assert_eq!(loaded.tile_offsets(0)?, &[100, 220]);
//! assert_eq!(loaded.tile_offsets(1)?, &[150]);
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    book_keeping, codec, config, error, fragment, range, uuid, validation,
};

// Re-export the types most callers need
pub use crate::core::{
    book_keeping::{BookKeeping, CatalogState},
    codec::compression::CompressionMethod,
    config::CatalogConfig,
    error::{FragmentError, Result},
    fragment::{list_fragments, FragmentReader, FragmentWriter},
    range::{Coordinate, Datatype, DomainLayout, SpatialRange},
    uuid::{generate_fragment_id, Clock, FragmentId, SystemClock, UuidGenerator},
};
