//! Per-fragment book-keeping catalog
//!
//! A catalog records, for one fragment, the spatial range the fragment covers
//! and, for every attribute, the byte offsets at which that attribute's tiles
//! begin in its data file.
//!
//! **Lifecycle**:
//! ```text
//! Uninitialized --init--> Appending --finalize--> Finalized
//! Uninitialized --load-------------------------> Finalized
//! ```
//!
//! Appends take `&mut self`, so a catalog has exactly one writer. Once
//! finalized it never changes and can be shared across threads behind an `Arc`.

use crate::codec::{decode_catalog, encode_catalog};
use crate::config::CatalogConfig;
use crate::error::{FragmentError, Result};
use crate::range::SpatialRange;
use std::io::{Read, Write};
use tracing::debug;

/// Lifecycle stage of a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogState {
    #[default]
    Uninitialized,
    Appending,
    Finalized,
}

impl CatalogState {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogState::Uninitialized => "uninitialized",
            CatalogState::Appending => "appending",
            CatalogState::Finalized => "finalized",
        }
    }
}

/// Tile offsets and spatial range of one fragment
#[derive(Debug, Clone, Default)]
pub struct BookKeeping {
    state: CatalogState,
    range: SpatialRange,
    /// Tile start offsets per attribute, in write order
    tile_offsets: Vec<Vec<u64>>,
    /// Offset the next tile of each attribute will start at (write session only)
    next_tile_offsets: Vec<u64>,
}

impl BookKeeping {
    /// Create an uninitialized catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a finalized catalog from a metadata stream
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        decode_catalog(source)
    }

    pub(crate) fn from_parts(range: SpatialRange, tile_offsets: Vec<Vec<u64>>) -> Self {
        BookKeeping {
            state: CatalogState::Finalized,
            range,
            tile_offsets,
            next_tile_offsets: Vec::new(),
        }
    }

    /// Prepare `attribute_count` empty offset lists and store the range
    ///
    /// The range is checked against the array schema by the caller
    /// (see [`crate::range::DomainLayout::validate`]); here it only has to be
    /// non-empty.
    pub fn init(&mut self, attribute_count: usize, range: SpatialRange) -> Result<()> {
        match self.state {
            CatalogState::Uninitialized => {}
            CatalogState::Finalized => return Err(FragmentError::SealedCatalog),
            CatalogState::Appending => {
                return Err(FragmentError::InvalidState {
                    expected: CatalogState::Uninitialized.name(),
                    actual: self.state.name(),
                })
            }
        }

        if attribute_count == 0 {
            return Err(FragmentError::InvalidArgument(
                "attribute count must be at least 1".to_string(),
            ));
        }
        if range.is_empty() {
            return Err(FragmentError::InvalidArgument(
                "range must not be empty".to_string(),
            ));
        }

        self.range = range;
        self.tile_offsets = vec![Vec::new(); attribute_count];
        self.next_tile_offsets = vec![0; attribute_count];
        self.state = CatalogState::Appending;
        Ok(())
    }

    fn check_appendable(&self, attribute: usize) -> Result<()> {
        match self.state {
            CatalogState::Appending => {}
            CatalogState::Finalized => return Err(FragmentError::SealedCatalog),
            CatalogState::Uninitialized => {
                return Err(FragmentError::InvalidState {
                    expected: CatalogState::Appending.name(),
                    actual: self.state.name(),
                })
            }
        }

        if attribute >= self.tile_offsets.len() {
            return Err(FragmentError::OutOfRange {
                index: attribute,
                count: self.tile_offsets.len(),
            });
        }
        Ok(())
    }

    /// Record that a tile of `attribute` starts at `offset`
    ///
    /// Offsets must be appended in tile-write order (non-decreasing); readers
    /// binary-search them. This is not re-checked here.
    pub fn append_tile_offset(&mut self, attribute: usize, offset: u64) -> Result<()> {
        self.check_appendable(attribute)?;
        self.tile_offsets[attribute].push(offset);
        Ok(())
    }

    /// Record a tile of `tile_size` bytes written right after the previous one
    ///
    /// Returns the offset the tile starts at. Use either this or
    /// [`BookKeeping::append_tile_offset`] for a given attribute, not both.
    pub fn append_tile(&mut self, attribute: usize, tile_size: u64) -> Result<u64> {
        self.check_appendable(attribute)?;

        let offset = self.next_tile_offsets[attribute];
        let next = offset.checked_add(tile_size).ok_or_else(|| {
            FragmentError::InvalidArgument(format!(
                "tile of {} bytes at offset {} overflows attribute {}",
                tile_size, offset, attribute
            ))
        })?;

        self.tile_offsets[attribute].push(offset);
        self.next_tile_offsets[attribute] = next;
        Ok(offset)
    }

    /// Seal the catalog; later appends fail with `SealedCatalog`
    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            CatalogState::Appending => {}
            CatalogState::Finalized => return Err(FragmentError::SealedCatalog),
            CatalogState::Uninitialized => {
                return Err(FragmentError::InvalidState {
                    expected: CatalogState::Appending.name(),
                    actual: self.state.name(),
                })
            }
        }

        self.state = CatalogState::Finalized;
        self.next_tile_offsets = Vec::new();
        debug!(
            "Finalized catalog: {} attributes, {} tiles",
            self.attribute_count(),
            self.tile_offsets.iter().map(Vec::len).sum::<usize>()
        );
        Ok(())
    }

    /// Write the finalized catalog to `sink`, returning the sink
    ///
    /// A failed flush leaves `sink` with undefined contents; the fragment must
    /// not be treated as committed.
    pub fn flush<W: Write>(&self, sink: W, config: &CatalogConfig) -> Result<W> {
        if self.state != CatalogState::Finalized {
            return Err(FragmentError::InvalidState {
                expected: CatalogState::Finalized.name(),
                actual: self.state.name(),
            });
        }
        encode_catalog(self, sink, config)
    }

    /// Populate an uninitialized catalog from a metadata stream
    ///
    /// On error the catalog is left untouched.
    pub fn load<R: Read>(&mut self, source: R) -> Result<()> {
        if self.state != CatalogState::Uninitialized {
            return Err(FragmentError::InvalidState {
                expected: CatalogState::Uninitialized.name(),
                actual: self.state.name(),
            });
        }

        *self = decode_catalog(source)?;
        Ok(())
    }

    /// The fragment's range, once initialized
    pub fn range(&self) -> Option<&SpatialRange> {
        match self.state {
            CatalogState::Uninitialized => None,
            _ => Some(&self.range),
        }
    }

    pub fn state(&self) -> CatalogState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == CatalogState::Finalized
    }

    pub fn attribute_count(&self) -> usize {
        self.tile_offsets.len()
    }

    /// Tile offsets of one attribute, in write order
    pub fn tile_offsets(&self, attribute: usize) -> Result<&[u64]> {
        self.tile_offsets
            .get(attribute)
            .map(Vec::as_slice)
            .ok_or(FragmentError::OutOfRange {
                index: attribute,
                count: self.tile_offsets.len(),
            })
    }

    /// Number of tiles recorded for one attribute
    pub fn tile_num(&self, attribute: usize) -> Result<usize> {
        self.tile_offsets(attribute).map(<[u64]>::len)
    }

    /// Start offset of tile `tile` of `attribute`
    pub fn tile_offset(&self, attribute: usize, tile: usize) -> Result<u64> {
        let offsets = self.tile_offsets(attribute)?;
        offsets.get(tile).copied().ok_or(FragmentError::OutOfRange {
            index: tile,
            count: offsets.len(),
        })
    }

    /// Byte span `[start, end)` of tile `tile`, given the attribute file size
    /// for the last tile
    pub fn tile_span(&self, attribute: usize, tile: usize, file_size: u64) -> Result<(u64, u64)> {
        let offsets = self.tile_offsets(attribute)?;
        let start = self.tile_offset(attribute, tile)?;
        let end = offsets.get(tile + 1).copied().unwrap_or(file_size);
        Ok((start, end))
    }

    /// Range regardless of state; empty before `init`
    pub(crate) fn stored_range(&self) -> &SpatialRange {
        &self.range
    }

    pub(crate) fn all_tile_offsets(&self) -> &[Vec<u64>] {
        &self.tile_offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_0_10() -> SpatialRange {
        SpatialRange::from_pairs(&[(0i64, 10i64)])
    }

    #[test]
    fn test_lifecycle() {
        let mut catalog = BookKeeping::new();
        assert_eq!(catalog.state(), CatalogState::Uninitialized);
        assert!(catalog.range().is_none());

        catalog.init(2, range_0_10()).unwrap();
        assert_eq!(catalog.state(), CatalogState::Appending);
        assert_eq!(catalog.attribute_count(), 2);
        assert_eq!(catalog.range(), Some(&range_0_10()));

        catalog.append_tile_offset(0, 100).unwrap();
        catalog.append_tile_offset(0, 220).unwrap();
        catalog.append_tile_offset(1, 150).unwrap();
        catalog.finalize().unwrap();

        assert!(catalog.is_finalized());
        assert_eq!(catalog.tile_offsets(0).unwrap(), &[100, 220]);
        assert_eq!(catalog.tile_offsets(1).unwrap(), &[150]);
    }

    #[test]
    fn test_init_rejects_bad_arguments() {
        let mut catalog = BookKeeping::new();
        assert!(matches!(
            catalog.init(0, range_0_10()),
            Err(FragmentError::InvalidArgument(_))
        ));
        assert!(matches!(
            catalog.init(1, SpatialRange::default()),
            Err(FragmentError::InvalidArgument(_))
        ));
        // Failed init leaves the catalog usable
        assert_eq!(catalog.state(), CatalogState::Uninitialized);
        catalog.init(1, range_0_10()).unwrap();
    }

    #[test]
    fn test_double_init() {
        let mut catalog = BookKeeping::new();
        catalog.init(1, range_0_10()).unwrap();
        assert!(matches!(
            catalog.init(1, range_0_10()),
            Err(FragmentError::InvalidState { .. })
        ));
        catalog.finalize().unwrap();
        assert!(matches!(
            catalog.init(1, range_0_10()),
            Err(FragmentError::SealedCatalog)
        ));
    }

    #[test]
    fn test_append_out_of_range() {
        let mut catalog = BookKeeping::new();
        catalog.init(2, range_0_10()).unwrap();
        assert!(matches!(
            catalog.append_tile_offset(2, 0),
            Err(FragmentError::OutOfRange { index: 2, count: 2 })
        ));
        assert!(catalog.tile_offsets(0).unwrap().is_empty());
    }

    #[test]
    fn test_append_before_init() {
        let mut catalog = BookKeeping::new();
        assert!(matches!(
            catalog.append_tile_offset(0, 0),
            Err(FragmentError::InvalidState { .. })
        ));
        assert!(matches!(
            catalog.finalize(),
            Err(FragmentError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_sealed_catalog() {
        let mut catalog = BookKeeping::new();
        catalog.init(1, range_0_10()).unwrap();
        catalog.append_tile_offset(0, 8).unwrap();
        catalog.finalize().unwrap();

        assert!(matches!(
            catalog.append_tile_offset(0, 16),
            Err(FragmentError::SealedCatalog)
        ));
        assert!(matches!(catalog.append_tile(0, 16), Err(FragmentError::SealedCatalog)));
        assert!(matches!(catalog.finalize(), Err(FragmentError::SealedCatalog)));
        assert_eq!(catalog.tile_offsets(0).unwrap(), &[8]);
    }

    #[test]
    fn test_append_tile_tracks_running_offset() {
        let mut catalog = BookKeeping::new();
        catalog.init(2, range_0_10()).unwrap();

        assert_eq!(catalog.append_tile(0, 100).unwrap(), 0);
        assert_eq!(catalog.append_tile(0, 120).unwrap(), 100);
        assert_eq!(catalog.append_tile(1, 50).unwrap(), 0);
        assert_eq!(catalog.append_tile(0, 1).unwrap(), 220);

        assert_eq!(catalog.tile_offsets(0).unwrap(), &[0, 100, 220]);
        assert_eq!(catalog.tile_offsets(1).unwrap(), &[0]);
    }

    #[test]
    fn test_append_tile_overflow() {
        let mut catalog = BookKeeping::new();
        catalog.init(1, range_0_10()).unwrap();
        catalog.append_tile(0, u64::MAX).unwrap();
        assert!(matches!(
            catalog.append_tile(0, 1),
            Err(FragmentError::InvalidArgument(_))
        ));
        assert_eq!(catalog.tile_num(0).unwrap(), 1);
    }

    #[test]
    fn test_tile_accessors() {
        let mut catalog = BookKeeping::new();
        catalog.init(1, range_0_10()).unwrap();
        for offset in [0, 64, 192] {
            catalog.append_tile_offset(0, offset).unwrap();
        }
        catalog.finalize().unwrap();

        assert_eq!(catalog.tile_num(0).unwrap(), 3);
        assert_eq!(catalog.tile_offset(0, 1).unwrap(), 64);
        assert!(matches!(
            catalog.tile_offset(0, 3),
            Err(FragmentError::OutOfRange { index: 3, count: 3 })
        ));
        assert!(catalog.tile_num(1).is_err());

        assert_eq!(catalog.tile_span(0, 0, 300).unwrap(), (0, 64));
        assert_eq!(catalog.tile_span(0, 2, 300).unwrap(), (192, 300));
    }

    #[test]
    fn test_flush_requires_finalize() {
        let mut catalog = BookKeeping::new();
        catalog.init(1, range_0_10()).unwrap();
        assert!(matches!(
            catalog.flush(Vec::new(), &CatalogConfig::default()),
            Err(FragmentError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_flush_and_load() {
        let mut catalog = BookKeeping::new();
        catalog.init(2, range_0_10()).unwrap();
        catalog.append_tile_offset(0, 100).unwrap();
        catalog.append_tile_offset(0, 220).unwrap();
        catalog.append_tile_offset(1, 150).unwrap();
        catalog.finalize().unwrap();

        let bytes = catalog.flush(Vec::new(), &CatalogConfig::default()).unwrap();

        let mut loaded = BookKeeping::new();
        loaded.load(bytes.as_slice()).unwrap();
        assert!(loaded.is_finalized());
        assert_eq!(loaded.range().unwrap().to_pairs::<i64>().unwrap(), vec![(0, 10)]);
        assert_eq!(loaded.tile_offsets(0).unwrap(), &[100, 220]);
        assert_eq!(loaded.tile_offsets(1).unwrap(), &[150]);

        // Loading twice is refused
        assert!(matches!(
            loaded.load(bytes.as_slice()),
            Err(FragmentError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_failed_load_leaves_catalog_uninitialized() {
        let mut catalog = BookKeeping::new();
        catalog.init(1, range_0_10()).unwrap();
        catalog.append_tile_offset(0, 1).unwrap();
        catalog.finalize().unwrap();
        let bytes = catalog.flush(Vec::new(), &CatalogConfig::default()).unwrap();

        let mut loaded = BookKeeping::new();
        assert!(loaded.load(&bytes[..bytes.len() - 3]).is_err());
        assert_eq!(loaded.state(), CatalogState::Uninitialized);
        assert!(loaded.range().is_none());
        assert_eq!(loaded.attribute_count(), 0);

        loaded.load(bytes.as_slice()).unwrap();
        assert_eq!(loaded.tile_offsets(0).unwrap(), &[1]);
    }

    #[test]
    fn test_finalized_catalog_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BookKeeping>();
    }
}
