//! Property-based tests for catalog persistence
//!
//! Uses proptest to verify that flush/load round-trips and that truncated
//! metadata is always rejected.

use fragment_catalog::{BookKeeping, CatalogConfig, CompressionMethod, FragmentError, SpatialRange};
use proptest::prelude::*;

fn build_catalog(range: &[u8], offsets: &[Vec<u64>]) -> BookKeeping {
    let mut catalog = BookKeeping::new();
    catalog
        .init(offsets.len(), SpatialRange::from_bytes(range.to_vec()))
        .unwrap();
    for (attribute, list) in offsets.iter().enumerate() {
        for &offset in list {
            catalog.append_tile_offset(attribute, offset).unwrap();
        }
    }
    catalog.finalize().unwrap();
    catalog
}

/// Non-decreasing offsets, like a real tile writer produces
fn offsets_strategy(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1 << 20, 0..max_len).prop_map(|steps| {
        let mut next = 0u64;
        steps
            .into_iter()
            .map(|step| {
                let offset = next;
                next += step;
                offset
            })
            .collect()
    })
}

fn method_strategy() -> impl Strategy<Value = CompressionMethod> {
    prop_oneof![
        Just(CompressionMethod::None),
        Just(CompressionMethod::Lz4),
        Just(CompressionMethod::Zstd),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_flush_load_round_trip(
        range in prop::collection::vec(any::<u8>(), 1..256),
        offsets in prop::collection::vec(offsets_strategy(10_000), 1..64),
        method in method_strategy(),
        chunk_size in 1usize..20_000,
    ) {
        let catalog = build_catalog(&range, &offsets);
        let config = CatalogConfig {
            compression: method,
            chunk_size,
            ..Default::default()
        };

        let bytes = catalog.flush(Vec::new(), &config).unwrap();
        let mut loaded = BookKeeping::new();
        loaded.load(bytes.as_slice()).unwrap();

        prop_assert_eq!(loaded.range().unwrap().as_bytes(), range.as_slice());
        prop_assert_eq!(loaded.attribute_count(), offsets.len());
        for (attribute, expected) in offsets.iter().enumerate() {
            prop_assert_eq!(loaded.tile_offsets(attribute).unwrap(), expected.as_slice());
        }
    }

    #[test]
    fn prop_truncation_detected(
        range in prop::collection::vec(any::<u8>(), 1..64),
        offsets in prop::collection::vec(offsets_strategy(2_000), 1..8),
        method in method_strategy(),
        cut_seed in any::<prop::sample::Index>(),
    ) {
        let catalog = build_catalog(&range, &offsets);
        let config = CatalogConfig {
            compression: method,
            chunk_size: 1_000,
            ..Default::default()
        };
        let bytes = catalog.flush(Vec::new(), &config).unwrap();

        let cut = 1 + cut_seed.index(bytes.len());
        let truncated = &bytes[..bytes.len() - cut];

        let mut loaded = BookKeeping::new();
        match loaded.load(truncated) {
            Ok(()) => prop_assert!(false, "truncation by {} bytes went undetected", cut),
            Err(e) => prop_assert!(e.is_corruption() || matches!(e, FragmentError::Io(_))),
        }
        prop_assert!(loaded.range().is_none());
    }

    #[test]
    fn prop_append_sequence_preserved(
        appends in prop::collection::vec((0usize..4, any::<u64>()), 0..500),
    ) {
        let mut catalog = BookKeeping::new();
        catalog.init(4, SpatialRange::from_bytes(vec![0u8; 16])).unwrap();

        let mut expected = vec![Vec::new(); 4];
        for &(attribute, offset) in &appends {
            catalog.append_tile_offset(attribute, offset).unwrap();
            expected[attribute].push(offset);
        }

        for (attribute, list) in expected.iter().enumerate() {
            prop_assert_eq!(catalog.tile_offsets(attribute).unwrap(), list.as_slice());
        }
    }

    #[test]
    fn prop_sealed_catalog_rejects_appends(
        before in prop::collection::vec(any::<u64>(), 0..50),
        after in prop::collection::vec(any::<u64>(), 1..50),
    ) {
        let mut catalog = BookKeeping::new();
        catalog.init(1, SpatialRange::from_bytes(vec![1u8; 8])).unwrap();
        for &offset in &before {
            catalog.append_tile_offset(0, offset).unwrap();
        }
        catalog.finalize().unwrap();

        for &offset in &after {
            prop_assert!(matches!(
                catalog.append_tile_offset(0, offset),
                Err(FragmentError::SealedCatalog)
            ));
        }
        prop_assert_eq!(catalog.tile_offsets(0).unwrap(), before.as_slice());
    }
}

#[test]
fn test_scenario_two_attributes() {
    let mut catalog = BookKeeping::new();
    catalog
        .init(2, SpatialRange::from_pairs(&[(0i64, 10i64)]))
        .unwrap();
    catalog.append_tile_offset(0, 100).unwrap();
    catalog.append_tile_offset(0, 220).unwrap();
    catalog.append_tile_offset(1, 150).unwrap();
    catalog.finalize().unwrap();

    let sink = catalog.flush(Vec::new(), &CatalogConfig::default()).unwrap();

    let mut loaded = BookKeeping::new();
    loaded.load(sink.as_slice()).unwrap();
    assert_eq!(
        loaded.range().unwrap().to_pairs::<i64>().unwrap(),
        vec![(0, 10)]
    );
    assert_eq!(loaded.tile_offsets(0).unwrap(), &[100, 220]);
    assert_eq!(loaded.tile_offsets(1).unwrap(), &[150]);
}

#[test]
fn test_max_sized_catalog_round_trip() {
    let offsets: Vec<Vec<u64>> = (0..64)
        .map(|a| (0..10_000u64).map(|t| t * 4096 + a).collect())
        .collect();
    let catalog = build_catalog(&[7u8; 48], &offsets);

    let bytes = catalog
        .flush(Vec::new(), &CatalogConfig {
            compression: CompressionMethod::Zstd,
            ..Default::default()
        })
        .unwrap();
    assert!(bytes.len() < 64 * 10_000 * 8);

    let loaded = BookKeeping::from_reader(bytes.as_slice()).unwrap();
    assert_eq!(loaded.attribute_count(), 64);
    assert_eq!(loaded.tile_offsets(63).unwrap(), offsets[63].as_slice());
}
