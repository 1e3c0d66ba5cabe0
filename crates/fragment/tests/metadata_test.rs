//! Integration tests for fragment metadata persistence.

use proptest::prelude::*;
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;
use tessera_fragment::{
    ArrayLayout, CoordType, FragmentError, FragmentMetadata, RangeBuffer,
};

#[test]
fn test_write_flush_load_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fragment.meta");

    // One-dimensional, two-attribute fragment.
    let layout = ArrayLayout::new(2, 1, CoordType::Int64);

    // Write session
    {
        let mut meta = FragmentMetadata::new(&layout);
        meta.init(RangeBuffer::from_i64s(&[0, 100])).unwrap();
        meta.append_tile_offset(0, 0).unwrap();
        meta.append_tile_offset(0, 4096).unwrap();
        meta.append_tile_offset(1, 0).unwrap();
        meta.append_tile_offset(1, 8192).unwrap();
        meta.finalize();
        meta.flush(&path).unwrap();
    }

    // Read session
    {
        let meta = FragmentMetadata::load(&path, &layout).unwrap();
        assert!(meta.is_sealed());

        let range = meta.range().unwrap();
        assert_eq!(range.element_as_i64(0), Some(0));
        assert_eq!(range.element_as_i64(1), Some(100));

        assert_eq!(meta.tile_offsets(0).unwrap(), &[0, 4096]);
        assert_eq!(meta.tile_offsets(1).unwrap(), &[0, 8192]);
    }
}

#[test]
fn test_loaded_instance_rejects_appends() {
    let layout = ArrayLayout::new(1, 1, CoordType::Int64);
    let mut meta = FragmentMetadata::new(&layout);
    meta.append_tile_offset(0, 0).unwrap();

    let mut bytes = Vec::new();
    meta.serialize_into(&mut bytes).unwrap();

    let mut loaded = FragmentMetadata::deserialize_from(Cursor::new(bytes), &layout).unwrap();
    assert!(matches!(
        loaded.append_tile_offset(0, 4096),
        Err(FragmentError::Sealed)
    ));
}

#[test]
fn test_load_wrong_attribute_count() {
    let written = ArrayLayout::new(2, 1, CoordType::Int64);
    let mut meta = FragmentMetadata::new(&written);
    meta.append_tile_offset(0, 0).unwrap();
    meta.append_tile_offset(1, 4096).unwrap();

    let mut bytes = Vec::new();
    meta.serialize_into(&mut bytes).unwrap();

    // Opening with a three-attribute layout runs out of records; with a
    // one-attribute layout it finds trailing bytes. Both are corruption.
    for attribute_count in [1, 3] {
        let opened = ArrayLayout::new(attribute_count, 1, CoordType::Int64);
        let result = FragmentMetadata::deserialize_from(Cursor::new(bytes.clone()), &opened);
        assert!(matches!(result, Err(FragmentError::CorruptMetadata(_))));
    }
}

#[test]
fn test_load_truncated_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fragment.meta");

    let layout = ArrayLayout::new(2, 1, CoordType::Int64);
    let mut meta = FragmentMetadata::new(&layout);
    meta.init(RangeBuffer::from_i64s(&[0, 100])).unwrap();
    for tile in 0..64u64 {
        meta.append_tile_offset(0, tile * 4096).unwrap();
        meta.append_tile_offset(1, tile * 8192).unwrap();
    }
    meta.finalize();
    meta.flush(&path).unwrap();

    // Chop the compressed stream and make sure every truncation point
    // fails cleanly instead of producing a partial index.
    let full = fs::read(&path).unwrap();
    for keep in [1, full.len() / 4, full.len() / 2, full.len() - 1] {
        fs::write(&path, &full[..keep]).unwrap();
        let result = FragmentMetadata::load(&path, &layout);
        assert!(
            matches!(result, Err(FragmentError::CorruptMetadata(_))),
            "truncation to {} bytes not detected",
            keep
        );
    }
}

#[test]
fn test_load_garbage_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fragment.meta");
    fs::write(&path, b"definitely not fragment metadata").unwrap();

    let layout = ArrayLayout::new(2, 1, CoordType::Int64);
    let result = FragmentMetadata::load(&path, &layout);
    assert!(matches!(result, Err(FragmentError::CorruptMetadata(_))));
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("no-such-fragment.meta");

    let layout = ArrayLayout::new(2, 1, CoordType::Int64);
    let result = FragmentMetadata::load(&path, &layout);
    assert!(matches!(result, Err(FragmentError::Io(_))));
}

/// Strategy for a layout plus matching range bounds and offset lists.
fn metadata_strategy() -> impl Strategy<Value = (ArrayLayout, Option<Vec<i64>>, Vec<Vec<u64>>)> {
    (1usize..=6, 1usize..=4).prop_flat_map(|(attribute_count, dimension_count)| {
        let layout = ArrayLayout::new(attribute_count, dimension_count, CoordType::Int64);
        let range = prop::option::of(prop::collection::vec(
            any::<i64>(),
            2 * dimension_count,
        ));
        let offsets = prop::collection::vec(
            prop::collection::vec(any::<u64>(), 0..64).prop_map(|mut v| {
                v.sort_unstable();
                v
            }),
            attribute_count,
        );
        (Just(layout), range, offsets)
    })
}

proptest! {
    /// Any valid (range, offsets) pair survives the round trip byte-exact.
    #[test]
    fn test_roundtrip_proptest((layout, range, offsets) in metadata_strategy()) {
        let mut meta = FragmentMetadata::new(&layout);
        if let Some(bounds) = &range {
            meta.init(RangeBuffer::from_i64s(bounds)).unwrap();
        }
        for (attribute, list) in offsets.iter().enumerate() {
            for &offset in list {
                meta.append_tile_offset(attribute, offset).unwrap();
            }
        }
        meta.finalize();

        let mut bytes = Vec::new();
        meta.serialize_into(&mut bytes).unwrap();
        let loaded = FragmentMetadata::deserialize_from(Cursor::new(bytes), &layout).unwrap();

        match &range {
            Some(bounds) => {
                let loaded_range = loaded.range().unwrap();
                prop_assert_eq!(loaded_range.element_count(), bounds.len());
                for (i, &bound) in bounds.iter().enumerate() {
                    prop_assert_eq!(loaded_range.element_as_i64(i), Some(bound));
                }
            }
            None => prop_assert!(loaded.range().is_none()),
        }
        for (attribute, list) in offsets.iter().enumerate() {
            prop_assert_eq!(loaded.tile_offsets(attribute).unwrap(), list.as_slice());
        }
    }
}
