#![no_main]

//! Exercises the EXIF reader on arbitrary containers.

use lazy_bitmap::engine::{normalized_rotation, ExifMetadataReader, MetadataReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let reader = ExifMetadataReader;
    if let Ok(orientation) = reader.read_orientation(data) {
        assert!((1..=8).contains(&orientation));
        let _ = normalized_rotation(orientation);
    }
    let _ = reader.read_metadata(data);
});
