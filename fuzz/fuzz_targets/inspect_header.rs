#![no_main]

use lazy_bitmap::engine::UNKNOWN_MIME;
use lazy_bitmap::{detect_mime_type, Source};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let _ = detect_mime_type(data, UNKNOWN_MIME);

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Source::DataUri(Arc::from(text)).load();
    }
});
