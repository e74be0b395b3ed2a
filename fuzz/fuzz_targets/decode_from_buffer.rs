#![no_main]

use lazy_bitmap::BitmapAsset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let asset = BitmapAsset::new(data);
    if asset.load().is_ok() {
        let (width, height) = asset.dimensions();
        assert!(width > 0 && height > 0);
    }
    asset.destroy(true);
});
