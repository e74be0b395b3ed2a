// tests/edge_cases.rs
//
// Edge case tests for lazy-bitmap
// Tests boundary values, invalid inputs, and error handling

use image::{ImageFormat, Rgba, RgbaImage};
use lazy_bitmap::engine::{
    check_dimensions, detect_mime_type, estimate_new_dimensions, CodecEncoder, Encoder,
    MAX_DIMENSION, UNKNOWN_MIME,
};
use lazy_bitmap::{
    AssetState, BitmapAsset, BitmapError, EncodeTarget, ErrorCategory, OptimizationMode,
    OptimizationOptions, Source,
};
use std::io::Cursor;
use std::sync::Arc;

// Helper function to create test images
fn create_test_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn encode(img: &RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

mod minimal_image_tests {
    use super::*;

    #[test]
    fn test_1x1_png_loads_and_optimizes() {
        let asset = BitmapAsset::new(encode(&create_test_image(1, 1), ImageFormat::Png));
        asset.load().unwrap();
        assert_eq!(asset.dimensions(), (1, 1));

        let result = asset
            .optimize(
                EncodeTarget::new("image/jpeg", 0.5),
                &OptimizationOptions::new().with_size_limit(1),
            )
            .unwrap();
        // Nothing encodes to one byte; the floor result is 1x1.
        assert!(!result.within_limit);
        assert_eq!((result.width, result.height), (1, 1));
    }

    #[test]
    fn test_1x1_strict_is_unachievable() {
        let asset = BitmapAsset::new(encode(&create_test_image(1, 1), ImageFormat::Png));
        asset.load().unwrap();
        let err = asset
            .optimize(
                EncodeTarget::new("image/jpeg", 0.5),
                &OptimizationOptions::new().with_size_limit(1).strict(true),
            )
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            BitmapError::SizeLimitUnachievable { limit: 1, .. }
        ));
        assert_eq!(err.category(), ErrorCategory::ResourceLimit);
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_positive_dimensions() {
        let asset = BitmapAsset::new(encode(&create_test_image(200, 1), ImageFormat::Png));
        asset.load().unwrap();
        let result = asset
            .optimize(
                EncodeTarget::new("image/png", 1.0),
                &OptimizationOptions::new()
                    .with_size_limit(10)
                    .with_mode(OptimizationMode::RetainQuality),
            )
            .unwrap();
        assert!(result.width >= 1);
        assert!(result.height >= 1);
    }
}

mod quality_boundary_tests {
    use super::*;

    fn loaded() -> BitmapAsset {
        let asset = BitmapAsset::new(encode(&create_test_image(16, 16), ImageFormat::Png));
        asset.load().unwrap();
        asset
    }

    #[test]
    fn test_quality_zero_and_one_are_valid() {
        let asset = loaded();
        for quality in [0.0, 1.0] {
            assert!(asset
                .optimize(
                    EncodeTarget::new("image/jpeg", quality),
                    &OptimizationOptions::default()
                )
                .is_ok());
        }
    }

    #[test]
    fn test_quality_outside_unit_range_is_rejected() {
        let asset = loaded();
        for quality in [-0.01, 1.01, f32::NAN] {
            let err = asset
                .optimize(
                    EncodeTarget::new("image/jpeg", quality),
                    &OptimizationOptions::default(),
                )
                .unwrap_err();
            assert!(matches!(err.kind(), BitmapError::InvalidQuality { .. }));
        }
    }

    #[test]
    fn test_non_positive_scale_is_rejected() {
        let asset = loaded();
        for scale in [0.0, -1.0, f64::INFINITY] {
            let err = asset
                .optimize(
                    EncodeTarget::new("image/jpeg", 0.5).with_scale(scale),
                    &OptimizationOptions::default(),
                )
                .unwrap_err();
            assert!(matches!(err.kind(), BitmapError::InvalidResizeFactor { .. }));
        }
    }

    #[test]
    fn test_upscale_is_allowed() {
        let asset = loaded();
        let result = asset
            .optimize(
                EncodeTarget::new("image/png", 1.0).with_scale(2.0),
                &OptimizationOptions::default(),
            )
            .unwrap();
        assert_eq!((result.width, result.height), (32, 32));
    }
}

mod source_tests {
    use super::*;

    #[test]
    fn test_missing_file_is_resource_limit_error() {
        let asset = BitmapAsset::new(Source::Path("/no/such/image.png".into()));
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::FileReadFailed { .. }));
        assert!(err.source_descriptor().contains("/no/such/image.png"));
        assert_eq!(asset.state(), AssetState::Empty);
    }

    #[test]
    fn test_pdf_sniffs_but_does_not_decode() {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.resize(64, b' ');
        assert_eq!(detect_mime_type(&pdf, UNKNOWN_MIME), "application/pdf");
        let asset = BitmapAsset::new(pdf);
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::DecodeFailed { .. }));
    }

    #[test]
    fn test_truncated_png_is_decode_failure() {
        let mut png = encode(&create_test_image(32, 32), ImageFormat::Png);
        png.truncate(40);
        let err = BitmapAsset::new(png).load().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CodecError);
    }

    #[test]
    fn test_heic_without_decoder_is_decode_failure() {
        let mut heic = b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00mif1heic".to_vec();
        heic.resize(64, 0);
        let asset = BitmapAsset::new(heic);
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::DecodeFailed { .. }));
    }

    #[test]
    fn test_data_uri_with_bad_base64() {
        let asset = BitmapAsset::new(Source::DataUri(Arc::from("data:image/png;base64,!!!")));
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::DecodeFailed { .. }));
    }
}

mod limit_tests {
    use super::*;

    #[test]
    fn test_check_dimensions_boundaries() {
        assert!(check_dimensions(MAX_DIMENSION, 1).is_ok());
        assert!(check_dimensions(MAX_DIMENSION + 1, 1).is_err());
        assert!(check_dimensions(1, MAX_DIMENSION + 1).is_err());
    }

    #[test]
    fn test_max_dimension_zero_is_ignored() {
        let target = EncodeTarget::new("image/png", 1.0).with_max_dimension(0);
        assert_eq!(target.max_dimension, None);
    }

    #[test]
    fn test_estimator_single_pixel() {
        assert_eq!(estimate_new_dimensions(100, 1, 1.0, 1.0), (1.0, 1.0));
    }

    #[test]
    fn test_encoder_refuses_zero_area() {
        let err = CodecEncoder
            .encode(&[], 0, 0, "image/jpeg", 0.5)
            .unwrap_err();
        assert!(matches!(err, BitmapError::EncodeFailed { .. }));
    }
}
