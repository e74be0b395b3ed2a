// src/engine/encoder.rs
//
// Encoder capability and the default codec-backed implementation:
// JPEG (mozjpeg), WebP (libwebp), PNG/BMP/GIF (image crate).

use crate::engine::common::run_with_panic_policy;
use crate::error::{BitmapError, Result};
use image::{ImageFormat, RgbaImage};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;

/// Turns RGBA8 pixels into encoded bytes.
///
/// `quality` is in `[0, 1]`; lossless formats ignore it. Implementations
/// must be deterministic for identical inputs.
pub trait Encoder: Send + Sync {
    fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        mime_type: &str,
        quality: f32,
    ) -> Result<Vec<u8>>;

    fn is_mime_type_supported(&self, mime_type: &str) -> bool;
}

/// Maps a quality value (0-100) onto per-format encoder settings.
/// Bands:
/// - High (>=85): visual quality first
/// - Balanced (70-84)
/// - Fast (50-69)
/// - Fastest (<50)
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    /// Convert a unit quality into the 1-100 scale codecs expect.
    pub fn from_unit(quality: f32) -> Self {
        let scaled = if quality.is_finite() {
            (quality * 100.0).round().clamp(1.0, 100.0)
        } else {
            1.0
        };
        Self::new(scaled as u8)
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast | QualityBand::Fastest => 0,
        }
    }
}

/// Default encoder backed by the crate's codec stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodecEncoder;

impl CodecEncoder {
    pub const SUPPORTED: &'static [&'static str] = &[
        "image/jpeg",
        "image/jpg",
        "image/webp",
        "image/png",
        "image/bmp",
        "image/gif",
    ];
}

impl Encoder for CodecEncoder {
    fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        mime_type: &str,
        quality: f32,
    ) -> Result<Vec<u8>> {
        if width == 0 || height == 0 {
            return Err(BitmapError::encode_failed(
                mime_type.to_string(),
                "width or height is zero",
            ));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(BitmapError::encode_failed(
                mime_type.to_string(),
                format!("expected {expected} RGBA bytes, got {}", pixels.len()),
            ));
        }

        let settings = QualitySettings::from_unit(quality);
        match mime_type {
            "image/jpeg" | "image/jpg" => encode_jpeg(pixels, width, height, settings),
            "image/webp" => encode_webp(pixels, width, height, settings),
            "image/png" => encode_with_image_crate(pixels, width, height, ImageFormat::Png),
            "image/bmp" => encode_with_image_crate(pixels, width, height, ImageFormat::Bmp),
            "image/gif" => encode_with_image_crate(pixels, width, height, ImageFormat::Gif),
            other => Err(BitmapError::encode_failed(
                other.to_string(),
                "no encoder for this mime type",
            )),
        }
    }

    fn is_mime_type_supported(&self, mime_type: &str) -> bool {
        Self::SUPPORTED.contains(&mime_type)
    }
}

/// Encode RGBA pixels to JPEG using mozjpeg. Alpha is dropped.
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    settings: QualitySettings,
) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let rgb: Vec<u8> = pixels
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality());
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let estimated_size = (width as usize * height as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                BitmapError::encode_failed(
                    "image/jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;
            for row in rgb.chunks(width as usize * 3) {
                writer.write_scanlines(row).map_err(|e| {
                    BitmapError::encode_failed(
                        "image/jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }
            writer.finish().map_err(|e| {
                BitmapError::encode_failed("image/jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// Encode RGBA pixels to lossy WebP.
pub fn encode_webp(
    pixels: &[u8],
    width: u32,
    height: u32,
    settings: QualitySettings,
) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let encoder = webp::Encoder::from_rgba(pixels, width, height);
        let mut config = webp::WebPConfig::new()
            .map_err(|_| BitmapError::internal_panic("failed to create WebPConfig"))?;

        config.quality = settings.quality();
        config.method = 4;
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            BitmapError::encode_failed("image/webp", format!("WebP encode failed: {e:?}"))
        })?;
        Ok(mem.to_vec())
    })
}

fn encode_with_image_crate(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: ImageFormat,
) -> Result<Vec<u8>> {
    let mime = format.to_mime_type();
    run_with_panic_policy("encode:image", || {
        let img = RgbaImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| BitmapError::encode_failed(mime, "pixel buffer size mismatch"))?;
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| BitmapError::encode_failed(mime, e.to_string()))?;
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_pixels(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let x = i % width;
                let y = i / width;
                [(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8, 255]
            })
            .collect()
    }

    #[test]
    fn test_encode_jpeg_produces_valid_jpeg() {
        let pixels = create_test_pixels(64, 48);
        let out = CodecEncoder
            .encode(&pixels, 64, 48, "image/jpeg", 0.8)
            .unwrap();
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_encode_jpeg_quality_affects_size() {
        let pixels = create_test_pixels(128, 128);
        let high = CodecEncoder
            .encode(&pixels, 128, 128, "image/jpeg", 0.95)
            .unwrap();
        let low = CodecEncoder
            .encode(&pixels, 128, 128, "image/jpeg", 0.2)
            .unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_encode_webp_produces_valid_webp() {
        let pixels = create_test_pixels(32, 32);
        let out = CodecEncoder
            .encode(&pixels, 32, 32, "image/webp", 0.75)
            .unwrap();
        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_png_produces_valid_png() {
        let pixels = create_test_pixels(10, 6);
        let out = CodecEncoder
            .encode(&pixels, 10, 6, "image/png", 0.0)
            .unwrap();
        assert_eq!(&out[0..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_unsupported_mime_is_encode_failure() {
        let pixels = create_test_pixels(2, 2);
        let err = CodecEncoder
            .encode(&pixels, 2, 2, "image/heic", 0.5)
            .unwrap_err();
        assert!(matches!(err, BitmapError::EncodeFailed { .. }));
        assert!(!CodecEncoder.is_mime_type_supported("image/heic"));
        assert!(CodecEncoder.is_mime_type_supported("image/webp"));
    }

    #[test]
    fn test_buffer_mismatch_is_rejected() {
        let err = CodecEncoder
            .encode(&[0; 12], 2, 2, "image/png", 1.0)
            .unwrap_err();
        assert!(matches!(err, BitmapError::EncodeFailed { .. }));
    }

    #[test]
    fn test_quality_band_mapping_boundaries() {
        assert_eq!(QualitySettings::from_unit(0.0).quality(), 1.0);
        assert_eq!(QualitySettings::from_unit(0.025).quality(), 3.0);
        assert_eq!(QualitySettings::from_unit(0.92).quality(), 92.0);
        assert_eq!(QualitySettings::from_unit(2.0).quality(), 100.0);
        assert_eq!(QualitySettings::new(85).band(), QualityBand::High);
        assert_eq!(QualitySettings::new(84).band(), QualityBand::Balanced);
        assert_eq!(QualitySettings::new(50).band(), QualityBand::Fast);
        assert_eq!(QualitySettings::new(49).band(), QualityBand::Fastest);
    }
}
