// src/engine/decoder.rs
//
// Decoder capability and the default codec-backed implementation:
// JPEG (mozjpeg), WebP (libwebp), everything else through the image crate.

use crate::engine::common::run_with_panic_policy;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{BitmapError, Result};
use image::{DynamicImage, ImageReader, RgbImage, RgbaImage};
use mozjpeg::Decompress;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};

/// Turns encoded bytes into RGBA8 pixels.
///
/// `mime_type` is the sniffed type; implementations may use it to route or
/// ignore it and detect the format themselves.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<RgbaImage>;
}

/// Default decoder backed by the crate's codec stack.
///
/// HEIC has no decoder here; inject one through [`Decoder`] if needed.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodecDecoder;

impl Decoder for CodecDecoder {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<RgbaImage> {
        ensure_dimensions_safe(bytes)?;
        let img = match mime_type {
            "image/jpeg" => decode_jpeg_mozjpeg(bytes)?,
            "image/webp" => decode_webp_libwebp(bytes)?,
            "image/heic" => {
                return Err(BitmapError::decode_failed(
                    "no HEIC decoder configured for this asset",
                ))
            }
            _ => decode_with_image_crate(bytes)?,
        };
        check_dimensions(img.width(), img.height())?;
        Ok(img.to_rgba8())
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(BitmapError::decode_failed("mozjpeg: missing JPEG EOI marker"));
        }

        let mut decompress = Decompress::new_mem(data)
            .map_err(|e| {
                BitmapError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
            })?
            .rgb()
            .map_err(|e| {
                BitmapError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
            })?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| BitmapError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| BitmapError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            BitmapError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb = RgbImage::from_raw(width, height, flat).ok_or_else(|| {
            BitmapError::decode_failed("mozjpeg: scanline data does not match dimensions")
        })?;
        Ok(DynamicImage::ImageRgb8(rgb))
    })
}

/// Decode WebP using libwebp. Animated WebP goes through the image crate.
pub fn decode_webp_libwebp(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        let features = BitstreamFeatures::new(data)
            .ok_or_else(|| BitmapError::decode_failed("webp: failed to read bitstream features"))?;

        if features.has_animation() {
            return image::load_from_memory(data).map_err(|e| {
                BitmapError::decode_failed(format!("webp (animated) decode failed: {e}"))
            });
        }
        check_dimensions(features.width(), features.height())?;

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| BitmapError::decode_failed("webp: decode failed"))?;
        Ok(decoded.to_image())
    })
}

pub fn decode_with_image_crate(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        image::load_from_memory(data).map_err(|e| BitmapError::decode_failed(e.to_string()))
    })
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(BitmapError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(BitmapError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Inspect the header and reject oversized images before allocating pixels.
/// Headers the image crate cannot parse are left for the decoder to reject.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    if let Ok(reader) = ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return check_dimensions(width, height);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| Rgb([x as u8, 0, 0]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |_, y| Rgb([0, y as u8, 200]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .unwrap();
        buffer
    }

    fn encode_webp(width: u32, height: u32) -> Vec<u8> {
        let rgb: Vec<u8> = std::iter::repeat([10u8, 20u8, 30u8])
            .take((width * height) as usize)
            .flatten()
            .collect();
        webp::Encoder::from_rgb(&rgb, width, height)
            .encode_lossless()
            .to_vec()
    }

    #[test]
    fn decodes_png_jpeg_and_webp_to_rgba() {
        let decoder = CodecDecoder;
        for (bytes, mime) in [
            (encode_png(7, 5), "image/png"),
            (encode_jpeg(16, 8), "image/jpeg"),
            (encode_webp(9, 3), "image/webp"),
        ] {
            let img = decoder.decode(&bytes, mime).unwrap();
            let (w, h) = img.dimensions();
            assert!(w > 0 && h > 0, "{mime}");
            assert_eq!(img.as_raw().len(), (w * h * 4) as usize);
        }
        assert_eq!(
            decoder.decode(&encode_png(7, 5), "image/png").unwrap().dimensions(),
            (7, 5)
        );
    }

    #[test]
    fn heic_is_a_decode_failure() {
        let err = CodecDecoder
            .decode(b"\x00\x00\x00\x18ftypheic", "image/heic")
            .unwrap_err();
        assert!(matches!(err, BitmapError::DecodeFailed { .. }));
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        let err = CodecDecoder.decode(&[1, 2, 3, 4, 5], "image/png").unwrap_err();
        assert!(matches!(err, BitmapError::DecodeFailed { .. }));
    }

    #[test]
    fn truncated_jpeg_is_rejected_before_libjpeg() {
        let mut jpeg = encode_jpeg(8, 8);
        jpeg.truncate(jpeg.len() - 2);
        assert!(decode_jpeg_mozjpeg(&jpeg).is_err());
    }

    #[test]
    fn check_dimensions_limits() {
        assert!(check_dimensions(100, 100).is_ok());
        assert!(matches!(
            check_dimensions(MAX_DIMENSION + 1, 1),
            Err(BitmapError::DimensionExceedsLimit { .. })
        ));
        assert!(matches!(
            check_dimensions(20_000, 20_000),
            Err(BitmapError::PixelCountExceedsLimit { .. })
        ));
    }

    #[test]
    fn ensure_dimensions_safe_rejects_large_header() {
        let mut png = encode_png(1, 1);
        // IHDR width is the big-endian u32 at offset 16.
        png[16..20].copy_from_slice(&(MAX_DIMENSION + 1).to_be_bytes());
        assert!(ensure_dimensions_safe(&png).is_err());
        assert!(ensure_dimensions_safe(&encode_png(4, 4)).is_ok());
    }
}
