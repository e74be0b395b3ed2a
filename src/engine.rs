// src/engine.rs
//
// The core of lazy-bitmap:
// 1. Sniff the format of an opaque byte source
// 2. Decode it through an injected Decoder capability
// 3. Re-encode on pooled surfaces until a byte budget is met
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
mod decoder;
mod encoder;
mod estimate;
mod io;
mod metadata;
mod optimizer;
mod pool;
mod sniff;

pub use common::run_with_panic_policy;
pub use decoder::{
    check_dimensions, decode_jpeg_mozjpeg, decode_webp_libwebp, decode_with_image_crate,
    ensure_dimensions_safe, CodecDecoder, Decoder,
};
pub use encoder::{encode_jpeg, encode_webp, CodecEncoder, Encoder, QualitySettings};
pub use estimate::estimate_new_dimensions;
pub use io::Source;
pub use metadata::{
    normalized_rotation, ExifMap, ExifMetadataReader, MetadataReader, DEFAULT_ORIENTATION,
    EXIF_IMAGE_HEIGHT, EXIF_IMAGE_WIDTH,
};
pub use optimizer::{EncodeTarget, OptimizationEngine, OptimizationResult, Tuning};
pub use pool::{PoolConfig, Surface, SurfaceGuard, SurfacePool, SURFACE_BPP};
pub use sniff::{detect_mime_type, extension_for_mime, UNKNOWN_MIME};
