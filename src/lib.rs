// lib.rs
//
// lazy-bitmap: byte-budget image optimization
//
// Design goals:
// - Load from bytes, files or data: URIs and classify by magic bytes
// - Re-encode under a quality/scale policy until a size limit is met
// - Reuse drawing surfaces across back-to-back optimizations
// - Codecs, decoders and metadata readers are swappable capabilities
//
// Logging goes through `tracing`; install a subscriber in the host to see it.

pub mod bitmap;
pub mod engine;
pub mod error;
pub mod ops;

pub use bitmap::{
    AssetContext, AssetState, BitmapAsset, BitmapSignature, DestroyedReceiver, LoadOptions,
    DEFAULT_LOAD_QUALITY,
};
pub use engine::{
    detect_mime_type, extension_for_mime, EncodeTarget, ExifMap, OptimizationEngine,
    OptimizationResult, PoolConfig, Source, SurfacePool, Tuning,
};
pub use error::{AssetError, BitmapError, ErrorCategory, Result};
pub use ops::{Lever, OptimizationMode, OptimizationOptions, Preference};
