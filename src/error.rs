// src/error.rs
//
// Unified error handling for lazy-bitmap
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input, recoverable
// - CodecError: Format/encoding issues
// - ResourceLimit: Size budget/dimension limits, I/O
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Error taxonomy for callers that want to branch on the kind of failure
/// without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Size budget, dimension and I/O limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the LAZY_BITMAP_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "LAZY_BITMAP_USER_ERROR",
            ErrorCategory::CodecError => "LAZY_BITMAP_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "LAZY_BITMAP_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "LAZY_BITMAP_INTERNAL_BUG",
        }
    }
}

/// lazy-bitmap error types
#[derive(Debug, Error)]
pub enum BitmapError {
    // Source Errors
    #[error("No valid source provided")]
    NoSource,

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Lifecycle Errors
    #[error("Image not loaded")]
    ImageNotLoaded,

    #[error("A load is already in progress for this bitmap")]
    LoadInProgress,

    // Decode Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to read image metadata: {message}")]
    MetadataReadFailed { message: Cow<'static, str> },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Optimization Errors
    #[error("Invalid quality {quality}: expected a value within [0, 1]")]
    InvalidQuality { quality: f32 },

    #[error("Invalid resize factor reached ({factor} <= 0)")]
    InvalidResizeFactor { factor: f64 },

    #[error("The requested image optimization cannot be achieved: {size} bytes at the floor, limit is {limit} bytes")]
    SizeLimitUnachievable { size: u64, limit: u64 },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for BitmapError {
    fn clone(&self) -> Self {
        match self {
            Self::NoSource => Self::NoSource,
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::ImageNotLoaded => Self::ImageNotLoaded,
            Self::LoadInProgress => Self::LoadInProgress,
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::MetadataReadFailed { message } => Self::MetadataReadFailed {
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::InvalidQuality { quality } => Self::InvalidQuality { quality: *quality },
            Self::InvalidResizeFactor { factor } => Self::InvalidResizeFactor { factor: *factor },
            Self::SizeLimitUnachievable { size, limit } => Self::SizeLimitUnachievable {
                size: *size,
                limit: *limit,
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl BitmapError {
    pub fn no_source() -> Self {
        Self::NoSource
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn image_not_loaded() -> Self {
        Self::ImageNotLoaded
    }

    pub fn load_in_progress() -> Self {
        Self::LoadInProgress
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn metadata_read_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::MetadataReadFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_quality(quality: f32) -> Self {
        Self::InvalidQuality { quality }
    }

    pub fn invalid_resize_factor(factor: f64) -> Self {
        Self::InvalidResizeFactor { factor }
    }

    pub fn size_limit_unachievable(size: u64, limit: u64) -> Self {
        Self::SizeLimitUnachievable { size, limit }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable,
    /// CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoSource
            | Self::ImageNotLoaded
            | Self::LoadInProgress
            | Self::InvalidQuality { .. }
            | Self::InvalidResizeFactor { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::UserError,

            Self::DecodeFailed { .. }
            | Self::MetadataReadFailed { .. }
            | Self::EncodeFailed { .. } => ErrorCategory::CodecError,

            // SizeLimitUnachievable is a budget the caller can relax (raise the
            // limit, lower the floors, or drop strict mode).
            Self::SizeLimitUnachievable { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileReadFailed { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

/// A failure surfaced by a [`BitmapAsset`](crate::bitmap::BitmapAsset) operation,
/// tagged with the identity of the asset that produced it.
#[derive(Debug, Clone)]
pub struct AssetError {
    source_descriptor: String,
    revision: u64,
    error: BitmapError,
}

impl AssetError {
    pub fn new(source_descriptor: impl Into<String>, revision: u64, error: BitmapError) -> Self {
        Self {
            source_descriptor: source_descriptor.into(),
            revision,
            error,
        }
    }

    /// The underlying failure.
    pub fn kind(&self) -> &BitmapError {
        &self.error
    }

    pub fn into_kind(self) -> BitmapError {
        self.error
    }

    pub fn source_descriptor(&self) -> &str {
        &self.source_descriptor
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (rev {}): {}",
            self.source_descriptor, self.revision, self.error
        )
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, BitmapError>;
