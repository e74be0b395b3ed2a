// src/ops.rs
//
// Optimization policy values.
// These are cheap to create and copy - the expensive work happens in the engine.

use crate::error::BitmapError;
use std::fmt;
use std::str::FromStr;

/// How the engine trades quality against scale when an encode exceeds the
/// size limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizationMode {
    /// Never shrink the image; only the quality lever moves.
    RetainSize,
    /// Never degrade quality; only the scale lever moves.
    RetainQuality,
    /// Reduce quality first, then scale.
    #[default]
    PreferSize,
    /// Reduce scale first, then quality.
    PreferQuality,
    /// Flip between the two levers on every attempt.
    AlternatingPreference,
}

impl OptimizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetainSize => "retain-size",
            Self::RetainQuality => "retain-quality",
            Self::PreferSize => "prefer-size",
            Self::PreferQuality => "prefer-quality",
            Self::AlternatingPreference => "alternating-preference",
        }
    }
}

impl FromStr for OptimizationMode {
    type Err = BitmapError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "retain-size" => Ok(Self::RetainSize),
            "retain-quality" => Ok(Self::RetainQuality),
            "prefer-size" => Ok(Self::PreferSize),
            "prefer-quality" => Ok(Self::PreferQuality),
            "alternating-preference" => Ok(Self::AlternatingPreference),
            other => Err(BitmapError::invalid_argument(
                "mode",
                other.to_string(),
                "Expected retain-size, retain-quality, prefer-size, prefer-quality or alternating-preference",
            )),
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lever an optimization attempt pulled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lever {
    Quality,
    Scale,
    None,
}

/// Which lever is tried first in a given attempt.
///
/// `PreferQuality` protects quality, so it shrinks scale first;
/// `PreferSize` protects dimensions, so it lowers quality first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preference {
    PreferQuality,
    PreferSize,
}

/// Size-budget policy for one optimize call.
///
/// Non-positive or non-finite limits are treated as absent. Floors are
/// clamped into `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OptimizationOptions {
    pub size_limit: Option<u64>,
    pub min_dimension: Option<f64>,
    pub min_scale: Option<f64>,
    pub min_quality: Option<f32>,
    pub mode: OptimizationMode,
    pub strict: bool,
}

impl OptimizationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size_limit(mut self, bytes: u64) -> Self {
        self.size_limit = (bytes > 0).then_some(bytes);
        self
    }

    pub fn with_min_dimension(mut self, px: f64) -> Self {
        self.min_dimension = (px.is_finite() && px > 0.0).then_some(px);
        self
    }

    pub fn with_min_scale(mut self, scale: f64) -> Self {
        self.min_scale = scale.is_finite().then(|| scale.clamp(0.0, 1.0));
        self
    }

    pub fn with_min_quality(mut self, quality: f32) -> Self {
        self.min_quality = quality.is_finite().then(|| quality.clamp(0.0, 1.0));
        self
    }

    pub fn with_mode(mut self, mode: OptimizationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub(crate) fn size_limit(&self) -> Option<u64> {
        self.size_limit.filter(|limit| *limit > 0)
    }

    pub(crate) fn min_dimension(&self) -> Option<f64> {
        self.min_dimension.filter(|px| px.is_finite() && *px > 0.0)
    }

    pub(crate) fn min_scale(&self) -> Option<f64> {
        self.min_scale
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s.min(1.0))
    }

    pub(crate) fn min_quality(&self) -> Option<f32> {
        self.min_quality
            .filter(|q| q.is_finite() && *q >= 0.0)
            .map(|q| q.min(1.0))
    }
}
