// src/engine/optimizer.rs
//
// Size-budget search over quality and scale.
//
// Each attempt draws the image onto a pooled surface at the planned
// dimensions, encodes it, and compares the byte size against the limit.
// Over budget, one lever (quality or scale) moves toward its floor and the
// loop runs again. Attempts are strictly sequential: each encode decides the
// parameters of the next.
//
// **Termination**:
// - within the limit, or no limit configured
// - a minimum-dimension clamp or an explicit floor was hit while planning
// - both levers sit at their floors
// - an attempt came out larger than the one before it
// - `Tuning::max_attempts` encodes have run

use crate::engine::common::run_with_panic_policy;
use crate::engine::decoder::check_dimensions;
use crate::engine::encoder::Encoder;
use crate::engine::estimate::estimate_new_dimensions;
use crate::engine::metadata::ExifMap;
use crate::engine::pool::SurfacePool;
use crate::error::{BitmapError, Result};
use crate::ops::{Lever, OptimizationMode, OptimizationOptions, Preference};
use image::RgbaImage;
use std::sync::Arc;

/// Numeric constants of the search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    /// Fixed scale decrement when the estimator projects no shrink, and the
    /// damping applied to quality steps.
    pub iteration_factor: f64,
    /// Weight of the squared overshoot ratio in a quality step.
    pub prediction_factor: f64,
    pub default_quality_floor: f32,
    pub default_scale_floor: f64,
    pub max_attempts: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            iteration_factor: 0.025,
            prediction_factor: 0.275,
            default_quality_floor: 0.025,
            default_scale_floor: 0.025,
            max_attempts: 200,
        }
    }
}

/// What to encode on the first attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodeTarget<'a> {
    pub mime_type: &'a str,
    pub quality: f32,
    pub scale: f64,
    pub max_dimension: Option<u32>,
}

impl<'a> EncodeTarget<'a> {
    pub fn new(mime_type: &'a str, quality: f32) -> Self {
        Self {
            mime_type,
            quality,
            scale: 1.0,
            max_dimension: None,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = (max_dimension > 0).then_some(max_dimension);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationResult {
    pub encoded: Vec<u8>,
    /// Metadata snapshot with `ExifImageWidth`/`ExifImageHeight` set to
    /// `width`/`height`.
    pub exif: ExifMap,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub scale: f64,
    /// Encodes performed, including the returned one.
    pub attempts: usize,
    /// Lever reduced by the last step before the returned encode.
    pub last_operation: Lever,
    pub within_limit: bool,
}

impl OptimizationResult {
    pub fn size(&self) -> u64 {
        self.encoded.len() as u64
    }
}

#[derive(Clone, Copy, Debug)]
struct Attempt {
    quality: f32,
    scale: f64,
    last_op: Lever,
    last_size: Option<u64>,
}

#[derive(Clone, Copy, Debug)]
struct Floors {
    quality: f32,
    scale: f64,
}

#[derive(Clone, Copy, Debug)]
struct Plan {
    width: u32,
    height: u32,
    scale: f64,
    min_threshold_reached: bool,
}

struct Candidate {
    encoded: Vec<u8>,
    width: u32,
    height: u32,
    quality: f32,
    scale: f64,
    last_op: Lever,
}

pub struct OptimizationEngine {
    pool: Arc<SurfacePool>,
    encoder: Arc<dyn Encoder>,
    tuning: Tuning,
}

impl OptimizationEngine {
    pub fn new(pool: Arc<SurfacePool>, encoder: Arc<dyn Encoder>, tuning: Tuning) -> Self {
        Self {
            pool,
            encoder,
            tuning,
        }
    }

    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Encode `image`, shrinking quality and/or scale until the encoding fits
    /// `options.size_limit` or a floor is reached.
    ///
    /// A minimum dimension, quality or scale threshold ends the search with
    /// the current encoding, strict or not. When the levers bottom out, an
    /// encoding grows, or the attempt cap is hit, the smallest encoding seen
    /// is returned (or `SizeLimitUnachievable` when strict). That encoding
    /// may be older than the last attempt, so `attempts` can count past it.
    ///
    /// `metadata` is cloned; the caller's copy is never modified.
    pub fn optimize(
        &self,
        image: &RgbaImage,
        metadata: &ExifMap,
        target: EncodeTarget<'_>,
        options: &OptimizationOptions,
    ) -> Result<OptimizationResult> {
        if !(0.0..=1.0).contains(&target.quality) {
            return Err(BitmapError::invalid_quality(target.quality));
        }
        if !target.scale.is_finite() || target.scale <= 0.0 {
            return Err(BitmapError::invalid_resize_factor(target.scale));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(BitmapError::image_not_loaded());
        }

        let floors = self.floors(options, target.quality, target.scale);
        let limit = options.size_limit();
        let mut attempt = Attempt {
            quality: target.quality,
            scale: target.scale,
            last_op: Lever::None,
            last_size: None,
        };
        let mut best: Option<Candidate> = None;
        let mut attempts = 0usize;

        loop {
            let plan = self.plan(image, attempt, target.max_dimension, options)?;
            attempt.scale = plan.scale;

            let encoded = self.render(image, plan, target.mime_type, attempt.quality)?;
            attempts += 1;
            let size = encoded.len() as u64;
            tracing::debug!(
                attempt = attempts,
                quality = attempt.quality,
                scale = attempt.scale,
                width = plan.width,
                height = plan.height,
                size,
                limit,
                lever = ?attempt.last_op,
                "optimization attempt"
            );

            let candidate = Candidate {
                encoded,
                width: plan.width,
                height: plan.height,
                quality: attempt.quality,
                scale: attempt.scale,
                last_op: attempt.last_op,
            };

            let Some(limit) = limit.filter(|limit| size > *limit) else {
                return Ok(finish(candidate, metadata, attempts, true));
            };

            // A minimum threshold is a terminal floor, strict or not.
            if plan.min_threshold_reached {
                tracing::debug!(attempts, size, limit, "minimum threshold reached");
                return Ok(finish(candidate, metadata, attempts, false));
            }

            let regressed = attempt.last_size.is_some_and(|previous| size > previous);
            if best.as_ref().map_or(true, |b| size < b.encoded.len() as u64) {
                best = Some(candidate);
            }

            let next = if regressed || attempts >= self.tuning.max_attempts {
                None
            } else {
                self.step(attempt, options.mode, floors, size, limit, plan)?
            };

            match next {
                Some(next) => attempt = next,
                None => {
                    let Some(best) = best else {
                        return Err(BitmapError::internal_panic(
                            "optimization reached a floor without any encoding",
                        ));
                    };
                    let best_size = best.encoded.len() as u64;
                    tracing::debug!(
                        attempts,
                        size = best_size,
                        limit,
                        regressed,
                        "optimization floor reached"
                    );
                    if options.strict {
                        return Err(BitmapError::size_limit_unachievable(best_size, limit));
                    }
                    return Ok(finish(best, metadata, attempts, false));
                }
            }
        }
    }

    fn floors(&self, options: &OptimizationOptions, quality: f32, scale: f64) -> Floors {
        let mut floors = Floors {
            quality: options
                .min_quality()
                .filter(|q| *q > 0.0)
                .unwrap_or(self.tuning.default_quality_floor),
            scale: options
                .min_scale()
                .filter(|s| *s > 0.0)
                .unwrap_or(self.tuning.default_scale_floor),
        };
        match options.mode {
            OptimizationMode::RetainSize => floors.scale = scale.max(1.0),
            OptimizationMode::RetainQuality => floors.quality = quality.max(1.0),
            _ => {}
        }
        floors
    }

    fn plan(
        &self,
        image: &RgbaImage,
        attempt: Attempt,
        max_dimension: Option<u32>,
        options: &OptimizationOptions,
    ) -> Result<Plan> {
        let (source_w, source_h) = (image.width() as f64, image.height() as f64);
        let requested = attempt.scale;
        let mut width = source_w * requested;
        let mut height = source_h * requested;

        // The minimum is judged against the requested scale; the maximum
        // is applied last and always wins.
        let mut min_threshold_reached = false;
        if requested < 1.0 {
            if let Some(min) = options.min_dimension() {
                if width < min || height < min {
                    let ratio = (min / width).max(min / height).min(1.0 / requested);
                    width *= ratio;
                    height *= ratio;
                    min_threshold_reached = true;
                }
            }
        }

        if options.min_quality().is_some_and(|q| attempt.quality < q)
            || options.min_scale().is_some_and(|s| requested < s)
        {
            min_threshold_reached = true;
        }

        if let Some(max) = max_dimension.map(f64::from) {
            if width > max || height > max {
                let ratio = (max / width).min(max / height);
                width *= ratio;
                height *= ratio;
            }
        }

        let scale = width / source_w;

        if !scale.is_finite() || scale <= 0.0 {
            return Err(BitmapError::invalid_resize_factor(scale));
        }
        let width = width.round().max(1.0) as u32;
        let height = height.round().max(1.0) as u32;
        check_dimensions(width, height)?;

        Ok(Plan {
            width,
            height,
            scale,
            min_threshold_reached,
        })
    }

    fn render(&self, image: &RgbaImage, plan: Plan, mime_type: &str, quality: f32) -> Result<Vec<u8>> {
        let mut surface = self.pool.acquire();
        surface.draw(image, plan.width, plan.height)?;
        let encoded = run_with_panic_policy("encode", || {
            self.encoder
                .encode(surface.pixels(), plan.width, plan.height, mime_type, quality)
        })?;
        if encoded.is_empty() {
            return Err(BitmapError::encode_failed(
                mime_type.to_string(),
                "encoder returned no data",
            ));
        }
        Ok(encoded)
    }

    /// Parameters for the next attempt, or `None` when both levers are at
    /// their floors.
    fn step(
        &self,
        attempt: Attempt,
        mode: OptimizationMode,
        floors: Floors,
        size: u64,
        limit: u64,
        plan: Plan,
    ) -> Result<Option<Attempt>> {
        let preference = match mode {
            OptimizationMode::RetainSize | OptimizationMode::PreferSize => Preference::PreferSize,
            OptimizationMode::RetainQuality | OptimizationMode::PreferQuality => {
                Preference::PreferQuality
            }
            OptimizationMode::AlternatingPreference => match attempt.last_op {
                Lever::Quality => Preference::PreferQuality,
                Lever::Scale | Lever::None => Preference::PreferSize,
            },
        };

        let can_scale = attempt.scale > floors.scale;
        let can_quality = attempt.quality > floors.quality;
        let lever = match (preference, can_scale, can_quality) {
            (_, false, false) => return Ok(None),
            (Preference::PreferQuality, true, _) | (Preference::PreferSize, true, false) => {
                Lever::Scale
            }
            (Preference::PreferSize, _, true) | (Preference::PreferQuality, false, true) => {
                Lever::Quality
            }
        };

        let mut next = Attempt {
            last_op: lever,
            last_size: Some(size),
            ..attempt
        };
        match lever {
            Lever::Scale => {
                let (new_width, _) =
                    estimate_new_dimensions(size, limit, plan.width as f64, plan.height as f64);
                let mut scale = attempt.scale * (new_width / plan.width as f64);
                if !(scale < attempt.scale) {
                    scale = attempt.scale - self.tuning.iteration_factor;
                }
                next.scale = scale.max(floors.scale);
                if next.scale <= 0.0 {
                    return Err(BitmapError::invalid_resize_factor(next.scale));
                }
            }
            Lever::Quality => {
                let ratio = size as f64 / limit as f64;
                let delta = ratio * ratio * self.tuning.prediction_factor * self.tuning.iteration_factor;
                next.quality = ((attempt.quality as f64 - delta) as f32).max(floors.quality);
            }
            Lever::None => return Ok(None),
        }
        Ok(Some(next))
    }
}

fn finish(
    candidate: Candidate,
    metadata: &ExifMap,
    attempts: usize,
    within_limit: bool,
) -> OptimizationResult {
    let mut exif = metadata.clone();
    exif.set_image_dimensions(candidate.width, candidate.height);
    OptimizationResult {
        encoded: candidate.encoded,
        exif,
        width: candidate.width,
        height: candidate.height,
        quality: candidate.quality,
        scale: candidate.scale,
        attempts,
        last_operation: candidate.last_op,
        within_limit,
    }
}
