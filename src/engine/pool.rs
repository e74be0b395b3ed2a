// src/engine/pool.rs
//
// Reusable rendering surfaces.
//
// Every optimize attempt needs one offscreen RGBA surface to draw the scaled
// image into before encoding. Surfaces are borrowed from a bounded pool and
// handed back through `SurfaceGuard`'s Drop, so a surface returns to the idle
// set on every exit path, including `?` propagation out of the encoder.
//
// **Sizing**:
// - A surface is allocated (in batches of `PoolConfig::batch_size`) only when
//   the idle set is empty
// - Released surfaces keep their buffer capacity; dimensions and pixels are
//   reset
// - `trim(floor)` drops idle surfaces above `floor`; checked-out surfaces are
//   never touched

use crate::engine::decoder::check_dimensions;
use crate::error::{BitmapError, Result};
use fast_image_resize::{self as fir, PixelType, ResizeOptions};
use image::{imageops::FilterType, RgbaImage};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Bytes per pixel on every surface (RGBA8).
pub const SURFACE_BPP: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Surfaces minted per allocation when the idle set is empty.
    pub batch_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { batch_size: 1 }
    }
}

impl PoolConfig {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

/// An offscreen RGBA8 drawing buffer.
#[derive(Debug, Default)]
pub struct Surface {
    id: u64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// True when the surface has no dimensions and no pixel data.
    pub fn is_blank(&self) -> bool {
        self.width == 0 && self.height == 0 && self.pixels.is_empty()
    }

    /// Resize the surface and clear it to transparent black.
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> Result<()> {
        check_dimensions(width, height)?;
        let len = width as usize * height as usize * SURFACE_BPP;
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(len, 0);
        Ok(())
    }

    /// Draw `image` scaled to fill a `width` x `height` surface.
    pub fn draw(&mut self, image: &RgbaImage, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
            return Err(BitmapError::invalid_argument(
                "surface",
                format!("{}x{} -> {width}x{height}", image.width(), image.height()),
                "Surface and source dimensions must be positive",
            ));
        }
        self.set_dimensions(width, height)?;

        if image.dimensions() == (width, height) {
            self.pixels.copy_from_slice(image.as_raw());
            return Ok(());
        }

        if let Err(reason) = self.draw_with_fir(image) {
            tracing::debug!(%reason, "fir resize failed, using image crate fallback");
            let resized = image::imageops::resize(image, width, height, FilterType::Lanczos3);
            self.pixels.copy_from_slice(resized.as_raw());
        }
        Ok(())
    }

    fn draw_with_fir(&mut self, image: &RgbaImage) -> std::result::Result<(), String> {
        let src = fir::images::ImageRef::new(
            image.width(),
            image.height(),
            image.as_raw(),
            PixelType::U8x4,
        )
        .map_err(|e| format!("fir source image error: {e:?}"))?;
        let mut dst = fir::images::Image::from_slice_u8(
            self.width,
            self.height,
            self.pixels.as_mut_slice(),
            PixelType::U8x4,
        )
        .map_err(|e| format!("fir destination image error: {e:?}"))?;

        let options =
            ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
        fir::Resizer::new()
            .resize(&src, &mut dst, &options)
            .map_err(|e| format!("fir resize error: {e:?}"))
    }

    fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels.clear();
    }
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<Surface>,
    in_use: usize,
    minted: u64,
}

/// Bounded pool of reusable [`Surface`]s, shareable across pipelines.
#[derive(Debug)]
pub struct SurfacePool {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl Default for SurfacePool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl SurfacePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config: PoolConfig::with_batch_size(config.batch_size),
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn shared(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Check out an idle surface, allocating a batch if none is idle.
    pub fn acquire(self: &Arc<Self>) -> SurfaceGuard {
        let mut state = self.state.lock();
        if state.idle.is_empty() {
            for _ in 0..self.config.batch_size {
                let id = state.minted;
                state.minted += 1;
                state.idle.push(Surface::new(id));
            }
            tracing::trace!(
                batch = self.config.batch_size,
                total = state.minted,
                "allocated surfaces"
            );
        }
        // Non-empty: a batch of at least one was just pushed.
        let surface = state.idle.pop().unwrap_or_default();
        state.in_use += 1;
        SurfaceGuard {
            pool: Arc::clone(self),
            surface,
        }
    }

    /// Return a surface to the idle set. Equivalent to dropping the guard.
    pub fn release(&self, guard: SurfaceGuard) {
        drop(guard);
    }

    fn give_back(&self, mut surface: Surface) {
        surface.reset();
        let mut state = self.state.lock();
        state.in_use = state.in_use.saturating_sub(1);
        state.idle.push(surface);
    }

    /// Surfaces owned by the pool: checked out plus idle.
    pub fn count(&self) -> usize {
        let state = self.state.lock();
        state.in_use + state.idle.len()
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.state.lock().in_use
    }

    /// Drop idle surfaces until at most `floor` remain idle. Returns how many
    /// were removed.
    pub fn trim(&self, floor: usize) -> usize {
        let mut state = self.state.lock();
        let excess = state.idle.len().saturating_sub(floor);
        if excess > 0 {
            let keep = state.idle.len() - excess;
            state.idle.truncate(keep);
            state.idle.shrink_to_fit();
            tracing::trace!(removed = excess, idle = keep, "trimmed surface pool");
        }
        excess
    }

    /// Trim down to one allocation batch.
    pub fn reduce(&self) -> usize {
        self.trim(self.config.batch_size)
    }
}

/// Exclusive access to a pooled surface; returns it to the pool on drop.
#[derive(Debug)]
pub struct SurfaceGuard {
    pool: Arc<SurfacePool>,
    surface: Surface,
}

impl SurfaceGuard {
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for SurfaceGuard {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        &self.surface
    }
}

impl DerefMut for SurfaceGuard {
    fn deref_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        let surface = std::mem::take(&mut self.surface);
        self.pool.give_back(surface);
    }
}
