// src/bitmap.rs
//
// BitmapAsset: the owning entity for one image.
//
// Lifecycle: Empty -> Loading -> Loaded -> Destroyed, with Loaded -> Destroyed
// also reachable through the expiry clock. All state lives behind one mutex
// so the clock thread and the owner see the same transitions.
//
// Decoding, metadata extraction and the probe encode run outside the lock.
// A load re-acquires the lock to commit and discards its work if the asset
// was destroyed or reset in the meantime (tracked by `generation`).

mod clock;

pub use clock::{CancelToken, ExpiryClock};

use crate::engine::{
    check_dimensions, detect_mime_type, normalized_rotation, run_with_panic_policy, CodecDecoder,
    CodecEncoder, Decoder, EncodeTarget, Encoder, ExifMap, ExifMetadataReader, MetadataReader,
    OptimizationEngine, OptimizationResult, PoolConfig, Source, SurfacePool, Tuning,
    DEFAULT_ORIENTATION, UNKNOWN_MIME,
};
use crate::error::{AssetError, BitmapError, Result};
use crate::ops::OptimizationOptions;
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Probe-encode quality used when a load is not full quality.
pub const DEFAULT_LOAD_QUALITY: f32 = 0.92;

/// Lossless type used for the probe encode when the source type has no
/// encoder.
const PROBE_FALLBACK_MIME: &str = "image/png";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetState {
    Empty,
    Loading,
    Loaded,
    Destroyed,
}

/// Snapshot emitted once on a non-silent destroy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmapSignature {
    pub source: String,
    pub revision: u64,
    pub resolution: String,
    pub loaded: bool,
    pub pixel_count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Probe-encode at quality 1.0 instead of [`DEFAULT_LOAD_QUALITY`].
    pub full_quality: bool,
}

/// Capabilities and shared resources an asset works with.
///
/// Clone a context to share its surface pool between assets.
#[derive(Clone)]
pub struct AssetContext {
    pub pool: Arc<SurfacePool>,
    pub decoder: Arc<dyn Decoder>,
    pub encoder: Arc<dyn Encoder>,
    pub metadata: Arc<dyn MetadataReader>,
    pub tuning: Tuning,
}

impl Default for AssetContext {
    fn default() -> Self {
        Self {
            pool: SurfacePool::shared(PoolConfig::default()),
            decoder: Arc::new(CodecDecoder),
            encoder: Arc::new(CodecEncoder),
            metadata: Arc::new(ExifMetadataReader),
            tuning: Tuning::default(),
        }
    }
}

impl AssetContext {
    pub fn with_pool(mut self, pool: Arc<SurfacePool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_metadata_reader(mut self, metadata: Arc<dyn MetadataReader>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }
}

/// Receiving end of an asset's destroy notification.
///
/// Yields at most one [`BitmapSignature`]. A receiver obtained after the
/// channel closed yields nothing.
#[derive(Debug)]
pub struct DestroyedReceiver(mpsc::Receiver<BitmapSignature>);

impl DestroyedReceiver {
    fn closed() -> Self {
        let (_, rx) = mpsc::channel();
        Self(rx)
    }

    /// Block until the notification arrives or the channel closes.
    pub fn recv(&self) -> Option<BitmapSignature> {
        self.0.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<BitmapSignature> {
        self.0.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<BitmapSignature> {
        self.0.try_recv().ok()
    }
}

struct Decoded {
    mime_type: String,
    orientation: u16,
    image: Arc<RgbaImage>,
    exif: ExifMap,
    file_size: u64,
    initial_file_size: u64,
}

struct AssetInner {
    source: Source,
    resolution: String,
    revision: u64,
    ttl: Duration,
    state: AssetState,
    loaded_at: Option<Instant>,
    mime_type: String,
    orientation: u16,
    width: u32,
    height: u32,
    file_size: u64,
    initial_file_size: u64,
    exif: ExifMap,
    image: Option<Arc<RgbaImage>>,
    clock: Option<ExpiryClock>,
    /// `None` once the destroy notification has been sent.
    subscribers: Option<Vec<mpsc::Sender<BitmapSignature>>>,
    generation: u64,
}

impl AssetInner {
    fn new(source: Source) -> Self {
        Self {
            source,
            resolution: String::new(),
            revision: 0,
            ttl: Duration::ZERO,
            state: AssetState::Empty,
            loaded_at: None,
            mime_type: UNKNOWN_MIME.to_string(),
            orientation: DEFAULT_ORIENTATION,
            width: 0,
            height: 0,
            file_size: 0,
            initial_file_size: 0,
            exif: ExifMap::new(),
            image: None,
            clock: None,
            subscribers: Some(Vec::new()),
            generation: 0,
        }
    }

    fn error(&self, error: BitmapError) -> AssetError {
        AssetError::new(self.source.describe(), self.revision, error)
    }

    fn signature(&self) -> BitmapSignature {
        BitmapSignature {
            source: self.source.describe(),
            revision: self.revision,
            resolution: self.resolution.clone(),
            loaded: self.state == AssetState::Loaded,
            pixel_count: self.pixel_count(),
        }
    }

    fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn cancel_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
    }

    /// Drop everything derived from the source. Source, identity, TTL and
    /// the notification channel are kept.
    fn release(&mut self) {
        self.cancel_clock();
        self.generation += 1;
        self.loaded_at = None;
        self.mime_type = UNKNOWN_MIME.to_string();
        self.orientation = DEFAULT_ORIENTATION;
        self.width = 0;
        self.height = 0;
        self.file_size = 0;
        self.initial_file_size = 0;
        self.exif = ExifMap::new();
        self.image = None;
    }

    fn destroy(&mut self, silent: bool) {
        let snapshot = self.signature();
        let was = self.state;
        self.release();
        self.state = AssetState::Destroyed;

        if !silent {
            if let Some(subscribers) = self.subscribers.take() {
                for subscriber in subscribers {
                    // A dropped receiver is not an error.
                    let _ = subscriber.send(snapshot.clone());
                }
            }
        }
        tracing::debug!(
            source = %snapshot.source,
            revision = snapshot.revision,
            from = ?was,
            silent,
            "bitmap destroyed"
        );
    }

    fn commit(&mut self, decoded: Decoded) {
        self.mime_type = decoded.mime_type;
        self.orientation = decoded.orientation;
        self.width = decoded.image.width();
        self.height = decoded.image.height();
        self.file_size = decoded.file_size;
        self.initial_file_size = decoded.initial_file_size;
        self.exif = decoded.exif;
        self.image = Some(decoded.image);
        self.loaded_at = Some(Instant::now());
        self.state = AssetState::Loaded;
        if self.subscribers.is_none() {
            self.subscribers = Some(Vec::new());
        }
    }
}

/// Arm (or re-arm) the expiry clock for the current load.
fn arm_clock(shared: &Arc<Mutex<AssetInner>>, inner: &mut AssetInner) -> Result<()> {
    inner.cancel_clock();
    if inner.ttl.is_zero() || inner.state != AssetState::Loaded {
        return Ok(());
    }
    let weak = Arc::downgrade(shared);
    let generation = inner.generation;
    inner.clock = Some(ExpiryClock::arm(inner.ttl, move |token| {
        on_expired(&weak, generation, token)
    })?);
    Ok(())
}

fn on_expired(shared: &Weak<Mutex<AssetInner>>, generation: u64, token: &CancelToken) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut inner = shared.lock();
    // Only the load that armed this clock may be destroyed by it.
    if token.is_cancelled() || inner.generation != generation || inner.state != AssetState::Loaded
    {
        return;
    }
    tracing::debug!(ttl = ?inner.ttl, revision = inner.revision, "bitmap expired");
    inner.destroy(false);
}

/// An image loaded from a [`Source`], optimizable against a byte budget.
pub struct BitmapAsset {
    shared: Arc<Mutex<AssetInner>>,
    context: AssetContext,
    engine: OptimizationEngine,
}

impl BitmapAsset {
    pub fn new(source: impl Into<Source>) -> Self {
        Self::with_context(source, AssetContext::default())
    }

    pub fn with_context(source: impl Into<Source>, context: AssetContext) -> Self {
        let engine = OptimizationEngine::new(
            Arc::clone(&context.pool),
            Arc::clone(&context.encoder),
            context.tuning,
        );
        Self {
            shared: Arc::new(Mutex::new(AssetInner::new(source.into()))),
            context,
            engine,
        }
    }

    pub fn with_resolution(self, resolution: impl Into<String>) -> Self {
        self.shared.lock().resolution = resolution.into();
        self
    }

    pub fn with_revision(self, revision: u64) -> Self {
        self.shared.lock().revision = revision;
        self
    }

    /// Time to live after a load. Zero disables expiry.
    pub fn with_ttl(self, ttl: Duration) -> Self {
        self.shared.lock().ttl = ttl;
        self
    }

    pub fn context(&self) -> &AssetContext {
        &self.context
    }

    /// Replace the source. Everything loaded from the old one is released
    /// silently; the notification channel stays open.
    pub fn set_source(&self, source: impl Into<Source>) {
        let mut inner = self.shared.lock();
        inner.release();
        inner.state = AssetState::Empty;
        inner.source = source.into();
    }

    pub fn load(&self) -> std::result::Result<(), AssetError> {
        self.load_with(LoadOptions::default())
    }

    /// Decode the source and capture its dimensions, type, orientation and
    /// encoded size. Reloading a loaded asset releases it silently first.
    pub fn load_with(&self, options: LoadOptions) -> std::result::Result<(), AssetError> {
        let (source, generation) = {
            let mut inner = self.shared.lock();
            if inner.state == AssetState::Loading {
                return Err(inner.error(BitmapError::load_in_progress()));
            }
            if inner.source.is_empty() {
                return Err(inner.error(BitmapError::no_source()));
            }
            inner.release();
            inner.state = AssetState::Loading;
            (inner.source.clone(), inner.generation)
        };

        let outcome = self.decode(&source, options);

        let mut inner = self.shared.lock();
        if inner.generation != generation || inner.state != AssetState::Loading {
            tracing::debug!(source = %source.describe(), "load superseded");
            return Err(inner.error(BitmapError::image_not_loaded()));
        }
        match outcome {
            Ok(decoded) => {
                inner.commit(decoded);
                if let Err(error) = arm_clock(&self.shared, &mut inner) {
                    inner.release();
                    inner.state = AssetState::Empty;
                    return Err(inner.error(error));
                }
                tracing::debug!(
                    source = %inner.source.describe(),
                    mime = %inner.mime_type,
                    width = inner.width,
                    height = inner.height,
                    file_size = inner.file_size,
                    "bitmap loaded"
                );
                Ok(())
            }
            Err(error) => {
                inner.state = AssetState::Empty;
                Err(inner.error(error))
            }
        }
    }

    fn decode(&self, source: &Source, options: LoadOptions) -> Result<Decoded> {
        let bytes = source.load()?;

        let fallback = source.declared_mime().unwrap_or(UNKNOWN_MIME);
        let mut mime_type = detect_mime_type(&bytes, fallback).to_string();
        if mime_type == UNKNOWN_MIME {
            if let Ok(format) = image::guess_format(&bytes) {
                mime_type = format.to_mime_type().to_string();
            }
        }
        if mime_type == UNKNOWN_MIME {
            return Err(BitmapError::decode_failed("unrecognized image format"));
        }

        let decoder = &self.context.decoder;
        let image = run_with_panic_policy("decode", || decoder.decode(&bytes, &mime_type))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(BitmapError::decode_failed("decoded image has no pixels"));
        }
        check_dimensions(image.width(), image.height())?;

        let orientation = match self.context.metadata.read_orientation(&bytes) {
            Ok(orientation) if (1..=8).contains(&orientation) => orientation,
            Ok(orientation) => {
                tracing::warn!(orientation, "ignoring out-of-range orientation");
                DEFAULT_ORIENTATION
            }
            Err(error) => {
                tracing::warn!(%error, "failed to read orientation, assuming 1");
                DEFAULT_ORIENTATION
            }
        };
        let exif = self
            .context
            .metadata
            .read_metadata(&bytes)
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "failed to read exif metadata");
                ExifMap::new()
            });

        let probe_mime = if self.context.encoder.is_mime_type_supported(&mime_type) {
            mime_type.as_str()
        } else {
            PROBE_FALLBACK_MIME
        };
        let probe_quality = if options.full_quality {
            1.0
        } else {
            DEFAULT_LOAD_QUALITY
        };
        let probe = self.engine.optimize(
            &image,
            &exif,
            EncodeTarget::new(probe_mime, probe_quality),
            &OptimizationOptions::default(),
        )?;

        Ok(Decoded {
            mime_type,
            orientation,
            image: Arc::new(image),
            exif,
            file_size: probe.size(),
            initial_file_size: bytes.len() as u64,
        })
    }

    /// Encode the loaded image under `options`. Does not change state.
    pub fn optimize(
        &self,
        target: EncodeTarget<'_>,
        options: &OptimizationOptions,
    ) -> std::result::Result<OptimizationResult, AssetError> {
        let (image, exif, descriptor, revision) = {
            let inner = self.shared.lock();
            match (&inner.image, inner.state) {
                (Some(image), AssetState::Loaded) => (
                    Arc::clone(image),
                    inner.exif.clone(),
                    inner.source.describe(),
                    inner.revision,
                ),
                _ => return Err(inner.error(BitmapError::image_not_loaded())),
            }
        };
        self.engine
            .optimize(&image, &exif, target, options)
            .map_err(|e| AssetError::new(descriptor, revision, e))
    }

    /// Release the image and cancel the expiry clock. Unless `silent`, the
    /// pre-destruction snapshot goes to every subscriber and the channel
    /// closes. Safe to call repeatedly.
    pub fn destroy(&self, silent: bool) {
        self.shared.lock().destroy(silent);
    }

    /// Subscribe to the destroy notification.
    pub fn destroyed(&self) -> DestroyedReceiver {
        let mut inner = self.shared.lock();
        match inner.subscribers.as_mut() {
            Some(subscribers) => {
                let (tx, rx) = mpsc::channel();
                subscribers.push(tx);
                DestroyedReceiver(rx)
            }
            None => DestroyedReceiver::closed(),
        }
    }

    /// Change the time to live. A loaded asset restarts its clock.
    pub fn set_ttl(&self, ttl: Duration) -> std::result::Result<(), AssetError> {
        let mut inner = self.shared.lock();
        inner.ttl = ttl;
        arm_clock(&self.shared, &mut inner).map_err(|e| inner.error(e))
    }

    pub fn ttl(&self) -> Duration {
        self.shared.lock().ttl
    }

    /// Time since the last successful load; zero when not loaded.
    pub fn life(&self) -> Duration {
        self.shared
            .lock()
            .loaded_at
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }

    pub fn state(&self) -> AssetState {
        self.shared.lock().state
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == AssetState::Loaded
    }

    pub fn source(&self) -> Source {
        self.shared.lock().source.clone()
    }

    pub fn resolution(&self) -> String {
        self.shared.lock().resolution.clone()
    }

    pub fn revision(&self) -> u64 {
        self.shared.lock().revision
    }

    pub fn mime_type(&self) -> String {
        self.shared.lock().mime_type.clone()
    }

    /// EXIF orientation, 1..=8.
    pub fn orientation(&self) -> u16 {
        self.shared.lock().orientation
    }

    pub fn normalized_rotation(&self) -> u16 {
        normalized_rotation(self.orientation())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let inner = self.shared.lock();
        (inner.width, inner.height)
    }

    pub fn pixel_count(&self) -> u64 {
        self.shared.lock().pixel_count()
    }

    /// Size of the probe encode captured at load.
    pub fn file_size(&self) -> u64 {
        self.shared.lock().file_size
    }

    /// Size of the source bytes.
    pub fn initial_file_size(&self) -> u64 {
        self.shared.lock().initial_file_size
    }

    pub fn exif_metadata(&self) -> ExifMap {
        self.shared.lock().exif.clone()
    }

    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.shared.lock().image.clone()
    }
}

impl std::fmt::Debug for BitmapAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("BitmapAsset")
            .field("source", &inner.source.describe())
            .field("revision", &inner.revision)
            .field("state", &inner.state)
            .field("mime_type", &inner.mime_type)
            .field("dimensions", &(inner.width, inner.height))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OptimizationMode;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    /// Decodes any input to a fixed-size image.
    struct FixedDecoder(u32, u32);

    impl Decoder for FixedDecoder {
        fn decode(&self, _bytes: &[u8], _mime: &str) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(self.0, self.1, Rgba([9, 9, 9, 255])))
        }
    }

    /// Size grows with area and quality.
    struct AreaEncoder;

    impl Encoder for AreaEncoder {
        fn encode(&self, _: &[u8], w: u32, h: u32, _: &str, q: f32) -> Result<Vec<u8>> {
            Ok(vec![1; ((w * h) as f32 * q).max(1.0) as usize])
        }

        fn is_mime_type_supported(&self, mime: &str) -> bool {
            mime == "image/png" || mime == "image/jpeg"
        }
    }

    struct FailingMetadata;

    impl MetadataReader for FailingMetadata {
        fn read_orientation(&self, _: &[u8]) -> Result<u16> {
            Err(BitmapError::metadata_read_failed("corrupt ifd"))
        }

        fn read_metadata(&self, _: &[u8]) -> Result<ExifMap> {
            Err(BitmapError::metadata_read_failed("corrupt ifd"))
        }
    }

    struct FixedOrientation(u16);

    impl MetadataReader for FixedOrientation {
        fn read_orientation(&self, _: &[u8]) -> Result<u16> {
            Ok(self.0)
        }

        fn read_metadata(&self, _: &[u8]) -> Result<ExifMap> {
            let mut map = ExifMap::new();
            map.insert("Orientation", self.0.to_string());
            Ok(map)
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn fake_context() -> AssetContext {
        AssetContext::default()
            .with_decoder(Arc::new(FixedDecoder(40, 20)))
            .with_encoder(Arc::new(AreaEncoder))
            .with_metadata_reader(Arc::new(FixedOrientation(6)))
    }

    #[test]
    fn load_populates_fields() {
        let png = png_bytes(4, 4);
        let asset = BitmapAsset::with_context(png.clone(), fake_context())
            .with_resolution("@2x")
            .with_revision(7);
        asset.load().unwrap();

        assert_eq!(asset.state(), AssetState::Loaded);
        assert_eq!(asset.mime_type(), "image/png");
        assert_eq!(asset.dimensions(), (40, 20));
        assert_eq!(asset.pixel_count(), 800);
        assert_eq!(asset.orientation(), 6);
        assert_eq!(asset.normalized_rotation(), 270);
        assert_eq!(asset.initial_file_size(), png.len() as u64);
        // Probe at 0.92 through the area model.
        assert_eq!(asset.file_size(), (800.0f32 * 0.92) as u64);
        assert_eq!(asset.exif_metadata().get("Orientation"), Some("6"));
        assert_eq!(asset.resolution(), "@2x");
        assert_eq!(asset.revision(), 7);
    }

    #[test]
    fn full_quality_probe() {
        let asset = BitmapAsset::with_context(png_bytes(2, 2), fake_context());
        asset.load_with(LoadOptions { full_quality: true }).unwrap();
        assert_eq!(asset.file_size(), 800);
    }

    #[test]
    fn empty_source_is_no_source() {
        let asset = BitmapAsset::with_context(Vec::new(), fake_context()).with_revision(2);
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::NoSource));
        assert_eq!(err.revision(), 2);
        assert_eq!(asset.state(), AssetState::Empty);
    }

    #[test]
    fn unknown_bytes_fail_to_decode_and_return_to_empty() {
        let asset = BitmapAsset::with_context(vec![0u8; 32], fake_context());
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::DecodeFailed { .. }));
        assert_eq!(asset.state(), AssetState::Empty);
        assert_eq!(asset.mime_type(), UNKNOWN_MIME);
    }

    #[test]
    fn metadata_failures_are_absorbed() {
        let context = fake_context().with_metadata_reader(Arc::new(FailingMetadata));
        let asset = BitmapAsset::with_context(png_bytes(3, 3), context);
        asset.load().unwrap();
        assert_eq!(asset.orientation(), DEFAULT_ORIENTATION);
        assert!(asset.exif_metadata().is_empty());
    }

    #[test]
    fn out_of_range_orientation_defaults() {
        let context = fake_context().with_metadata_reader(Arc::new(FixedOrientation(12)));
        let asset = BitmapAsset::with_context(png_bytes(3, 3), context);
        asset.load().unwrap();
        assert_eq!(asset.orientation(), 1);
        assert_eq!(asset.normalized_rotation(), 0);
    }

    #[test]
    fn optimize_requires_loaded() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context());
        let err = asset
            .optimize(EncodeTarget::new("image/jpeg", 0.8), &OptimizationOptions::default())
            .unwrap_err();
        assert!(matches!(err.kind(), BitmapError::ImageNotLoaded));
    }

    #[test]
    fn optimize_does_not_touch_asset_metadata() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context());
        asset.load().unwrap();
        let result = asset
            .optimize(
                EncodeTarget::new("image/jpeg", 1.0),
                &OptimizationOptions::new()
                    .with_size_limit(200)
                    .with_mode(OptimizationMode::RetainQuality),
            )
            .unwrap();
        assert!(result.size() <= 200);
        assert_eq!(result.exif.image_width(), Some(result.width));
        assert_eq!(asset.exif_metadata().image_width(), None);
        assert_eq!(asset.dimensions(), (40, 20));
        assert_eq!(asset.state(), AssetState::Loaded);
    }

    #[test]
    fn destroy_notifies_once() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context()).with_revision(4);
        let rx = asset.destroyed();
        asset.load().unwrap();
        asset.destroy(false);
        asset.destroy(false);

        let signature = rx.try_recv().unwrap();
        assert!(signature.loaded);
        assert_eq!(signature.pixel_count, 800);
        assert_eq!(signature.revision, 4);
        assert!(rx.try_recv().is_none());
        assert_eq!(asset.state(), AssetState::Destroyed);
        assert!(asset.image().is_none());
        assert_eq!(asset.pixel_count(), 0);

        // Late subscription sees a closed channel.
        assert!(asset.destroyed().recv().is_none());
    }

    #[test]
    fn silent_destroy_keeps_channel_open() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context());
        let rx = asset.destroyed();
        asset.load().unwrap();
        asset.destroy(true);
        assert!(rx.try_recv().is_none());
        assert_eq!(asset.state(), AssetState::Destroyed);

        asset.load().unwrap();
        asset.destroy(false);
        assert!(rx.try_recv().is_some());
    }

    #[test]
    fn reload_and_set_source() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context());
        asset.load().unwrap();
        asset.load().unwrap();
        assert!(asset.is_loaded());

        asset.set_source(Vec::new());
        assert_eq!(asset.state(), AssetState::Empty);
        assert_eq!(asset.pixel_count(), 0);
        assert!(asset.load().is_err());
    }

    #[test]
    fn life_is_zero_until_loaded() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context());
        assert_eq!(asset.life(), Duration::ZERO);
        asset.load().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(asset.life() >= Duration::from_millis(5));
    }

    #[test]
    fn ttl_expiry_destroys_loaded_asset() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context())
            .with_ttl(Duration::from_millis(50));
        let rx = asset.destroyed();
        asset.load().unwrap();
        let signature = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(signature.loaded);
        assert_eq!(asset.state(), AssetState::Destroyed);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_none());
    }

    #[test]
    fn set_ttl_rearms_and_zero_disarms() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context())
            .with_ttl(Duration::from_millis(50));
        let rx = asset.destroyed();
        asset.load().unwrap();
        asset.set_ttl(Duration::ZERO).unwrap();
        assert_eq!(asset.ttl(), Duration::ZERO);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_none());
        assert!(asset.is_loaded());
    }

    #[test]
    fn failed_clock_arm_leaves_asset_unloaded() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context())
            .with_ttl(Duration::MAX);
        let err = asset.load().unwrap_err();
        assert!(matches!(err.kind(), BitmapError::InvalidArgument { .. }));
        assert_eq!(asset.state(), AssetState::Empty);
        assert!(!asset.is_loaded());
        assert!(asset.image().is_none());
        assert_eq!(asset.pixel_count(), 0);
        assert_eq!(asset.life(), Duration::ZERO);

        asset.set_ttl(Duration::ZERO).unwrap();
        asset.load().unwrap();
        assert!(asset.is_loaded());
    }

    #[test]
    fn stale_clock_does_not_destroy_a_fresh_load() {
        let asset = BitmapAsset::with_context(png_bytes(3, 3), fake_context())
            .with_ttl(Duration::from_millis(150));
        let rx = asset.destroyed();
        asset.load().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        // Reload cancels the first clock and arms a new one.
        asset.load().unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert!(asset.is_loaded());
        assert!(rx.try_recv().is_none());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_some());
    }
}
