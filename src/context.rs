use std::sync::Arc;

use palette::Srgba;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{Rasterizer, RenderBackend},
    batch::Batch,
    error::{AtlasError, CreateError, MalformedFont, Recovery, StashError},
    font::{Font, FontId, Fonts},
    glyph::{CacheStats, Glyph},
    scratch::Scratch,
    state::{Align, Baseline, DrawState, Origin, StateStack},
    texture::{AtlasTexture, DirtyRect},
};

/// Side length of the opaque block packed into every fresh atlas.
const WHITE_RECT_SIZE: i32 = 2;

/// Receives recoverable errors and decides how to recover.
pub type ErrorCallback = Box<dyn FnMut(StashError) -> Recovery + Send>;

/// A [`TextContext`] behind a lock, for driving one context from
/// several threads.
pub type SharedTextContext<R, B> = Arc<Mutex<TextContext<R, B>>>;

/// Construction parameters of a [`TextContext`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Initial atlas width in pixels.
    pub width: u32,
    /// Initial atlas height in pixels.
    pub height: u32,
    pub origin: Origin,
    /// Depth of the draw state stack, including the base state.
    pub max_states: usize,
    /// Number of vertices buffered before they are sent to the backend.
    pub vertex_capacity: usize,
    /// Bytes of scratch memory for rasterizing a single glyph.
    pub scratch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            origin: Origin::TopLeft,
            max_states: 20,
            vertex_capacity: 1024,
            scratch_size: 64000,
        }
    }
}

/// Builder for a [`TextContext`].
pub struct TextContextBuilder<R, B> {
    settings: Settings,
    rasterizer: R,
    backend: B,
}

impl<R, B> TextContextBuilder<R, B>
where
    R: Rasterizer,
    B: RenderBackend,
{
    /// Sets the initial atlas dimensions.
    ///
    /// The default is 512x512. [`build`](Self::build) fails if either
    /// dimension is zero.
    pub fn atlas_size(mut self, width: u32, height: u32) -> Self {
        self.settings.width = width;
        self.settings.height = height;
        self
    }

    /// Sets which corner of the render target is the origin.
    ///
    /// The default is [`Origin::TopLeft`].
    pub fn origin(mut self, origin: Origin) -> Self {
        self.settings.origin = origin;
        self
    }

    /// Sets the maximum depth of the draw state stack.
    ///
    /// The default is 20.
    pub fn max_states(mut self, max_states: usize) -> Self {
        self.settings.max_states = max_states;
        self
    }

    /// Sets how many vertices are buffered between draw calls.
    /// Values below 12 are raised to 12.
    ///
    /// The default is 1024.
    pub fn vertex_capacity(mut self, capacity: usize) -> Self {
        self.settings.vertex_capacity = capacity.max(12);
        self
    }

    /// Sets the scratch memory available for rasterizing one glyph.
    /// Glyphs whose bitmap exceeds it are reported
    /// as [`StashError::ScratchFull`] and skipped.
    ///
    /// The default is 64000 bytes.
    pub fn scratch_size(mut self, size: usize) -> Self {
        self.settings.scratch_size = size;
        self
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self.settings.vertex_capacity = self.settings.vertex_capacity.max(12);
        self
    }

    /// Creates the backend texture and builds the context.
    pub fn build(mut self) -> Result<TextContext<R, B>, CreateError> {
        let settings = self.settings;
        if settings.width == 0 || settings.height == 0 {
            return Err(CreateError(anyhow::anyhow!(
                "atlas dimensions must be nonzero, got {}x{}",
                settings.width,
                settings.height
            )));
        }
        self.backend
            .create(settings.width, settings.height)
            .map_err(CreateError)?;

        let mut texture = AtlasTexture::new(settings.width as i32, settings.height as i32);
        texture.add_white_rect(WHITE_RECT_SIZE, WHITE_RECT_SIZE);

        log::info!(
            "Created text context with a {}x{} glyph atlas",
            settings.width,
            settings.height
        );

        Ok(TextContext {
            rasterizer: self.rasterizer,
            backend: self.backend,
            texture,
            fonts: Fonts::default(),
            states: StateStack::new(settings.max_states),
            batch: Batch::new(settings.vertex_capacity),
            scratch: Scratch::new(settings.scratch_size),
            resolved: Vec::new(),
            error_callback: None,
            stats: CacheStats::default(),
            generation: 0,
            settings,
        })
    }
}

/// Caches glyphs in a texture atlas and turns strings into
/// textured triangles.
///
/// Glyphs are rasterized by `R` on first use and drawn through `B`.
/// Drawing parameters live on a stack of [`DrawState`]s; the setters
/// only touch the topmost one.
pub struct TextContext<R, B>
where
    R: Rasterizer,
    B: RenderBackend,
{
    pub(crate) settings: Settings,

    pub(crate) rasterizer: R,
    pub(crate) backend: B,

    pub(crate) texture: AtlasTexture,
    pub(crate) fonts: Fonts<R::Font>,
    pub(crate) states: StateStack,
    pub(crate) batch: Batch,
    pub(crate) scratch: Scratch,
    /// Reused between draw calls.
    pub(crate) resolved: Vec<Option<Glyph>>,

    pub(crate) error_callback: Option<ErrorCallback>,
    pub(crate) stats: CacheStats,
    /// Incremented by every atlas reset.
    pub(crate) generation: u64,
}

impl<R, B> TextContext<R, B>
where
    R: Rasterizer,
    B: RenderBackend,
{
    pub fn builder(rasterizer: R, backend: B) -> TextContextBuilder<R, B> {
        TextContextBuilder {
            settings: Settings::default(),
            rasterizer,
            backend,
        }
    }

    /// Moves the context behind a mutex.
    pub fn into_shared(self) -> SharedTextContext<R, B> {
        Arc::new(Mutex::new(self))
    }

    /// The construction settings, with the atlas size kept current.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Parses and registers a font.
    pub fn add_font(&mut self, name: &str, data: Vec<u8>) -> Result<FontId, MalformedFont> {
        let font = Font::load(&mut self.rasterizer, name, data)?;
        let id = self.fonts.add(font);
        log::info!("Loaded font '{}' as {:?}", name, id);
        Ok(id)
    }

    /// Makes `fallback` provide glyphs that `base` lacks.
    ///
    /// Returns `false` if either font is unknown or `base` already
    /// has [`MAX_FALLBACKS`](crate::MAX_FALLBACKS) fallbacks.
    pub fn add_fallback_font(&mut self, base: FontId, fallback: FontId) -> bool {
        self.fonts.add_fallback(base, fallback)
    }

    /// Finds the first font registered under `name`.
    pub fn get_font_by_name(&self, name: &str) -> Option<FontId> {
        self.fonts.by_name(name)
    }

    /// Installs the callback receiving recoverable errors.
    pub fn set_error_callback(
        &mut self,
        callback: impl FnMut(StashError) -> Recovery + Send + 'static,
    ) {
        self.error_callback = Some(Box::new(callback));
    }

    /// The current draw state.
    pub fn state(&self) -> &DrawState {
        self.states.top()
    }

    pub fn set_font(&mut self, font: FontId) {
        self.states.top_mut().font = Some(font);
    }

    pub fn set_size(&mut self, size: f32) {
        self.states.top_mut().size = size;
    }

    pub fn set_color(&mut self, color: Srgba<u8>) {
        self.states.top_mut().color = color;
    }

    pub fn set_spacing(&mut self, spacing: f32) {
        self.states.top_mut().spacing = spacing;
    }

    pub fn set_blur(&mut self, blur: f32) {
        self.states.top_mut().blur = blur;
    }

    pub fn set_align(&mut self, align: Align) {
        self.states.top_mut().align = align;
    }

    pub fn set_baseline(&mut self, baseline: Baseline) {
        self.states.top_mut().baseline = baseline;
    }

    /// Saves a copy of the current state. Reports
    /// [`StashError::StatesOverflow`] when the stack is full.
    pub fn push_state(&mut self) {
        if let Err(e) = self.states.push() {
            self.report(e);
        }
    }

    /// Restores the previously pushed state. Reports
    /// [`StashError::StatesUnderflow`] if there is none.
    pub fn pop_state(&mut self) {
        if let Err(e) = self.states.pop() {
            self.report(e);
        }
    }

    /// Resets the current state to the defaults.
    pub fn clear_state(&mut self) {
        self.states.clear();
    }

    /// Number of states on the stack, including the base state.
    pub fn state_depth(&self) -> usize {
        self.states.depth()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    pub fn atlas_size(&self) -> (u32, u32) {
        (self.texture.width() as u32, self.texture.height() as u32)
    }

    /// The single-channel atlas bitmap, row-major with
    /// [`atlas_size`](Self::atlas_size)`.0` bytes per row.
    pub fn texture_data(&self) -> &[u8] {
        self.texture.data()
    }

    /// Takes the region modified since the last upload, for callers
    /// that upload [`texture_data`](Self::texture_data) themselves.
    pub fn validate_texture(&mut self) -> Option<DirtyRect> {
        self.texture.take_dirty()
    }

    /// Sends pending texture updates and vertices to the backend.
    pub fn flush(&mut self) {
        if let Some(dirty) = self.texture.take_dirty() {
            self.backend
                .update_texture(dirty, self.texture.data(), self.texture.width() as u32);
        }

        if !self.batch.is_empty() {
            log::trace!("Flushing {} vertices", self.batch.len());
            self.backend.draw_triangles(
                self.batch.positions(),
                self.batch.texcoords(),
                self.batch.colors(),
            );
            self.batch.clear();
        }
    }

    /// Grows the atlas, keeping every cached glyph.
    ///
    /// Dimensions smaller than the current ones are ignored.
    pub fn expand_atlas(&mut self, width: u32, height: u32) -> Result<(), AtlasError> {
        let (old_width, old_height) = self.atlas_size();
        let width = width.max(old_width);
        let height = height.max(old_height);
        if (width, height) == (old_width, old_height) {
            return Ok(());
        }

        self.flush();
        self.backend
            .resize(width, height)
            .map_err(|source| AtlasError {
                width,
                height,
                source,
            })?;
        self.texture.expand(width as i32, height as i32);
        self.settings.width = width;
        self.settings.height = height;

        log::info!(
            "Expanded glyph atlas from {}x{} to {}x{}",
            old_width,
            old_height,
            width,
            height
        );
        Ok(())
    }

    /// Discards all atlas content and every cached glyph, resizing
    /// the atlas to `width × height`.
    ///
    /// A zero dimension is rejected and leaves the atlas untouched.
    pub fn reset_atlas(&mut self, width: u32, height: u32) -> Result<(), AtlasError> {
        if width == 0 || height == 0 {
            log::warn!("Refusing to reset the glyph atlas to {}x{}", width, height);
            return Err(AtlasError {
                width,
                height,
                source: anyhow::anyhow!("atlas dimensions must be nonzero"),
            });
        }
        self.flush();
        self.backend
            .resize(width, height)
            .map_err(|source| AtlasError {
                width,
                height,
                source,
            })?;

        self.texture.reset(width as i32, height as i32);
        for font in self.fonts.iter_mut() {
            font.glyphs.clear();
        }
        self.stats = CacheStats::default();
        self.generation += 1;
        self.settings.width = width;
        self.settings.height = height;

        self.texture.add_white_rect(WHITE_RECT_SIZE, WHITE_RECT_SIZE);

        log::info!("Reset glyph atlas to {}x{}", width, height);
        Ok(())
    }

    /// Copies the atlas into an image for inspection.
    #[cfg(feature = "image")]
    pub fn atlas_image(&self) -> Option<image::GrayImage> {
        let (width, height) = self.atlas_size();
        image::GrayImage::from_raw(width, height, self.texture.data().to_vec())
    }

    /// Passes an error to the callback, returning its answer.
    pub(crate) fn report(&mut self, error: StashError) -> Recovery {
        log::debug!("Text context error: {}", error);
        match &mut self.error_callback {
            Some(callback) => callback(error),
            None => Recovery::None,
        }
    }

    /// Applies a recovery, returning whether anything changed.
    pub(crate) fn recover(&mut self, recovery: Recovery) -> bool {
        let result = match recovery {
            Recovery::None => return false,
            Recovery::ExpandAtlas { width, height } => {
                let before = self.atlas_size();
                self.expand_atlas(width, height)
                    .map(|()| self.atlas_size() != before)
            }
            Recovery::ResetAtlas { width, height } => {
                self.reset_atlas(width, height).map(|()| true)
            }
        };

        match result {
            Ok(changed) => changed,
            Err(e) => {
                log::warn!("Failed to recover from a full atlas: {}", e);
                false
            }
        }
    }
}

impl<R, B> Drop for TextContext<R, B>
where
    R: Rasterizer,
    B: RenderBackend,
{
    fn drop(&mut self) {
        self.backend.delete();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::testing::{context, stub_font, RecordingBackend, StubRasterizer};

    #[test]
    fn build_creates_texture_with_white_rect() {
        let mut cx = context(64, 32);
        assert_eq!(cx.backend().created, Some((64, 32)));
        assert_eq!(cx.atlas_size(), (64, 32));
        assert_eq!(cx.texture_data()[0], 0xff);
        assert_eq!(cx.texture_data()[65], 0xff);
        assert_eq!(cx.validate_texture().map(|d| d.to_array()), Some([0, 0, 2, 2]));
        assert_eq!(cx.validate_texture(), None);
    }

    #[test]
    fn build_fails_when_backend_fails() {
        let backend = RecordingBackend {
            fail_create: true,
            ..Default::default()
        };
        let result = TextContext::builder(StubRasterizer::new(), backend).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_applies_settings() {
        let settings = Settings {
            width: 1024,
            ..Default::default()
        };
        let built = TextContext::builder(StubRasterizer::new(), RecordingBackend::default())
            .settings(settings)
            .vertex_capacity(3)
            .build()
            .unwrap();
        assert_eq!(built.settings().width, 1024);
        assert_eq!(built.settings().height, 512);
        assert_eq!(built.settings().vertex_capacity, 12);
    }

    #[test]
    fn zero_sized_atlas_is_rejected() {
        let backend = RecordingBackend::default();
        let result = TextContext::builder(StubRasterizer::new(), backend)
            .atlas_size(0, 64)
            .build();
        assert!(result.is_err());

        let settings = Settings {
            height: 0,
            ..Default::default()
        };
        let result = TextContext::builder(StubRasterizer::new(), RecordingBackend::default())
            .settings(settings)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn zero_sized_reset_is_an_error() {
        let mut cx = context(64, 64);
        assert!(cx.reset_atlas(0, 64).is_err());
        assert!(cx.reset_atlas(64, 0).is_err());
        assert_eq!(cx.atlas_size(), (64, 64));
        assert!(cx.backend().resizes.is_empty());
        assert!(!cx.recover(Recovery::ResetAtlas {
            width: 0,
            height: 0
        }));
        assert_eq!(cx.texture_data()[0], 0xff);
    }

    #[test]
    fn fonts_are_found_by_name() {
        let mut cx = context(64, 64);
        let sans = cx.add_font("sans", stub_font("")).unwrap();
        let _other = cx.add_font("sans", stub_font("")).unwrap();
        assert_eq!(cx.get_font_by_name("sans"), Some(sans));
        assert_eq!(cx.get_font_by_name("mono"), None);
        assert!(cx.add_font("broken", b"TTF?".to_vec()).is_err());
    }

    #[test]
    fn state_errors_reach_the_callback() {
        let mut cx = TextContext::builder(StubRasterizer::new(), RecordingBackend::default())
            .max_states(2)
            .build()
            .unwrap();
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        cx.set_error_callback(move |e| {
            sink.lock().push(e);
            Recovery::None
        });

        cx.set_size(30.);
        cx.push_state();
        cx.push_state();
        assert_eq!(cx.state_depth(), 2);
        cx.set_size(40.);
        cx.pop_state();
        assert_eq!(cx.state().size, 30.);
        cx.pop_state();
        assert_eq!(cx.state_depth(), 1);

        assert_eq!(
            *reported.lock(),
            vec![StashError::StatesOverflow, StashError::StatesUnderflow]
        );
    }

    #[test]
    fn clear_state_restores_defaults() {
        let mut cx = context(64, 64);
        cx.set_size(99.);
        cx.set_align(Align::Center);
        cx.clear_state();
        assert_eq!(*cx.state(), DrawState::default());
    }

    #[test]
    fn expand_never_shrinks() {
        let mut cx = context(64, 64);
        cx.expand_atlas(32, 128).unwrap();
        assert_eq!(cx.atlas_size(), (64, 128));
        cx.expand_atlas(16, 16).unwrap();
        assert_eq!(cx.atlas_size(), (64, 128));
        assert_eq!(cx.backend().resizes, vec![(64, 128)]);
        // Old content is preserved at its offsets.
        assert_eq!(cx.texture_data()[64 + 1], 0xff);
    }

    #[test]
    fn failed_resize_leaves_atlas_alone() {
        let mut cx = context(64, 64);
        cx.backend_mut().fail_resize = true;
        assert!(cx.expand_atlas(128, 128).is_err());
        assert!(cx.reset_atlas(128, 128).is_err());
        assert_eq!(cx.atlas_size(), (64, 64));
    }

    #[test]
    fn recovery_is_counted_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut cx = context(64, 64);
        cx.set_error_callback(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Recovery::ExpandAtlas {
                width: 64,
                height: 64,
            }
        });
        // Expanding to the current size changes nothing, so no retry happens.
        let recovery = cx.report(StashError::AtlasFull);
        assert!(!cx.recover(recovery));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn drop_deletes_backend_resources() {
        let cx = context(16, 16);
        let deleted = Arc::clone(&cx.backend().deleted);
        assert_eq!(deleted.load(Ordering::Relaxed), 0);
        drop(cx);
        assert_eq!(deleted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn shared_context_is_lockable() {
        let shared = context(16, 16).into_shared();
        let handle = Arc::clone(&shared);
        handle.lock().set_size(20.);
        assert_eq!(shared.lock().state().size, 20.);
    }
}
