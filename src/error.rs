//! Error types.

#[derive(Debug, thiserror::Error)]
#[error("failed to parse font data")]
pub struct MalformedFont;

/// The render backend could not create the atlas texture.
#[derive(Debug, thiserror::Error)]
#[error("failed to initialize the render backend")]
pub struct CreateError(#[source] pub anyhow::Error);

/// The render backend could not resize the atlas texture.
#[derive(Debug, thiserror::Error)]
#[error("failed to resize the atlas texture to {width}x{height}")]
pub struct AtlasError {
    pub width: u32,
    pub height: u32,
    #[source]
    pub source: anyhow::Error,
}

/// Recoverable conditions reported through the error callback.
///
/// None of these abort the operation that triggered them;
/// see [`TextContext::set_error_callback`](crate::TextContext::set_error_callback).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StashError {
    /// No space left in the atlas for a new glyph.
    #[error("the glyph atlas is full")]
    AtlasFull,
    /// A glyph bitmap did not fit into scratch memory; consider
    /// raising `Settings::scratch_size`.
    #[error("scratch memory is full ({requested} bytes requested)")]
    ScratchFull { requested: usize },
    /// `push_state` was called with a full state stack.
    #[error("too many pushed states")]
    StatesOverflow,
    /// `pop_state` was called with only the base state left.
    #[error("cannot pop the base state")]
    StatesUnderflow,
}

/// What the context should do after reporting a [`StashError`].
///
/// Only honoured for [`StashError::AtlasFull`]; the failed glyph
/// allocation is retried once after the recovery runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Recovery {
    None,
    /// Grow the atlas, keeping cached glyphs.
    ExpandAtlas { width: u32, height: u32 },
    /// Clear the atlas and every glyph cache.
    ResetAtlas { width: u32, height: u32 },
}

impl Default for Recovery {
    fn default() -> Self {
        Recovery::None
    }
}
