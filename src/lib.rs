//! A glyph cache and texture atlas for real-time text rendering.
//!
//! A [`TextContext`] rasterizes glyphs on demand through a
//! [`Rasterizer`], packs them into a single-channel atlas with a
//! skyline packer, and turns strings into textured triangles that a
//! [`RenderBackend`] draws.
//!
//! ```ignore
//! let mut cx = TextContext::builder(FontdueRasterizer::new(), my_backend)
//!     .atlas_size(512, 512)
//!     .build()?;
//! let sans = cx.add_font("sans", std::fs::read("Inter.ttf")?)?;
//! cx.set_font(sans);
//! cx.set_size(18.);
//! cx.draw_text(10., 30., "Hello, world");
//! ```

pub mod atlas;
pub mod backend;
mod batch;
pub mod blur;
mod context;
mod error;
mod font;
mod glyph;
mod scratch;
mod state;
mod text;
mod texture;
pub mod utf8;

#[cfg(test)]
mod testing;

#[cfg(feature = "fontdue")]
pub use backend::fontdue::FontdueRasterizer;
pub use backend::{GlyphBounds, Rasterizer, RenderBackend, VMetrics};
pub use batch::Quad;
pub use context::{ErrorCallback, Settings, SharedTextContext, TextContext, TextContextBuilder};
pub use error::{AtlasError, CreateError, MalformedFont, Recovery, StashError};
pub use font::{FontId, MAX_FALLBACKS};
pub use glyph::CacheStats;
pub use state::{rgba, Align, Baseline, DrawState, Origin};
pub use text::{IterGlyph, TextBounds, TextIter, VertMetrics};
pub use texture::DirtyRect;
