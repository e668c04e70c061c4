//! Capability traits for the collaborators of a [`TextContext`](crate::TextContext).
//!
//! A [`Rasterizer`] turns font bytes into glyph bitmaps, and a
//! [`RenderBackend`] presents the atlas texture and the emitted
//! triangles. Both are chosen when the context is built.

use glam::Vec2;

use crate::{error::MalformedFont, texture::DirtyRect};

#[cfg(feature = "fontdue")]
pub mod fontdue;

/// Vertical font metrics in font design units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct VMetrics {
    pub ascent: i32,
    /// Typically negative.
    pub descent: i32,
    pub line_gap: i32,
}

/// Placement of a glyph bitmap relative to the pen position.
///
/// `advance` and `lsb` are in font design units. The bitmap box
/// is in pixels with the y-axis pointing down from the baseline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct GlyphBounds {
    pub advance: i32,
    pub lsb: i32,
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl GlyphBounds {
    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

/// Font parsing and glyph rasterization.
///
/// Glyph index `0` is the "missing glyph" sentinel.
pub trait Rasterizer {
    /// A parsed font.
    type Font;

    fn load_font(&mut self, data: &[u8]) -> Result<Self::Font, MalformedFont>;

    fn v_metrics(&self, font: &Self::Font) -> VMetrics;

    /// The factor converting design units to pixels for text of the given size.
    fn scale_for_size(&self, font: &Self::Font, size: f32) -> f32;

    fn glyph_index(&self, font: &Self::Font, codepoint: char) -> u32;

    fn glyph_bitmap_bounds(
        &mut self,
        font: &Self::Font,
        glyph: u32,
        size: f32,
        scale: f32,
    ) -> GlyphBounds;

    /// Renders a glyph as 8-bit coverage into `output`, whose rows are
    /// `stride` bytes apart. At most `width × height` pixels are written.
    fn render_glyph(
        &mut self,
        font: &Self::Font,
        output: &mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        scale: f32,
        glyph: u32,
    );

    /// Kerning between two glyphs in design units.
    fn kern_advance(&self, font: &Self::Font, left: u32, right: u32) -> f32;
}

/// The presentation side: owns the GPU texture and draws triangles.
pub trait RenderBackend {
    /// Creates the atlas texture. Called once when the context is built.
    fn create(&mut self, width: u32, height: u32) -> anyhow::Result<()>;

    /// Recreates the atlas texture with new dimensions.
    fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()>;

    /// Uploads the `dirty` region of the single-channel atlas bitmap.
    ///
    /// `data` is the whole bitmap with rows `width` bytes apart.
    fn update_texture(&mut self, dirty: DirtyRect, data: &[u8], width: u32);

    /// Draws a triangle list. All slices have the same length,
    /// which is a multiple of three. Colors are packed RGBA, red in
    /// the low byte.
    fn draw_triangles(&mut self, positions: &[Vec2], texcoords: &[Vec2], colors: &[u32]);

    /// Releases GPU resources. Called when the context is dropped.
    fn delete(&mut self) {}
}
