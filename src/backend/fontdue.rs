//! [`Rasterizer`] implementation backed by `fontdue`.

use ::fontdue::{Font, FontSettings};

use super::{GlyphBounds, Rasterizer, VMetrics};
use crate::error::MalformedFont;

/// Rasterizes glyphs with `fontdue`.
///
/// `fontdue` works in pixels per em, so design-unit quantities are
/// obtained by querying at `units_per_em` pixels.
#[derive(Copy, Clone, Debug, Default)]
pub struct FontdueRasterizer;

impl FontdueRasterizer {
    pub fn new() -> Self {
        Self
    }
}

fn px_for_scale(font: &Font, scale: f32) -> f32 {
    scale * font.units_per_em()
}

fn glyph_id(glyph: u32) -> usize {
    glyph as usize
}

impl Rasterizer for FontdueRasterizer {
    type Font = Font;

    fn load_font(&mut self, data: &[u8]) -> Result<Font, MalformedFont> {
        Font::from_bytes(data, FontSettings::default()).map_err(|e| {
            log::warn!("fontdue rejected font data: {}", e);
            MalformedFont
        })
    }

    fn v_metrics(&self, font: &Font) -> VMetrics {
        let units_per_em = font.units_per_em();
        match font.horizontal_line_metrics(units_per_em) {
            Some(metrics) => VMetrics {
                ascent: metrics.ascent.round() as i32,
                descent: metrics.descent.round() as i32,
                line_gap: metrics.line_gap.round() as i32,
            },
            None => VMetrics {
                ascent: units_per_em.round() as i32,
                descent: 0,
                line_gap: 0,
            },
        }
    }

    fn scale_for_size(&self, font: &Font, size: f32) -> f32 {
        let metrics = self.v_metrics(font);
        let height = (metrics.ascent - metrics.descent).max(1);
        size / height as f32
    }

    fn glyph_index(&self, font: &Font, codepoint: char) -> u32 {
        u32::try_from(font.lookup_glyph_index(codepoint)).unwrap_or(0)
    }

    fn glyph_bitmap_bounds(
        &mut self,
        font: &Font,
        glyph: u32,
        _size: f32,
        scale: f32,
    ) -> GlyphBounds {
        if scale <= 0.0 || glyph_id(glyph) >= font.glyph_count() {
            return GlyphBounds::default();
        }
        let metrics = font.metrics_indexed(glyph_id(glyph), px_for_scale(font, scale));

        let x0 = metrics.xmin;
        let y0 = -(metrics.ymin + metrics.height as i32);
        GlyphBounds {
            advance: (metrics.advance_width / scale).round() as i32,
            lsb: (metrics.bounds.xmin / scale).round() as i32,
            x0,
            y0,
            x1: x0 + metrics.width as i32,
            y1: y0 + metrics.height as i32,
        }
    }

    fn render_glyph(
        &mut self,
        font: &Font,
        output: &mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        scale: f32,
        glyph: u32,
    ) {
        if glyph_id(glyph) >= font.glyph_count() {
            return;
        }
        let (metrics, bitmap) = font.rasterize_indexed(glyph_id(glyph), px_for_scale(font, scale));

        let rows = metrics.height.min(height);
        let cols = metrics.width.min(width);
        for (y, src) in bitmap.chunks_exact(metrics.width.max(1)).take(rows).enumerate() {
            let start = y * stride;
            output[start..start + cols].copy_from_slice(&src[..cols]);
        }
    }

    // fontdue 0.5 does not read kerning tables.
    fn kern_advance(&self, _font: &Font, _left: u32, _right: u32) -> f32 {
        0.0
    }
}
