//! Text layout: drawing, measuring and step-wise iteration.
//!
//! All three walk a string the same way: decode a codepoint, resolve
//! its glyph through `TextContext::glyph`, then place it with
//! `TextContext::build_quad`. Horizontal alignment needs the total
//! advance up front, so aligned text is measured before the first
//! quad is placed.

use std::mem;

use glam::Vec2;

use crate::{
    backend::{Rasterizer, RenderBackend},
    batch::Quad,
    font::{Font, FontId},
    glyph::Glyph,
    state::{pack_color, Align, Baseline, Origin},
    utf8::Utf8Chars,
    TextContext,
};

/// The extent of a string as it would be drawn.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextBounds {
    /// Horizontal distance the pen moves.
    pub advance: f32,
    /// Bounding box of all glyph quads and the pen's start position.
    pub min: Vec2,
    pub max: Vec2,
}

/// Vertical metrics of the current font at the current size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertMetrics {
    pub ascender: f32,
    /// Typically negative.
    pub descender: f32,
    pub line_height: f32,
}

/// Cursor over a string, advanced by [`TextContext::text_iter_next`].
///
/// The draw state is captured when the iterator is created.
#[derive(Clone, Debug)]
pub struct TextIter<'t> {
    font: FontId,
    size: i16,
    blur: i16,
    spacing: f32,
    chars: Utf8Chars<'t>,
    next_x: f32,
    next_y: f32,
    prev: Option<(FontId, u32)>,
}

/// One step of a [`TextIter`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IterGlyph {
    pub codepoint: char,
    /// Byte range of the codepoint in the source text.
    pub start: usize,
    pub end: usize,
    /// Pen position before the glyph.
    pub x: f32,
    pub y: f32,
    /// Pen position after the glyph.
    pub next_x: f32,
    pub next_y: f32,
    /// `None` if the glyph could not be rasterized or placed.
    pub quad: Option<Quad>,
}

/// Converts a size in pixels to tenths of a pixel.
fn fixed_size(size: f32) -> i16 {
    (size * 10.) as i16
}

fn pixels(size: i16) -> f32 {
    f32::from(size) / 10.
}

fn align_offset(align: Align, advance: f32) -> f32 {
    match align {
        Align::Start => 0.,
        Align::Center => advance * 0.5,
        Align::End => advance,
    }
}

impl<R, B> TextContext<R, B>
where
    R: Rasterizer,
    B: RenderBackend,
{
    /// The current font if it is set and registered.
    fn current_font(&self) -> Option<FontId> {
        self.states
            .top()
            .font
            .filter(|&font| self.fonts.get(font).is_some())
    }

    fn vert_align(&self, font: &Font<R::Font>, baseline: Baseline, size: i16) -> f32 {
        let offset = match baseline {
            Baseline::Top => font.ascender,
            Baseline::Middle => (font.ascender + font.descender) / 2.,
            Baseline::Alphabetic => 0.,
            Baseline::Bottom => font.descender,
        };
        offset * pixels(size) * self.settings.origin.down()
    }

    /// Places `glyph` at the pen position and advances the pen.
    ///
    /// `prev` is the render font and index of the preceding glyph, or
    /// `None` at the start of the text or after a missing glyph. The
    /// quad is inset by one pixel so bilinear filtering never samples
    /// the neighbouring slot.
    pub(crate) fn build_quad(
        &self,
        prev: Option<(FontId, u32)>,
        glyph: &Glyph,
        size: f32,
        spacing: f32,
        pen: &mut Vec2,
    ) -> Quad {
        if let Some((prev_font, prev_index)) = prev {
            let mut kerning = 0.;
            // Glyph indices only mean something within one font.
            if prev_font == glyph.font {
                if let Some(font) = self.fonts.get(glyph.font) {
                    let scale = self.rasterizer.scale_for_size(&font.handle, size);
                    kerning = self
                        .rasterizer
                        .kern_advance(&font.handle, prev_index, glyph.index)
                        * scale;
                }
            }
            pen.x += (kerning + spacing + 0.5).floor();
        }

        let xoff = (glyph.xoff + 1) as f32;
        let yoff = (glyph.yoff + 1) as f32;
        let x0 = (glyph.x0 + 1) as f32;
        let y0 = (glyph.y0 + 1) as f32;
        let x1 = (glyph.x1 - 1) as f32;
        let y1 = (glyph.y1 - 1) as f32;

        let rx = (pen.x + xoff).trunc();
        let (ry, ry1) = match self.settings.origin {
            Origin::TopLeft => {
                let ry = (pen.y + yoff).trunc();
                (ry, ry + y1 - y0)
            }
            Origin::BottomLeft => {
                let ry = (pen.y - yoff).trunc();
                (ry, ry - y1 + y0)
            }
        };

        let texel = Vec2::new(
            1. / self.texture.width() as f32,
            1. / self.texture.height() as f32,
        );
        let quad = Quad {
            p0: Vec2::new(rx, ry),
            p1: Vec2::new(rx + x1 - x0, ry1),
            uv0: Vec2::new(x0, y0) * texel,
            uv1: Vec2::new(x1, y1) * texel,
        };

        pen.x += (glyph.xadv as f32 / 10. + 0.5).floor();
        quad
    }

    /// Resolves every glyph of `text` into `out`, one entry per codepoint.
    ///
    /// An atlas reset while resolving invalidates the glyphs resolved
    /// before it, so the text is resolved once more. Entries still
    /// predating the last reset after that are dropped.
    fn resolve_glyphs(
        &mut self,
        font: FontId,
        text: &[u8],
        size: i16,
        blur: i16,
        out: &mut Vec<Option<Glyph>>,
    ) {
        let mut stale = self.resolve_pass(font, text, size, blur, out);
        if stale > 0 {
            log::debug!("Glyph atlas was reset while resolving text; resolving again");
            stale = self.resolve_pass(font, text, size, blur, out);
        }
        if stale > 0 {
            log::warn!(
                "Text does not fit into the glyph atlas; dropping {} glyphs",
                stale
            );
            out[..stale].fill(None);
        }
    }

    /// Returns the number of leading entries resolved before the
    /// last atlas reset.
    fn resolve_pass(
        &mut self,
        font: FontId,
        text: &[u8],
        size: i16,
        blur: i16,
        out: &mut Vec<Option<Glyph>>,
    ) -> usize {
        out.clear();
        let mut stale = 0;
        for (_, codepoint) in Utf8Chars::new(text) {
            let generation = self.generation;
            let glyph = self.glyph(font, codepoint, size, blur);
            if self.generation != generation {
                stale = out.len();
            }
            out.push(glyph);
        }
        stale
    }

    /// Total pen advance over resolved glyphs.
    fn measure(&self, glyphs: &[Option<Glyph>], size: f32, spacing: f32) -> f32 {
        let mut pen = Vec2::ZERO;
        let mut prev = None;
        for glyph in glyphs {
            prev = glyph.map(|glyph| {
                self.build_quad(prev, &glyph, size, spacing, &mut pen);
                (glyph.font, glyph.index)
            });
        }
        pen.x
    }

    /// Draws `text` with the current state and returns the pen's
    /// final x coordinate.
    ///
    /// Does nothing and returns `x` if no valid font is set. Invalid
    /// UTF-8 is drawn as U+FFFD.
    pub fn draw_text(&mut self, x: f32, y: f32, text: impl AsRef<[u8]>) -> f32 {
        let font = match self.current_font() {
            Some(font) => font,
            None => return x,
        };
        let state = *self.states.top();
        let size = fixed_size(state.size);

        let mut resolved = mem::take(&mut self.resolved);
        self.resolve_glyphs(font, text.as_ref(), size, state.blur as i16, &mut resolved);

        let mut pen = Vec2::new(x, y);
        if let Some(base) = self.fonts.get(font) {
            pen.y += self.vert_align(base, state.baseline, size);
        }
        if state.align != Align::Start {
            let advance = self.measure(&resolved, pixels(size), state.spacing);
            pen.x -= align_offset(state.align, advance);
        }

        let color = pack_color(state.color);
        let mut prev = None;
        for glyph in &resolved {
            prev = match glyph {
                Some(glyph) => {
                    let quad = self.build_quad(prev, glyph, pixels(size), state.spacing, &mut pen);
                    if !self.batch.has_room(6) {
                        self.flush();
                    }
                    self.batch.push_quad(&quad, color);
                    Some((glyph.font, glyph.index))
                }
                None => None,
            };
        }
        self.flush();

        self.resolved = resolved;
        pen.x
    }

    /// Measures `text` as [`draw_text`](Self::draw_text) would draw it,
    /// without drawing.
    ///
    /// Glyphs are still rasterized into the atlas. Returns `None` if
    /// no valid font is set.
    pub fn text_bounds(&mut self, x: f32, y: f32, text: impl AsRef<[u8]>) -> Option<TextBounds> {
        let font = self.current_font()?;
        let state = *self.states.top();
        let size = fixed_size(state.size);

        let mut resolved = mem::take(&mut self.resolved);
        self.resolve_glyphs(font, text.as_ref(), size, state.blur as i16, &mut resolved);

        let mut pen = Vec2::new(x, y + self.vert_align(self.fonts.get(font)?, state.baseline, size));
        let (mut min, mut max) = (pen, pen);
        let mut prev = None;
        for glyph in &resolved {
            prev = glyph.map(|glyph| {
                let quad = self.build_quad(prev, &glyph, pixels(size), state.spacing, &mut pen);
                min.x = min.x.min(quad.p0.x);
                max.x = max.x.max(quad.p1.x);
                match self.settings.origin {
                    Origin::TopLeft => {
                        min.y = min.y.min(quad.p0.y);
                        max.y = max.y.max(quad.p1.y);
                    }
                    Origin::BottomLeft => {
                        min.y = min.y.min(quad.p1.y);
                        max.y = max.y.max(quad.p0.y);
                    }
                }
                (glyph.font, glyph.index)
            });
        }
        self.resolved = resolved;

        let advance = pen.x - x;
        let shift = align_offset(state.align, advance);
        min.x -= shift;
        max.x -= shift;

        Some(TextBounds { advance, min, max })
    }

    /// Starts iterating over the glyphs of `text`, applying the
    /// current alignment.
    ///
    /// Returns `None` if no valid font is set.
    pub fn text_iter<'t, T>(&mut self, x: f32, y: f32, text: &'t T) -> Option<TextIter<'t>>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let font = self.current_font()?;
        let state = *self.states.top();
        let size = fixed_size(state.size);
        let blur = state.blur as i16;
        let text = text.as_ref();

        let mut x = x;
        if state.align != Align::Start {
            let mut resolved = mem::take(&mut self.resolved);
            self.resolve_glyphs(font, text, size, blur, &mut resolved);
            let advance = self.measure(&resolved, pixels(size), state.spacing);
            self.resolved = resolved;
            x -= align_offset(state.align, advance);
        }
        let y = y + self.vert_align(self.fonts.get(font)?, state.baseline, size);

        Some(TextIter {
            font,
            size,
            blur,
            spacing: state.spacing,
            chars: Utf8Chars::new(text),
            next_x: x,
            next_y: y,
            prev: None,
        })
    }

    /// Decodes the next codepoint of `iter` and places its glyph.
    ///
    /// Returns `None` once the text is exhausted.
    pub fn text_iter_next(&mut self, iter: &mut TextIter) -> Option<IterGlyph> {
        let (start, codepoint) = iter.chars.next()?;
        let end = iter.chars.offset();
        let (x, y) = (iter.next_x, iter.next_y);

        let glyph = self.glyph(iter.font, codepoint, iter.size, iter.blur);
        let mut pen = Vec2::new(x, y);
        let quad = glyph
            .as_ref()
            .map(|glyph| self.build_quad(iter.prev, glyph, pixels(iter.size), iter.spacing, &mut pen));
        iter.prev = glyph.map(|glyph| (glyph.font, glyph.index));
        iter.next_x = pen.x;
        iter.next_y = pen.y;

        Some(IterGlyph {
            codepoint,
            start,
            end,
            x,
            y,
            next_x: pen.x,
            next_y: pen.y,
            quad,
        })
    }

    /// Ascender, descender and line height of the current font at the
    /// current size.
    pub fn vert_metrics(&self) -> Option<VertMetrics> {
        let font = self.fonts.get(self.current_font()?)?;
        let size = pixels(fixed_size(self.states.top().size));
        Some(VertMetrics {
            ascender: font.ascender * size,
            descender: font.descender * size,
            line_height: font.lineh * size,
        })
    }

    /// Vertical extent `(min_y, max_y)` of a line of text drawn at `y`
    /// with the current state.
    pub fn line_bounds(&self, y: f32) -> Option<(f32, f32)> {
        let font = self.fonts.get(self.current_font()?)?;
        let state = self.states.top();
        let size = fixed_size(state.size);
        let y = y + self.vert_align(font, state.baseline, size);
        let size = pixels(size);

        Some(match self.settings.origin {
            Origin::TopLeft => {
                let min_y = y - font.ascender * size;
                (min_y, min_y + font.lineh * size)
            }
            Origin::BottomLeft => {
                let max_y = y + font.descender * size;
                (max_y - font.lineh * size, max_y)
            }
        })
    }

    /// Draws the whole atlas at `(x, y)` over a translucent backdrop,
    /// with the skyline outlined in red.
    pub fn draw_debug(&mut self, x: f32, y: f32) {
        let width = self.texture.width() as f32;
        let height = self.texture.height() as f32;
        // Samples the white rect.
        let white = Vec2::new(
            if width == 0. { 0. } else { 1. / width },
            if height == 0. { 0. } else { 1. / height },
        );
        let origin = Vec2::new(x, y);
        let size = Vec2::new(width, height);

        if !self.batch.has_room(12) {
            self.flush();
        }
        self.batch.push_quad(
            &Quad {
                p0: origin,
                p1: origin + size,
                uv0: white,
                uv1: white,
            },
            0x0fff_ffff,
        );
        self.batch.push_quad(
            &Quad {
                p0: origin,
                p1: origin + size,
                uv0: Vec2::ZERO,
                uv1: Vec2::ONE,
            },
            0xffff_ffff,
        );

        let nodes = self.texture.packer().nodes().to_vec();
        for node in nodes {
            if !self.batch.has_room(6) {
                self.flush();
            }
            let p0 = origin + Vec2::new(node.x as f32, node.y as f32);
            self.batch.push_quad(
                &Quad {
                    p0,
                    p1: p0 + Vec2::new(node.width as f32, 1.),
                    uv0: white,
                    uv1: white,
                },
                0xc000_00ff,
            );
        }

        self.flush();
    }
}
