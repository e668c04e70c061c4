//! The per-font glyph cache and the render-on-miss path.

use crate::{
    backend::{Rasterizer, RenderBackend},
    error::StashError,
    font::FontId,
    texture::GlyphPlacement,
    TextContext,
};

/// Number of hash buckets per font.
pub const HASH_LUT_SIZE: usize = 256;

/// Blur radii above this are clamped.
pub const MAX_BLUR: i16 = 20;

/// Initial capacity of each font's glyph slab.
const INIT_GLYPHS: usize = 256;

/// A glyph that has been rasterized into the atlas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Glyph {
    pub codepoint: char,
    /// Glyph index within `font`.
    pub index: u32,
    /// The font that rendered the glyph. Differs from the font owning
    /// the cache entry when a fallback was used.
    pub font: FontId,
    /// Size in tenths of a pixel.
    pub size: i16,
    pub blur: i16,
    /// The padded atlas rectangle.
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    /// Advance in tenths of a pixel.
    pub xadv: i32,
    /// Offset of the padded rectangle from the pen position.
    pub xoff: i32,
    pub yoff: i32,
    next: Option<u32>,
}

/// Integer hash used to pick a glyph's bucket.
fn hash_codepoint(codepoint: char) -> usize {
    let mut a = u32::from(codepoint);
    a = a.wrapping_add(!(a << 15));
    a ^= a >> 10;
    a = a.wrapping_add(a << 3);
    a ^= a >> 6;
    a = a.wrapping_add(!(a << 11));
    a ^= a >> 16;
    a as usize & (HASH_LUT_SIZE - 1)
}

/// Glyph slab with chained hash buckets holding slab indices.
pub(crate) struct GlyphStore {
    glyphs: Vec<Glyph>,
    lut: [Option<u32>; HASH_LUT_SIZE],
}

impl GlyphStore {
    pub fn new() -> Self {
        Self {
            glyphs: Vec::with_capacity(INIT_GLYPHS),
            lut: [None; HASH_LUT_SIZE],
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn find(&self, codepoint: char, size: i16, blur: i16) -> Option<Glyph> {
        let mut cursor = self.lut[hash_codepoint(codepoint)];
        while let Some(i) = cursor {
            let glyph = &self.glyphs[i as usize];
            if glyph.codepoint == codepoint && glyph.size == size && glyph.blur == blur {
                return Some(*glyph);
            }
            cursor = glyph.next;
        }
        None
    }

    pub fn insert(&mut self, mut glyph: Glyph) {
        let bucket = hash_codepoint(glyph.codepoint);
        glyph.next = self.lut[bucket];
        self.lut[bucket] = Some(self.glyphs.len() as u32);
        self.glyphs.push(glyph);
    }

    pub fn clear(&mut self) {
        self.glyphs.clear();
        self.lut = [None; HASH_LUT_SIZE];
    }
}

/// Glyph cache counters since the last atlas reset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Requests answered from the cache.
    pub hits: u64,
    /// Requests that had to rasterize, including failed attempts.
    pub misses: u64,
}

impl<R, B> TextContext<R, B>
where
    R: Rasterizer,
    B: RenderBackend,
{
    /// Looks up a glyph, rasterizing it into the atlas on a miss.
    ///
    /// `size` is in tenths of a pixel and `blur` in whole pixels.
    /// Returns `None` for sizes below 0.2px, unknown fonts, or when the
    /// glyph could not be placed; in the latter case nothing is cached.
    pub(crate) fn glyph(
        &mut self,
        font: FontId,
        codepoint: char,
        size: i16,
        blur: i16,
    ) -> Option<Glyph> {
        if size < 2 {
            return None;
        }
        let blur = blur.clamp(0, MAX_BLUR);
        let pad = i32::from(blur) + 2;
        self.scratch.reset();

        if let Some(glyph) = self.fonts.get(font)?.glyphs.find(codepoint, size, blur) {
            self.stats.hits += 1;
            return Some(glyph);
        }
        self.stats.misses += 1;

        let (render_font, index) = self.fonts.resolve(&self.rasterizer, font, codepoint)?;
        let handle = &self.fonts.get(render_font)?.handle;
        let pixel_size = f32::from(size) / 10.;
        let scale = self.rasterizer.scale_for_size(handle, pixel_size);
        let bounds = self
            .rasterizer
            .glyph_bitmap_bounds(handle, index, pixel_size, scale);

        let bitmap_width = bounds.width().max(0) as usize;
        let bitmap_height = bounds.height().max(0) as usize;
        let block = match self.scratch.alloc(bitmap_width * bitmap_height) {
            Ok(block) => block,
            Err(requested) => {
                self.report(StashError::ScratchFull { requested });
                return None;
            }
        };
        self.rasterizer.render_glyph(
            handle,
            self.scratch.block_mut(block.clone()),
            bitmap_width,
            bitmap_height,
            bitmap_width,
            scale,
            index,
        );

        let width = bitmap_width as i32 + pad * 2;
        let height = bitmap_height as i32 + pad * 2;
        let (x, y) = match self.texture.allocate(width, height) {
            Some(pos) => pos,
            None => {
                let recovery = self.report(StashError::AtlasFull);
                // A reset clears every glyph store but not the scratch bitmap.
                let retry = if self.recover(recovery) {
                    self.texture.allocate(width, height)
                } else {
                    None
                };
                match retry {
                    Some(pos) => pos,
                    None => {
                        log::warn!(
                            "No atlas space for {:?} at {}px; glyph dropped",
                            codepoint,
                            pixel_size
                        );
                        return None;
                    }
                }
            }
        };

        self.texture.write_glyph(
            GlyphPlacement {
                x,
                y,
                width,
                height,
                pad,
                blur: i32::from(blur),
            },
            self.scratch.block(block),
            bitmap_width,
            bitmap_height,
        );

        let glyph = Glyph {
            codepoint,
            index,
            font: render_font,
            size,
            blur,
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
            xadv: (scale * bounds.advance as f32 * 10.) as i32,
            xoff: bounds.x0 - pad,
            yoff: bounds.y0 - pad,
            next: None,
        };
        self.fonts.get_mut(font)?.glyphs.insert(glyph);
        log::debug!(
            "Rasterized {:?} at {}px (blur {}) into {}x{} at ({}, {})",
            codepoint,
            pixel_size,
            blur,
            width,
            height,
            x,
            y
        );
        Some(glyph)
    }
}
