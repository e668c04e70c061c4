//! Test doubles for the backend traits.

use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use glam::Vec2;

use crate::{
    backend::{GlyphBounds, Rasterizer, RenderBackend, VMetrics},
    error::MalformedFont,
    texture::DirtyRect,
    TextContext,
};

const MAGIC: &[u8] = b"STUB";
const UNITS_PER_EM: f32 = 1000.;
const ADVANCE: i32 = 500;
const GLYPH_HEIGHT: f32 = 700.;

/// Font data understood by [`StubRasterizer`]: the glyphs it covers,
/// or every codepoint if `chars` is empty.
pub fn stub_font(chars: &str) -> Vec<u8> {
    let mut data = MAGIC.to_vec();
    data.extend_from_slice(chars.as_bytes());
    data
}

#[derive(Debug)]
pub struct StubFont {
    chars: Vec<char>,
}

impl StubFont {
    fn char_of(&self, index: u32) -> Option<char> {
        if self.chars.is_empty() {
            char::from_u32(index)
        } else {
            let i = (index as usize).checked_sub(1)?;
            self.chars.get(i).copied()
        }
    }
}

/// A synthetic font engine: ascent 800, descent -200, line gap 200 on
/// a 1000 unit em. Every glyph is a solid box 500 units wide and 700
/// tall, and "AV" kerns by -100 units.
#[derive(Debug, Default)]
pub struct StubRasterizer {
    pub render_calls: usize,
    pub last_codepoint: Cell<Option<char>>,
}

impl StubRasterizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rasterizer for StubRasterizer {
    type Font = StubFont;

    fn load_font(&mut self, data: &[u8]) -> Result<StubFont, MalformedFont> {
        let chars = data.strip_prefix(MAGIC).ok_or(MalformedFont)?;
        let chars = std::str::from_utf8(chars).map_err(|_| MalformedFont)?;
        Ok(StubFont {
            chars: chars.chars().collect(),
        })
    }

    fn v_metrics(&self, _font: &StubFont) -> VMetrics {
        VMetrics {
            ascent: 800,
            descent: -200,
            line_gap: 200,
        }
    }

    fn scale_for_size(&self, _font: &StubFont, size: f32) -> f32 {
        size / UNITS_PER_EM
    }

    fn glyph_index(&self, font: &StubFont, codepoint: char) -> u32 {
        self.last_codepoint.set(Some(codepoint));
        if font.chars.is_empty() {
            u32::from(codepoint)
        } else {
            font.chars
                .iter()
                .position(|&c| c == codepoint)
                .map_or(0, |i| i as u32 + 1)
        }
    }

    fn glyph_bitmap_bounds(
        &mut self,
        _font: &StubFont,
        _glyph: u32,
        _size: f32,
        scale: f32,
    ) -> GlyphBounds {
        GlyphBounds {
            advance: ADVANCE,
            lsb: 0,
            x0: 0,
            y0: -(GLYPH_HEIGHT * scale).round() as i32,
            x1: (ADVANCE as f32 * scale).round() as i32,
            y1: 0,
        }
    }

    fn render_glyph(
        &mut self,
        _font: &StubFont,
        output: &mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        _scale: f32,
        _glyph: u32,
    ) {
        self.render_calls += 1;
        for row in 0..height {
            output[row * stride..row * stride + width].fill(0xff);
        }
    }

    fn kern_advance(&self, font: &StubFont, left: u32, right: u32) -> f32 {
        match (font.char_of(left), font.char_of(right)) {
            (Some('A'), Some('V')) => -100.,
            _ => 0.,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub positions: Vec<Vec2>,
    pub texcoords: Vec<Vec2>,
    pub colors: Vec<u32>,
}

/// Records every call made by the context.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub created: Option<(u32, u32)>,
    pub resizes: Vec<(u32, u32)>,
    pub updates: Vec<DirtyRect>,
    pub draws: Vec<DrawCall>,
    pub deleted: Arc<AtomicUsize>,

    pub fail_create: bool,
    pub fail_resize: bool,
}

impl RenderBackend for RecordingBackend {
    fn create(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if self.fail_create {
            anyhow::bail!("no device");
        }
        self.created = Some((width, height));
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if self.fail_resize {
            anyhow::bail!("texture too large");
        }
        self.resizes.push((width, height));
        Ok(())
    }

    fn update_texture(&mut self, dirty: DirtyRect, data: &[u8], width: u32) {
        assert!(!dirty.is_empty());
        assert_eq!(data.len() % width as usize, 0);
        self.updates.push(dirty);
    }

    fn draw_triangles(&mut self, positions: &[Vec2], texcoords: &[Vec2], colors: &[u32]) {
        assert_eq!(positions.len() % 3, 0);
        assert_eq!(positions.len(), texcoords.len());
        assert_eq!(positions.len(), colors.len());
        self.draws.push(DrawCall {
            positions: positions.to_vec(),
            texcoords: texcoords.to_vec(),
            colors: colors.to_vec(),
        });
    }

    fn delete(&mut self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }
}

/// A context over the test doubles with a `width × height` atlas.
pub fn context(width: u32, height: u32) -> TextContext<StubRasterizer, RecordingBackend> {
    TextContext::builder(StubRasterizer::new(), RecordingBackend::default())
        .atlas_size(width, height)
        .build()
        .unwrap()
}
