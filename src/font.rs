//! The font registry.
//!
//! Fonts are parsed by the context's [`Rasterizer`] and never
//! removed. Each font owns the cache of glyphs requested through it.

use ahash::AHashMap;
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};

use crate::{backend::Rasterizer, error::MalformedFont, glyph::GlyphStore};

/// Maximum number of fallback fonts per font.
pub const MAX_FALLBACKS: usize = 20;

/// Identifies a font registered with a [`TextContext`](crate::TextContext).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FontId(usize);

impl FontId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) struct Font<F> {
    pub name: SmartString<LazyCompact>,
    /// The raw font file. Kept for the lifetime of the context
    /// since some rasterizers borrow from it.
    #[allow(dead_code)]
    data: Vec<u8>,
    pub handle: F,
    /// Vertical metrics normalized to the em height.
    pub ascender: f32,
    pub descender: f32,
    pub lineh: f32,
    pub glyphs: GlyphStore,
    pub fallbacks: SmallVec<[FontId; 4]>,
}

impl<F> Font<F> {
    pub fn load<R>(rasterizer: &mut R, name: &str, data: Vec<u8>) -> Result<Self, MalformedFont>
    where
        R: Rasterizer<Font = F>,
    {
        let handle = rasterizer.load_font(&data)?;
        let metrics = rasterizer.v_metrics(&handle);
        let height = (metrics.ascent - metrics.descent) as f32;
        let height = if height == 0. { 1. } else { height };

        Ok(Self {
            name: name.into(),
            data,
            handle,
            ascender: metrics.ascent as f32 / height,
            descender: metrics.descent as f32 / height,
            lineh: (height + metrics.line_gap as f32) / height,
            glyphs: GlyphStore::new(),
            fallbacks: SmallVec::new(),
        })
    }
}

/// The fonts available to a `TextContext`.
pub(crate) struct Fonts<F> {
    fonts: Vec<Font<F>>,
    by_name: AHashMap<SmartString<LazyCompact>, FontId>,
}

impl<F> Default for Fonts<F> {
    fn default() -> Self {
        Self {
            fonts: Vec::new(),
            by_name: AHashMap::new(),
        }
    }
}

impl<F> Fonts<F> {
    pub fn add(&mut self, font: Font<F>) -> FontId {
        let id = FontId(self.fonts.len());
        // Lookups by name resolve to the first font registered under it.
        self.by_name.entry(font.name.clone()).or_insert(id);
        self.fonts.push(font);
        id
    }

    pub fn get(&self, id: FontId) -> Option<&Font<F>> {
        self.fonts.get(id.0)
    }

    pub fn get_mut(&mut self, id: FontId) -> Option<&mut Font<F>> {
        self.fonts.get_mut(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<FontId> {
        self.by_name.get(name).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Font<F>> {
        self.fonts.iter_mut()
    }

    /// Registers `fallback` to be searched when `base` lacks a glyph.
    pub fn add_fallback(&mut self, base: FontId, fallback: FontId) -> bool {
        if self.get(fallback).is_none() {
            log::warn!("Ignoring unknown fallback font {:?}", fallback);
            return false;
        }
        let font = match self.get_mut(base) {
            Some(font) => font,
            None => {
                log::warn!("Cannot add a fallback to unknown font {:?}", base);
                return false;
            }
        };
        if font.fallbacks.len() >= MAX_FALLBACKS {
            log::warn!(
                "Font '{}' already has {} fallbacks; ignoring {:?}",
                font.name,
                MAX_FALLBACKS,
                fallback
            );
            return false;
        }
        font.fallbacks.push(fallback);
        true
    }

    /// Finds the font that should render `codepoint` for `base`, together
    /// with the glyph index in that font.
    ///
    /// Fallbacks are searched in registration order when `base` maps the
    /// codepoint to the missing glyph. If no font has it, the missing
    /// glyph of `base` is returned.
    pub fn resolve<R>(&self, rasterizer: &R, base: FontId, codepoint: char) -> Option<(FontId, u32)>
    where
        R: Rasterizer<Font = F>,
    {
        let font = self.get(base)?;
        let index = rasterizer.glyph_index(&font.handle, codepoint);
        if index != 0 {
            return Some((base, index));
        }

        let fallback = font.fallbacks.iter().find_map(|&id| {
            let fallback = self.get(id)?;
            match rasterizer.glyph_index(&fallback.handle, codepoint) {
                0 => None,
                index => Some((id, index)),
            }
        });
        Some(fallback.unwrap_or((base, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubRasterizer;

    fn load(rasterizer: &mut StubRasterizer, name: &str, chars: &str) -> Font<crate::testing::StubFont> {
        Font::load(rasterizer, name, format!("STUB{}", chars).into_bytes()).unwrap()
    }

    #[test]
    fn metrics_are_normalized() {
        let mut rasterizer = StubRasterizer::new();
        let font = load(&mut rasterizer, "sans", "");
        assert!((font.ascender - 0.8).abs() < 1e-6);
        assert!((font.descender + 0.2).abs() < 1e-6);
        assert!((font.lineh - 1.2).abs() < 1e-6);
    }

    #[test]
    fn names_resolve_to_first_registration() {
        let mut rasterizer = StubRasterizer::new();
        let mut fonts = Fonts::default();
        let first = fonts.add(load(&mut rasterizer, "sans", ""));
        let _second = fonts.add(load(&mut rasterizer, "sans", ""));
        assert_eq!(fonts.by_name("sans"), Some(first));
        assert_eq!(fonts.by_name("serif"), None);
        assert_eq!(fonts.len(), 2);
    }

    #[test]
    fn fallbacks_are_searched_in_order() {
        let mut rasterizer = StubRasterizer::new();
        let mut fonts = Fonts::default();
        let latin = fonts.add(load(&mut rasterizer, "latin", "ab"));
        let greek = fonts.add(load(&mut rasterizer, "greek", "αβ"));
        let everything = fonts.add(load(&mut rasterizer, "everything", ""));

        assert!(fonts.add_fallback(latin, greek));
        assert!(fonts.add_fallback(latin, everything));

        assert_eq!(fonts.resolve(&rasterizer, latin, 'a').map(|r| r.0), Some(latin));
        assert_eq!(fonts.resolve(&rasterizer, latin, 'β').map(|r| r.0), Some(greek));
        assert_eq!(fonts.resolve(&rasterizer, latin, 'z').map(|r| r.0), Some(everything));
        assert_eq!(fonts.resolve(&rasterizer, greek, 'z'), Some((greek, 0)));
    }

    #[test]
    fn fallbacks_are_capped() {
        let mut rasterizer = StubRasterizer::new();
        let mut fonts = Fonts::default();
        let base = fonts.add(load(&mut rasterizer, "base", ""));
        let other = fonts.add(load(&mut rasterizer, "other", ""));
        for _ in 0..MAX_FALLBACKS {
            assert!(fonts.add_fallback(base, other));
        }
        assert!(!fonts.add_fallback(base, other));
        assert!(!fonts.add_fallback(base, FontId(99)));
        assert!(!fonts.add_fallback(FontId(99), base));
    }
}
