//! The CPU-side atlas bitmap shared by all fonts.

use crate::{atlas::Atlas, blur::blur};

/// A region of the atlas bitmap that changed since the last upload.
///
/// Coordinates are in pixels, `max` exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl DirtyRect {
    /// The inverted rectangle meaning "nothing dirty".
    pub fn empty(width: i32, height: i32) -> Self {
        Self {
            min_x: width,
            min_y: height,
            max_x: 0,
            max_y: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    fn include(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        self.min_x = self.min_x.min(x0);
        self.min_y = self.min_y.min(y0);
        self.max_x = self.max_x.max(x1);
        self.max_y = self.max_y.max(y1);
    }
}

/// Where a glyph bitmap goes in the atlas.
#[derive(Copy, Clone, Debug)]
pub(crate) struct GlyphPlacement {
    /// Top-left corner of the padded rectangle.
    pub x: i32,
    pub y: i32,
    /// Size of the padded rectangle.
    pub width: i32,
    pub height: i32,
    pub pad: i32,
    pub blur: i32,
}

/// An 8-bit coverage bitmap together with the skyline packing it
/// and the region that still needs uploading.
pub(crate) struct AtlasTexture {
    data: Vec<u8>,
    width: i32,
    height: i32,
    packer: Atlas,
    dirty: DirtyRect,
}

impl AtlasTexture {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            data: vec![0; (width * height) as usize],
            width,
            height,
            packer: Atlas::new(width, height),
            dirty: DirtyRect::empty(width, height),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn packer(&self) -> &Atlas {
        &self.packer
    }

    #[cfg(test)]
    pub fn dirty(&self) -> DirtyRect {
        self.dirty
    }

    /// Returns the dirty region, if any, and marks everything clean.
    pub fn take_dirty(&mut self) -> Option<DirtyRect> {
        if self.dirty.is_empty() {
            return None;
        }
        let dirty = self.dirty;
        self.dirty = DirtyRect::empty(self.width, self.height);
        Some(dirty)
    }

    pub fn allocate(&mut self, width: i32, height: i32) -> Option<(i32, i32)> {
        self.packer.add_rect(width, height)
    }

    /// Packs an opaque block, used to draw solid shapes
    /// with the same texture as the text.
    pub fn add_white_rect(&mut self, width: i32, height: i32) {
        let (x, y) = match self.allocate(width, height) {
            Some(pos) => pos,
            None => return,
        };
        for row in y..y + height {
            let start = (row * self.width + x) as usize;
            self.data[start..start + width as usize].fill(0xff);
        }
        self.dirty.include(x, y, x + width, y + height);
    }

    /// Copies a rasterized glyph into its padded slot, clears the slot's
    /// outer ring and applies the blur.
    ///
    /// `bitmap` is `bitmap_width` bytes per row.
    pub fn write_glyph(
        &mut self,
        placement: GlyphPlacement,
        bitmap: &[u8],
        bitmap_width: usize,
        bitmap_height: usize,
    ) {
        let GlyphPlacement {
            x,
            y,
            width,
            height,
            pad,
            blur: radius,
        } = placement;
        let stride = self.width as usize;

        if bitmap_width > 0 {
            for (row, src) in bitmap.chunks_exact(bitmap_width).take(bitmap_height).enumerate() {
                let start = (y + pad) as usize * stride + (x + pad) as usize + row * stride;
                self.data[start..start + bitmap_width].copy_from_slice(src);
            }
        }

        // One pixel empty border so neighbours never leak into each other.
        let (w, h) = (width as usize, height as usize);
        let origin = y as usize * stride + x as usize;
        for row in 0..h {
            self.data[origin + row * stride] = 0;
            self.data[origin + row * stride + w - 1] = 0;
        }
        self.data[origin..origin + w].fill(0);
        let last = origin + (h - 1) * stride;
        self.data[last..last + w].fill(0);

        if radius > 0 {
            blur(&mut self.data[origin..], w, h, stride, radius);
        }

        self.dirty.include(x, y, x + width, y + height);
    }

    /// Grows the bitmap, keeping existing pixels at their coordinates.
    pub fn expand(&mut self, width: i32, height: i32) {
        let mut data = vec![0; (width * height) as usize];
        let (old_width, old_height) = (self.width as usize, self.height as usize);
        for (dst, src) in data
            .chunks_exact_mut(width as usize)
            .zip(self.data.chunks_exact(old_width))
            .take(old_height)
        {
            dst[..old_width].copy_from_slice(src);
        }

        self.data = data;
        self.packer.expand(width, height);

        // Everything under the skyline has to be re-uploaded
        // into the recreated texture.
        let max_y = self.packer.max_height();
        self.dirty.include(0, 0, self.width, max_y);

        self.width = width;
        self.height = height;
    }

    /// Clears all pixels and placements.
    pub fn reset(&mut self, width: i32, height: i32) {
        self.data.clear();
        self.data.resize((width * height) as usize, 0);
        self.width = width;
        self.height = height;
        self.packer.reset(width, height);
        self.dirty = DirtyRect::empty(width, height);
    }
}
