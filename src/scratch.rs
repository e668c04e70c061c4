//! Bump allocator for transient glyph bitmaps.

use std::ops::Range;

/// A fixed-capacity bump arena.
///
/// Glyph bitmaps are rasterized here before being copied into the
/// atlas, so a glyph that cannot be placed never leaves partial
/// pixels behind. The arena is rewound before every glyph build.
pub(crate) struct Scratch {
    buf: Vec<u8>,
    used: usize,
}

impl Scratch {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            used: 0,
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Allocates `size` zeroed bytes, 16-byte aligned within the arena,
    /// and returns their range.
    ///
    /// On failure, returns the total number of bytes that
    /// would have been needed.
    pub fn alloc(&mut self, size: usize) -> Result<Range<usize>, usize> {
        let aligned = (size + 0xf) & !0xf;
        let end = self.used + aligned;
        if end > self.buf.len() {
            return Err(end);
        }

        let block = self.used..self.used + size;
        self.used = end;
        self.buf[block.clone()].fill(0);
        Ok(block)
    }

    pub fn block(&self, range: Range<usize>) -> &[u8] {
        &self.buf[range]
    }

    pub fn block_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        &mut self.buf[range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_aligned_and_bounded() {
        let mut scratch = Scratch::new(64);
        assert_eq!(scratch.alloc(10), Ok(0..10));
        assert_eq!(scratch.alloc(33), Ok(16..49));
        // 16 + 48 bytes used, nothing left. The request is reported
        // as the aligned total it would have needed.
        assert_eq!(scratch.alloc(1), Err(80));

        scratch.reset();
        assert_eq!(scratch.alloc(64), Ok(0..64));
    }

    #[test]
    fn blocks_are_zeroed() {
        let mut scratch = Scratch::new(32);
        let block = scratch.alloc(32).unwrap();
        scratch.block_mut(block).fill(7);
        scratch.reset();
        let block = scratch.alloc(32).unwrap();
        assert!(scratch.block(block).iter().all(|&b| b == 0));
    }
}
