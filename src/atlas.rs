//! Skyline bin packer for the glyph atlas.
//!
//! Based on the skyline bottom-left heuristic described by
//! Jukka Jylänki in "A Thousand Ways to Pack the Bin".
//!
//! Unlike the guillotine allocators used for sprite atlases, the
//! skyline never frees individual rectangles. Space is reclaimed
//! only by resetting the whole atlas, which matches how glyphs are
//! cached: they live until the cache is flushed.

/// Initial capacity of the skyline node list.
const INIT_ATLAS_NODES: usize = 256;

/// One horizontal segment of the skyline.
///
/// `y` is the height of the skyline across `x..x + width`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AtlasNode {
    pub x: i32,
    pub y: i32,
    pub width: i32,
}

/// A skyline over a `width × height` area.
///
/// Nodes are sorted by `x`, contiguous, and cover exactly `0..width`.
#[derive(Clone, Debug)]
pub struct Atlas {
    width: i32,
    height: i32,
    nodes: Vec<AtlasNode>,
}

impl Atlas {
    pub fn new(width: i32, height: i32) -> Self {
        let mut nodes = Vec::with_capacity(INIT_ATLAS_NODES);
        nodes.push(AtlasNode {
            x: 0,
            y: 0,
            width,
        });
        Self {
            width,
            height,
            nodes,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn nodes(&self) -> &[AtlasNode] {
        &self.nodes
    }

    /// The highest point of the skyline. Everything below
    /// this line may contain packed content.
    pub fn max_height(&self) -> i32 {
        self.nodes.iter().map(|node| node.y).max().unwrap_or(0)
    }

    /// Grows the packable area. Existing placements are kept as-is.
    ///
    /// The atlas never shrinks; smaller dimensions are ignored.
    pub fn expand(&mut self, width: i32, height: i32) {
        if width > self.width {
            let added = width - self.width;
            match self.nodes.last_mut() {
                Some(last) if last.y == 0 => last.width += added,
                _ => self.nodes.push(AtlasNode {
                    x: self.width,
                    y: 0,
                    width: added,
                }),
            }
            self.width = width;
        }
        self.height = self.height.max(height);
    }

    /// Discards all placements and reinitializes the skyline.
    pub fn reset(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
        self.nodes.clear();
        self.nodes.push(AtlasNode {
            x: 0,
            y: 0,
            width,
        });
    }

    /// Finds a place for a `width × height` rectangle, returning its
    /// top-left corner.
    ///
    /// Returns `None` and leaves the skyline untouched if the
    /// rectangle does not fit anywhere.
    pub fn add_rect(&mut self, width: i32, height: i32) -> Option<(i32, i32)> {
        if width <= 0 || height <= 0 {
            return None;
        }

        // (top, node width, node index, x, y) of the best placement so far.
        let mut best: Option<(i32, i32, usize, i32, i32)> = None;

        for (i, node) in self.nodes.iter().enumerate() {
            let y = match self.rect_fits(i, width, height) {
                Some(y) => y,
                None => continue,
            };
            let top = y + height;
            let better = match best {
                None => true,
                Some((best_top, best_width, ..)) => {
                    top < best_top || (top == best_top && node.width < best_width)
                }
            };
            if better {
                best = Some((top, node.width, i, node.x, y));
            }
        }

        let (_, _, index, x, y) = best?;
        self.add_skyline_level(index, x, y, width, height);
        Some((x, y))
    }

    /// Computes the height at which a rectangle starting at node `i`
    /// would come to rest, like a tetris block dropped onto the skyline.
    fn rect_fits(&self, i: usize, width: i32, height: i32) -> Option<i32> {
        let x = self.nodes[i].x;
        if x + width > self.width {
            return None;
        }

        let mut y = self.nodes[i].y;
        let mut space_left = width;
        for node in &self.nodes[i..] {
            if space_left <= 0 {
                break;
            }
            y = y.max(node.y);
            if y + height > self.height {
                return None;
            }
            space_left -= node.width;
        }

        if space_left > 0 {
            None
        } else {
            Some(y)
        }
    }

    fn add_skyline_level(&mut self, index: usize, x: i32, y: i32, width: i32, height: i32) {
        self.nodes.insert(
            index,
            AtlasNode {
                x,
                y: y + height,
                width,
            },
        );

        // Trim the segments that now lie in the shadow of the new one.
        let i = index + 1;
        while i < self.nodes.len() {
            let prev = self.nodes[i - 1];
            let prev_end = prev.x + prev.width;
            let node = &mut self.nodes[i];
            if node.x >= prev_end {
                break;
            }

            let shrink = prev_end - node.x;
            node.x += shrink;
            node.width -= shrink;
            if node.width > 0 {
                break;
            }
            self.nodes.remove(i);
        }

        // Merge neighbours at the same height.
        self.nodes.dedup_by(|next, prev| {
            if next.y == prev.y {
                prev.width += next.width;
                true
            } else {
                false
            }
        });
    }
}
