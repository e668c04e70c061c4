//! Draw state and the bounded state stack.

use palette::Srgba;
use serde::{Deserialize, Serialize};

use crate::{error::StashError, font::FontId};

/// Horizontal text alignment relative to the pen position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Align {
    /// The pen position is the left edge of the text.
    Start,
    /// The pen position is the horizontal center of the text.
    Center,
    /// The pen position is the right edge of the text.
    End,
}

impl Default for Align {
    fn default() -> Self {
        Align::Start
    }
}

/// Vertical text alignment relative to the pen position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Baseline {
    /// Top of the em box.
    Top,
    /// Halfway between ascender and descender.
    Middle,
    Alphabetic,
    /// Bottom of the em box.
    Bottom,
}

impl Default for Baseline {
    fn default() -> Self {
        Baseline::Alphabetic
    }
}

/// Which corner of the render target is `(0, 0)`.
///
/// Determines whether positive `y` moves down the screen
/// (`TopLeft`) or up (`BottomLeft`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    TopLeft,
    BottomLeft,
}

impl Default for Origin {
    fn default() -> Self {
        Origin::TopLeft
    }
}

impl Origin {
    /// Multiplier applied to distances measured downward.
    pub(crate) fn down(self) -> f32 {
        match self {
            Origin::TopLeft => 1.,
            Origin::BottomLeft => -1.,
        }
    }
}

/// Creates an sRGB color from 8-bit components.
pub fn rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Srgba<u8> {
    Srgba::new(red, green, blue, alpha)
}

/// Packs a color as the render backend expects it: red in the low byte.
pub(crate) fn pack_color(color: Srgba<u8>) -> u32 {
    u32::from_le_bytes([color.red, color.green, color.blue, color.alpha])
}

/// Parameters applied to subsequent draw and measure calls.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawState {
    pub font: Option<FontId>,
    /// Font size in pixels.
    pub size: f32,
    pub color: Srgba<u8>,
    /// Blur radius in pixels.
    pub blur: f32,
    /// Extra space between glyphs in pixels.
    pub spacing: f32,
    pub align: Align,
    pub baseline: Baseline,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            font: None,
            size: 12.,
            color: rgba(255, 255, 255, 255),
            blur: 0.,
            spacing: 0.,
            align: Align::Start,
            baseline: Baseline::Alphabetic,
        }
    }
}

/// A stack of [`DrawState`]s that never becomes empty.
#[derive(Debug)]
pub(crate) struct StateStack {
    states: Vec<DrawState>,
    max_states: usize,
}

impl StateStack {
    pub fn new(max_states: usize) -> Self {
        let max_states = max_states.max(1);
        let mut states = Vec::with_capacity(max_states);
        states.push(DrawState::default());
        Self { states, max_states }
    }

    pub fn depth(&self) -> usize {
        self.states.len()
    }

    pub fn top(&self) -> &DrawState {
        // The base state is never popped.
        &self.states[self.states.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut DrawState {
        let top = self.states.len() - 1;
        &mut self.states[top]
    }

    /// Pushes a copy of the current state.
    pub fn push(&mut self) -> Result<(), StashError> {
        if self.states.len() >= self.max_states {
            return Err(StashError::StatesOverflow);
        }
        let top = *self.top();
        self.states.push(top);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<(), StashError> {
        if self.states.len() <= 1 {
            return Err(StashError::StatesUnderflow);
        }
        self.states.pop();
        Ok(())
    }

    /// Resets the current state to the defaults.
    pub fn clear(&mut self) {
        *self.top_mut() = DrawState::default();
    }
}
