//! Incremental UTF-8 decoding.
//!
//! Text is fed to the glyph cache one codepoint at a time. The decoder
//! consumes a byte at a time so that the text iterator can stop after
//! each codepoint and resume later from a byte offset.
//!
//! Malformed input never aborts decoding: each maximal invalid
//! subsequence decodes to U+FFFD, following the WHATWG decoder.

/// The result of feeding one byte to a [`Utf8Decoder`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// A complete codepoint was decoded.
    Char(char),
    /// The byte was part of a multi-byte sequence that is not complete yet.
    Pending,
    /// The byte does not continue a valid sequence.
    ///
    /// If `consumed` is `false`, the byte interrupted a sequence
    /// and must be fed again to start a new one.
    Invalid { consumed: bool },
}

/// A stateful, allocation-free UTF-8 decoder.
#[derive(Copy, Clone, Debug)]
pub struct Utf8Decoder {
    codepoint: u32,
    needed: u8,
    seen: u8,
    lower: u8,
    upper: u8,
}

impl Default for Utf8Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Utf8Decoder {
    pub const fn new() -> Self {
        Self {
            codepoint: 0,
            needed: 0,
            seen: 0,
            lower: 0x80,
            upper: 0xBF,
        }
    }

    /// Whether the decoder is between codepoints.
    pub fn is_idle(&self) -> bool {
        self.needed == 0
    }

    pub fn push(&mut self, byte: u8) -> Step {
        if self.needed == 0 {
            match byte {
                0x00..=0x7F => return Step::Char(char::from(byte)),
                0xC2..=0xDF => {
                    self.needed = 1;
                    self.codepoint = u32::from(byte & 0x1F);
                }
                0xE0..=0xEF => {
                    if byte == 0xE0 {
                        self.lower = 0xA0;
                    } else if byte == 0xED {
                        self.upper = 0x9F;
                    }
                    self.needed = 2;
                    self.codepoint = u32::from(byte & 0x0F);
                }
                0xF0..=0xF4 => {
                    if byte == 0xF0 {
                        self.lower = 0x90;
                    } else if byte == 0xF4 {
                        self.upper = 0x8F;
                    }
                    self.needed = 3;
                    self.codepoint = u32::from(byte & 0x07);
                }
                _ => return Step::Invalid { consumed: true },
            }
            return Step::Pending;
        }

        if byte < self.lower || byte > self.upper {
            *self = Self::new();
            return Step::Invalid { consumed: false };
        }

        self.lower = 0x80;
        self.upper = 0xBF;
        self.codepoint = (self.codepoint << 6) | u32::from(byte & 0x3F);
        self.seen += 1;

        if self.seen != self.needed {
            return Step::Pending;
        }

        let codepoint = self.codepoint;
        *self = Self::new();
        // The range checks above exclude surrogates and values past U+10FFFF.
        Step::Char(char::from_u32(codepoint).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

/// Iterator over the codepoints of a byte slice.
///
/// Yields `(start, char)` pairs where `start` is the byte offset
/// at which the codepoint begins.
#[derive(Clone, Debug)]
pub struct Utf8Chars<'a> {
    bytes: &'a [u8],
    pos: usize,
    decoder: Utf8Decoder,
}

impl<'a> Utf8Chars<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            decoder: Utf8Decoder::new(),
        }
    }

    /// Byte offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for Utf8Chars<'a> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        while let Some(&byte) = self.bytes.get(self.pos) {
            match self.decoder.push(byte) {
                Step::Char(c) => {
                    self.pos += 1;
                    return Some((start, c));
                }
                Step::Pending => self.pos += 1,
                Step::Invalid { consumed } => {
                    if consumed {
                        self.pos += 1;
                    }
                    return Some((start, char::REPLACEMENT_CHARACTER));
                }
            }
        }

        // Truncated sequence at the end of input.
        if !self.decoder.is_idle() {
            self.decoder = Utf8Decoder::new();
            return Some((start, char::REPLACEMENT_CHARACTER));
        }
        None
    }
}
