//! Grid font atlas and glyph layout
//!
//! Glyphs are laid out on a monospace grid: the atlas texture holds
//! `columns x rows` equally sized cells starting at `first_char`.

use crate::foundation::math::{Colour, WHITE};
use crate::resources::{TextureHandle, UvRect};

/// Monospace bitmap font packed into one texture
#[derive(Debug, Clone, PartialEq)]
pub struct FontAtlas {
    /// Atlas texture
    pub texture: TextureHandle,
    /// Cells per row
    pub columns: u32,
    /// Rows of cells
    pub rows: u32,
    /// Character stored in the first cell
    pub first_char: char,
    /// Horizontal advance relative to the glyph height
    pub advance: f32,
    /// Line height relative to the glyph height
    pub line_height: f32,
}

impl FontAtlas {
    /// ASCII atlas of 16x6 cells starting at the space character
    pub fn ascii(texture: TextureHandle) -> Self {
        Self {
            texture,
            columns: 16,
            rows: 6,
            first_char: ' ',
            advance: 0.6,
            line_height: 1.2,
        }
    }

    /// Texture region of `ch`, `None` when the atlas does not contain it
    pub fn glyph_uv(&self, ch: char) -> Option<UvRect> {
        let index = (ch as u32).checked_sub(self.first_char as u32)?;
        if index >= self.columns * self.rows {
            return None;
        }
        let cell_w = 1.0 / self.columns as f32;
        let cell_h = 1.0 / self.rows as f32;
        let col = (index % self.columns) as f32;
        let row = (index / self.columns) as f32;
        Some(UvRect::new(
            [col * cell_w, row * cell_h],
            [(col + 1.0) * cell_w, (row + 1.0) * cell_h],
        ))
    }

    /// Position (bottom-left, in glyph-height units) and region of every
    /// drawable glyph in `text`. Newlines start a new line below; glyphs the
    /// atlas lacks still advance the cursor.
    pub fn layout(&self, text: &str) -> Vec<([f32; 2], UvRect)> {
        let mut glyphs = Vec::with_capacity(text.len());
        let mut cursor = [0.0f32, 0.0f32];
        for ch in text.chars() {
            if ch == '\n' {
                cursor = [0.0, cursor[1] - self.line_height];
                continue;
            }
            if !ch.is_whitespace() {
                match self.glyph_uv(ch) {
                    Some(uv) => glyphs.push((cursor, uv)),
                    None => log::trace!("Glyph {ch:?} missing from atlas"),
                }
            }
            cursor[0] += self.advance;
        }
        glyphs
    }
}

/// A string drawn with one font, size and colour
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    /// Text, may contain newlines
    pub text: String,
    /// Glyph height in model units
    pub size: f32,
    /// Text colour
    pub colour: Colour,
}

impl GlyphRun {
    /// White text of the given size
    pub fn new(text: impl Into<String>, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
            colour: WHITE,
        }
    }

    /// Set colour
    pub fn with_colour(mut self, colour: Colour) -> Self {
        self.colour = colour;
        self
    }
}
