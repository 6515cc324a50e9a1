//! Layout plan – the intermediate representation between pagination and
//! rasterisation. This is the "frozen" structure that encodes exactly which
//! lines of which block go on each page.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::blocks::Block;
use crate::error::{EngineError, Result};

/// Rectangle, in output-canvas pixels, that text is laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Map a box drawn in editor space to output space.
    pub fn scaled(&self, width_ratio: f32, height_ratio: f32) -> Self {
        Self {
            x: self.x * width_ratio,
            y: self.y * height_ratio,
            width: self.width * width_ratio,
            height: self.height * height_ratio,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn fits_within(&self, width: f32, height: f32) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= width && self.bottom() <= height
    }
}

/// Vertical metrics shared by every page of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub text_box: TextBox,
    pub line_height: f32,
    pub paragraph_spacing: f32,
}

impl PageGeometry {
    /// Whole lines that fit in the text box; at least one so that planning
    /// always makes progress.
    pub fn capacity(&self) -> usize {
        ((self.text_box.height / self.line_height).floor() as usize).max(1)
    }

    /// Whether `lines` more lines fit below text ending at `cursor`. The
    /// paragraph gap is not part of the test: it collapses when space is short.
    pub fn fits(&self, cursor: f32, lines: usize) -> bool {
        cursor + lines as f32 * self.line_height <= self.text_box.bottom()
    }

    /// Top edge of a `lines`-line block placed after text ending at `cursor`.
    /// The first block of a page starts at the cursor; later blocks get the
    /// paragraph gap, shrunk to whatever the box has left.
    pub fn block_top(&self, cursor: f32, lines: usize, first: bool) -> f32 {
        if first {
            return cursor;
        }
        let latest = self.text_box.bottom() - lines as f32 * self.line_height;
        (cursor + self.paragraph_spacing).min(latest).max(cursor)
    }
}

/// A run of lines `lines` taken from `blocks[block]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub block: usize,
    pub lines: Range<usize>,
}

impl Placement {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePlan {
    pub page_number: u32,
    pub placements: Vec<Placement>,
}

impl PagePlan {
    pub fn line_count(&self) -> usize {
        self.placements.iter().map(Placement::line_count).sum()
    }
}

/// A complete ebook layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbookPlan {
    pub width: u32,
    pub height: u32,
    pub geometry: PageGeometry,
    /// Scaled base font size (drives the page-number size).
    pub base_font_size: f32,
    pub palette_color: String,
    pub blocks: Vec<Block>,
    pub pages: Vec<PagePlan>,
}

impl EbookPlan {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::io("plan output", None, e.into()))
    }
}
