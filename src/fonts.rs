//! Font loading, text measurement and the greedy line breaker.
//!
//! Measurement and rendering share [`FontManager::glyph_advances`], so the
//! widths the line breaker plans with are exactly the pen advances the
//! compositor draws with. Without any font file loaded the manager falls back
//! to heuristic metrics (0.5 em per character, 0.55 em when bold).

use std::collections::HashMap;
use std::path::Path;

use crate::config::FontSource;
use crate::error::{EngineError, Result};
use crate::style::StyleContext;

/// A loaded font face with metrics in font units.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API). Empty for
    /// heuristic faces.
    pub bytes: Vec<u8>,
    pub face_index: u32,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

impl FontData {
    fn heuristic() -> Self {
        Self {
            bytes: Vec::new(),
            face_index: 0,
            units_per_em: 1000.0,
            ascender: 750.0,
            descender: -250.0,
        }
    }

    pub fn has_outlines(&self) -> bool {
        !self.bytes.is_empty()
    }

    pub fn face(&self) -> Option<ttf_parser::Face<'_>> {
        if self.bytes.is_empty() {
            return None;
        }
        ttf_parser::Face::parse(&self.bytes, self.face_index).ok()
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_ascii_lowercase(),
            bold,
            italic,
        }
    }

    pub fn for_style(style: &StyleContext) -> Self {
        Self::new(&style.font_family, style.is_bold(), style.is_italic())
    }
}

/// The face a [`FontKey`] resolved to after fallback.
pub struct ResolvedFont<'a> {
    pub key: &'a FontKey,
    pub data: &'a FontData,
}

/// Manages loaded fonts.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    default_key: FontKey,
}

pub const HEURISTIC_FAMILY: &str = "sans-serif";

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            default_key: FontKey::new(HEURISTIC_FAMILY, false, false),
        }
    }

    /// Build a manager from configured font files, with heuristic metrics
    /// registered as the last-resort face.
    pub fn from_sources(sources: &[FontSource]) -> Result<Self> {
        let mut mgr = Self::new();
        for src in sources {
            mgr.load_font_file(&src.path, &src.family, src.bold, src.italic)?;
        }
        mgr.ensure_default();
        Ok(mgr)
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(&mut self, family: &str, bold: bool, italic: bool, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| EngineError::asset("font load", format!("failed to parse font '{family}': {e}")))?;

        let data = FontData {
            face_index: 0,
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };

        let key = FontKey::new(family, bold, italic);
        log::debug!("loaded font {:?} ({} units/em)", key, data.units_per_em);

        if !self.fonts.values().any(FontData::has_outlines) {
            self.default_key = key.clone();
        }
        self.fonts.insert(key, data);
        Ok(())
    }

    pub fn load_font_file(&mut self, path: &Path, family: &str, bold: bool, italic: bool) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::asset("font load", format!("failed to read font {}: {e}", path.display()))
        })?;
        self.load_font(family, bold, italic, bytes)
    }

    /// Register heuristic metrics (for when no TTF is available).
    pub fn ensure_default(&mut self) {
        let key = FontKey::new(HEURISTIC_FAMILY, false, false);
        self.fonts.entry(key.clone()).or_insert_with(FontData::heuristic);
        if !self.fonts.contains_key(&self.default_key) {
            self.default_key = key;
        }
    }

    /// Resolve a key: exact match, then the same family ignoring italic, then
    /// the family's regular face, then the default face.
    pub fn resolve(&self, key: &FontKey) -> ResolvedFont<'_> {
        let candidates = [
            key.clone(),
            FontKey::new(&key.family, key.bold, false),
            FontKey::new(&key.family, false, false),
            self.default_key.clone(),
        ];
        for candidate in &candidates {
            if let Some((k, data)) = self.fonts.get_key_value(candidate) {
                return ResolvedFont { key: k, data };
            }
        }
        // `ensure_default` was never called; use whatever is there.
        match self.fonts.iter().next() {
            Some((k, data)) => ResolvedFont { key: k, data },
            None => {
                static HEURISTIC: std::sync::OnceLock<(FontKey, FontData)> = std::sync::OnceLock::new();
                let (k, data) = HEURISTIC.get_or_init(|| {
                    (FontKey::new(HEURISTIC_FAMILY, false, false), FontData::heuristic())
                });
                ResolvedFont { key: k, data }
            }
        }
    }

    /// Horizontal advance of every character of `text`, in px.
    pub fn glyph_advances(&self, text: &str, font_size: f32, key: &FontKey) -> Vec<f32> {
        let resolved = self.resolve(key);
        match resolved.data.face() {
            Some(face) => {
                let scale = font_size / resolved.data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .collect()
            }
            None => {
                // Bold is ~10 % wider.
                let avg = if key.bold { 0.55 } else { 0.5 };
                text.chars().map(|_| font_size * avg).collect()
            }
        }
    }

    /// Measure the width of a string at a given font size (in px).
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, italic: bool, family: &str) -> f32 {
        let key = FontKey::new(family, bold, italic);
        self.glyph_advances(text, font_size, &key).iter().sum()
    }

    pub fn measure_styled(&self, text: &str, style: &StyleContext) -> f32 {
        self.glyph_advances(text, style.font_size, &FontKey::for_style(style))
            .iter()
            .sum()
    }

    pub fn ascender_px(&self, font_size: f32, key: &FontKey) -> f32 {
        let data = self.resolve(key).data;
        data.ascender * font_size / data.units_per_em
    }

    /// Descender in px (negative: below the baseline).
    pub fn descender_px(&self, font_size: f32, key: &FontKey) -> f32 {
        let data = self.resolve(key).data;
        data.descender * font_size / data.units_per_em
    }

    pub fn has_real_fonts(&self) -> bool {
        self.fonts.values().any(FontData::has_outlines)
    }
}

impl Default for FontManager {
    fn default() -> Self {
        let mut mgr = Self::new();
        mgr.ensure_default();
        mgr
    }
}

/// Greedy word wrap of `text` into lines no wider than `max_width` px under
/// `style`. Words are never split: a word wider than the box becomes its own
/// overflowing line. Whitespace-only input yields no lines.
pub fn wrap_text(text: &str, style: &StyleContext, max_width: f32, fonts: &FontManager) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        let candidate = if current_line.is_empty() {
            word.to_string()
        } else {
            format!("{current_line} {word}")
        };
        if !current_line.is_empty() && fonts.measure_styled(&candidate, style) > max_width {
            lines.push(std::mem::replace(&mut current_line, word.to_string()));
        } else {
            current_line = candidate;
        }
    }
    if !current_line.is_empty() {
        lines.push(current_line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{FontStyle, FontWeight};

    fn style(size: f32, weight: FontWeight) -> StyleContext {
        StyleContext::base(size, "#000", weight, "Arial", FontStyle::Normal)
    }

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, false, false, "Arial");
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let bold = mgr.measure_text_width("Hello", 16.0, true, false, "Arial");
        assert!((bold - 44.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_respects_width() {
        let mgr = FontManager::default();
        let s = style(10.0, FontWeight::Normal);
        // Each char is 5px wide; 60px fits 12 chars.
        let lines = wrap_text("aaaa bbbb cccc dddd eeee", &s, 60.0, &mgr);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc dddd", "eeee"]);
        for line in &lines {
            assert!(mgr.measure_styled(line, &s) <= 60.0);
        }
    }

    #[test]
    fn exact_fit_stays_on_line() {
        let mgr = FontManager::default();
        let s = style(10.0, FontWeight::Normal);
        // "aaaaa bbbbbb" = 12 chars = 60px
        let lines = wrap_text("aaaaa bbbbbb", &s, 60.0, &mgr);
        assert_eq!(lines, vec!["aaaaa bbbbbb"]);
    }

    #[test]
    fn long_word_overflows_on_its_own_line() {
        let mgr = FontManager::default();
        let s = style(10.0, FontWeight::Normal);
        let lines = wrap_text("hi supercalifragilistic yo", &s, 40.0, &mgr);
        assert_eq!(lines, vec!["hi", "supercalifragilistic", "yo"]);
    }

    #[test]
    fn whitespace_collapses_and_empty_yields_nothing() {
        let mgr = FontManager::default();
        let s = style(10.0, FontWeight::Normal);
        assert!(wrap_text("   \n\t ", &s, 100.0, &mgr).is_empty());
        assert_eq!(wrap_text("a\n\n  b", &s, 100.0, &mgr), vec!["a b"]);
    }

    #[test]
    fn bold_wraps_earlier() {
        let mgr = FontManager::default();
        let text = "word word word word";
        let regular = wrap_text(text, &style(10.0, FontWeight::Normal), 95.0, &mgr);
        let bold = wrap_text(text, &style(10.0, FontWeight::Bold), 95.0, &mgr);
        assert!(bold.len() >= regular.len());
        assert_eq!(regular.len(), 1);
        assert_eq!(bold.len(), 2);
    }

    #[test]
    fn unknown_family_falls_back_to_default() {
        let mgr = FontManager::default();
        let resolved = mgr.resolve(&FontKey::new("Garamond", true, true));
        assert_eq!(resolved.key.family, HEURISTIC_FAMILY);
        assert!(!resolved.data.has_outlines());
    }

    #[test]
    fn invalid_font_bytes_are_an_asset_error() {
        let mut mgr = FontManager::default();
        let err = mgr.load_font("Broken", false, false, vec![0, 1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Asset);
    }
}
