//! Engine configuration.
//!
//! Every field has a default matching the editor the content comes from
//! (600×900 canvas, 1.5 line height), so an empty JSON object is a valid
//! configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// How underlines are positioned and stroked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderlinePolicy {
    /// Heading-like blocks get a font-size-proportional offset, with a
    /// proportional stroke for h1–h3 only; paragraphs get 2px offset / 1px
    /// stroke. Matches pages produced by earlier versions of the studio.
    #[default]
    Legacy,
    /// One rule for every block kind, keyed to font size.
    Proportional,
}

/// A font file to register with the [`crate::fonts::FontManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontSource {
    pub family: String,
    pub path: PathBuf,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output page width in pixels.
    pub output_width: u32,
    /// Output page height in pixels.
    pub output_height: u32,
    /// Width of the editor canvas the text box was drawn on.
    pub editor_width: f32,
    /// Height of the editor canvas the text box was drawn on.
    pub editor_height: f32,
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Line height as a multiple of the scaled base font size.
    pub line_height_factor: f32,
    /// Gap after every block as a multiple of the scaled base font size.
    pub paragraph_spacing_factor: f32,
    /// Page-number font size as a multiple of the scaled base font size.
    pub page_number_scale: f32,
    /// Distance of the page number from the bottom edge, as a fraction of
    /// the page height.
    pub page_number_margin_ratio: f32,
    pub default_font_family: String,
    pub page_number_font_family: String,
    pub underline_policy: UnderlinePolicy,
    /// Render pages on the rayon pool (requires the `parallel` feature).
    pub parallel_render: bool,
    /// Base directory for relative cover/template paths.
    pub asset_root: PathBuf,
    /// Directory holding `<template id>.png` backgrounds.
    pub template_root: PathBuf,
    /// Directory under which one folder per ebook is created.
    pub output_root: PathBuf,
    /// URL prefix used for the paths listed in the manifest.
    pub public_prefix: String,
    pub fonts: Vec<FontSource>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_width: 600,
            output_height: 900,
            editor_width: 600.0,
            editor_height: 900.0,
            min_font_size: 10.0,
            max_font_size: 72.0,
            line_height_factor: 1.5,
            paragraph_spacing_factor: 0.5,
            page_number_scale: 0.8,
            page_number_margin_ratio: 0.05,
            default_font_family: "Arial".to_string(),
            page_number_font_family: "Arial".to_string(),
            underline_policy: UnderlinePolicy::Legacy,
            parallel_render: true,
            asset_root: PathBuf::from("."),
            template_root: PathBuf::from("templates"),
            output_root: PathBuf::from("ebooks"),
            public_prefix: "/ebooks".to_string(),
            fonts: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::validation(format!("invalid engine config: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io("config read", None, e))?;
        Self::from_json(&text)
    }

    /// `"<w>x<h>px"`, as recorded in the manifest.
    pub fn resolution_label(&self) -> String {
        format!("{}x{}px", self.output_width, self.output_height)
    }

    pub fn width_ratio(&self) -> f32 {
        self.output_width as f32 / self.editor_width
    }

    pub fn height_ratio(&self) -> f32 {
        self.output_height as f32 / self.editor_height
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(EngineError::validation("output resolution must be non-zero"));
        }
        if !(self.editor_width > 0.0 && self.editor_height > 0.0) {
            return Err(EngineError::validation("editor canvas size must be positive"));
        }
        if !(self.line_height_factor > 0.0) {
            return Err(EngineError::validation("line height factor must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let cfg = EngineConfig::from_json("{}").unwrap();
        assert_eq!(cfg.output_width, 600);
        assert_eq!(cfg.output_height, 900);
        assert_eq!(cfg.underline_policy, UnderlinePolicy::Legacy);
        assert_eq!(cfg.resolution_label(), "600x900px");
    }

    #[test]
    fn partial_override() {
        let cfg = EngineConfig::from_json(
            r#"{"output_width": 1200, "output_height": 1800, "underline_policy": "proportional"}"#,
        )
        .unwrap();
        assert!((cfg.width_ratio() - 2.0).abs() < 1e-6);
        assert!((cfg.height_ratio() - 2.0).abs() < 1e-6);
        assert_eq!(cfg.underline_policy, UnderlinePolicy::Proportional);
        assert!((cfg.line_height_factor - 1.5).abs() < 1e-6);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let cfg = EngineConfig {
            output_width: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.check().is_err());
    }
}
