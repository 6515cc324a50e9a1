//! Pipeline – ties together parsing, styling, segmentation, pagination and
//! rendering into a single call.
//!
//! [`plan_ebook`] is the pure half (no I/O); [`generate_ebook`] loads the
//! assets, renders every planned page and writes the run directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::{self, TemplateStore};
use crate::blocks::segment;
use crate::config::EngineConfig;
use crate::dom::{body_children, parse_html};
use crate::error::{EngineError, Result};
use crate::fonts::FontManager;
use crate::layout_plan::{EbookPlan, PageGeometry, PagePlan, TextBox};
use crate::pagination::{estimated_page_count, plan_pages};
use crate::render::{encode_png, CompositorOptions, PageCompositor};
use crate::style::{Color, FontStyle, FontWeight, StyleContext, StyleResolver};

pub const COVER_FILE: &str = "cover.png";
pub const MANIFEST_FILE: &str = "manifest.json";

/// `page-<n>.png`
pub fn page_file_name(page_number: u32) -> String {
    format!("page-{page_number}.png")
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Font defaults picked in the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingStyle {
    pub font_family: Option<String>,
    pub font_style: Option<String>,
}

/// One ebook generation request, as posted by the studio.
///
/// Required fields are optional here so that a missing one is reported as a
/// validation error naming the field rather than a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(alias = "titre")]
    pub title: Option<String>,
    pub cover_path: Option<String>,
    pub template_id: Option<String>,
    pub palette_color: Option<String>,
    pub font_size: Option<f32>,
    /// In editor coordinates.
    pub text_box: Option<TextBox>,
    #[serde(default)]
    pub content: String,
    pub selected_writing_style: Option<WritingStyle>,
    pub text_weight: Option<String>,
    /// Output folder name; a random UUID when absent.
    pub ebook_id: Option<String>,
}

/// Request fields after validation.
struct Checked<'a> {
    title: &'a str,
    cover_path: &'a str,
    palette: Color,
    palette_str: &'a str,
    font_size: f32,
    text_box: TextBox,
}

impl GenerateRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::validation(format!("invalid request: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io("request read", None, e))?;
        Self::from_json(&text)
    }

    /// Check required fields and ranges. Does not touch the filesystem.
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        self.check(config).map(|_| ())
    }

    fn check(&self, config: &EngineConfig) -> Result<Checked<'_>> {
        let title = non_empty(&self.title);
        let palette_str = non_empty(&self.palette_color);
        let mut missing = Vec::new();
        if title.is_none() {
            missing.push("title");
        }
        if palette_str.is_none() {
            missing.push("paletteColor");
        }
        if self.font_size.is_none() {
            missing.push("fontSize");
        }
        if self.text_box.is_none() {
            missing.push("textBox");
        }
        let (Some(title), Some(palette_str), Some(font_size), Some(text_box)) =
            (title, palette_str, self.font_size, self.text_box)
        else {
            return Err(EngineError::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        };

        if !(config.min_font_size..=config.max_font_size).contains(&font_size) {
            return Err(EngineError::validation(format!(
                "fontSize {font_size} outside [{}, {}]",
                config.min_font_size, config.max_font_size
            )));
        }
        let numbers = [text_box.x, text_box.y, text_box.width, text_box.height];
        if numbers.iter().any(|n| !n.is_finite()) || text_box.width <= 0.0 || text_box.height <= 0.0 {
            return Err(EngineError::validation("textBox must have finite coordinates and a positive size"));
        }
        let palette = Color::parse(palette_str)
            .ok_or_else(|| EngineError::validation(format!("invalid paletteColor {palette_str:?}")))?;
        let cover_path = non_empty(&self.cover_path)
            .ok_or_else(|| EngineError::validation("coverPath is required"))?;
        if let Some(id) = &self.ebook_id {
            check_ebook_id(id)?;
        }

        Ok(Checked {
            title,
            cover_path,
            palette,
            palette_str,
            font_size,
            text_box,
        })
    }

    fn base_style(&self, font_size: f32, palette: &str, config: &EngineConfig) -> StyleContext {
        let weight = self
            .text_weight
            .as_deref()
            .and_then(FontWeight::from_css)
            .unwrap_or_default();
        let writing = self.selected_writing_style.clone().unwrap_or_default();
        let family = writing
            .font_family
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| config.default_font_family.clone());
        let style = writing
            .font_style
            .as_deref()
            .and_then(FontStyle::from_css)
            .unwrap_or_default();
        StyleContext::base(font_size, palette, weight, &family, style)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn check_ebook_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(EngineError::validation(format!("invalid ebookId {id:?}")))
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One rendered content page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageArtifact {
    pub path: PathBuf,
    pub page_number: u32,
}

/// What a successful run produced, in the shape the catalog stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub ebook_id: String,
    pub title: String,
    /// Content pages plus the cover.
    pub total_pages: u32,
    pub content_pages: u32,
    pub resolution: String,
    pub cover_path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub template_id: Option<String>,
    /// Public paths: the cover first, then pages in numeric order.
    pub files: Vec<String>,
}

impl Manifest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::io("manifest write", None, e.into()))
    }
}

fn public_path(config: &EngineConfig, ebook_id: &str, file: &str) -> String {
    format!("{}/{ebook_id}/{file}", config.public_prefix.trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Validate the request and compute every page's layout. No file is read or
/// written.
pub fn plan_ebook(request: &GenerateRequest, config: &EngineConfig, fonts: &FontManager) -> Result<EbookPlan> {
    config.check()?;
    let checked = request.check(config)?;
    plan_checked(request, &checked, config, fonts)
}

fn plan_checked(
    request: &GenerateRequest,
    checked: &Checked<'_>,
    config: &EngineConfig,
    fonts: &FontManager,
) -> Result<EbookPlan> {
    let (width, height) = (config.output_width, config.output_height);
    let width_ratio = config.width_ratio();
    let text_box = checked.text_box.scaled(width_ratio, config.height_ratio());
    if !text_box.fits_within(width as f32, height as f32) {
        return Err(EngineError::validation(format!(
            "text box {text_box:?} exceeds image bounds {width}x{height}"
        )));
    }

    let font_size = checked.font_size * width_ratio;
    let geometry = PageGeometry {
        text_box,
        line_height: font_size * config.line_height_factor,
        paragraph_spacing: font_size * config.paragraph_spacing_factor,
    };
    if text_box.height < geometry.line_height {
        return Err(EngineError::validation(format!(
            "text box height {} is shorter than one line ({})",
            text_box.height, geometry.line_height
        )));
    }

    let base = request.base_style(font_size, checked.palette_str, config);
    let nodes = body_children(&parse_html(&request.content));
    let blocks = segment(&nodes, &base, &StyleResolver::new(font_size), text_box.width, fonts);
    log::debug!(
        "{} block(s), capacity {} lines/page, estimated {} page(s)",
        blocks.len(),
        geometry.capacity(),
        estimated_page_count(&blocks, &geometry)
    );
    let pages = plan_pages(&blocks, &geometry);

    Ok(EbookPlan {
        width,
        height,
        geometry,
        base_font_size: font_size,
        palette_color: checked.palette_str.to_string(),
        blocks,
        pages,
    })
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Full pipeline: request → cover + page PNGs + `manifest.json` under
/// `<output_root>/<ebook_id>/`.
///
/// Validation and planning complete before anything is written. On a later
/// failure the partially written directory is left for the caller to remove.
pub fn generate_ebook(
    request: &GenerateRequest,
    config: &EngineConfig,
    fonts: &FontManager,
    templates: &dyn TemplateStore,
) -> Result<Manifest> {
    config.check()?;
    let checked = request.check(config)?;
    let plan = plan_checked(request, &checked, config, fonts)?;
    let (width, height) = (plan.width, plan.height);

    // Assets
    let cover = assets::load_image(checked.cover_path, &config.asset_root, width, height, "cover load")?;
    let cover = assets::to_pixmap(&cover, "cover load")?;
    let background = match request.template_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => {
            let bytes = templates.load(id)?;
            let img = assets::decode_image(&bytes, "template load")?;
            if img.width() != width || img.height() != height {
                log::warn!(
                    "template '{id}' is {}x{}, stretching to {width}x{height}",
                    img.width(),
                    img.height()
                );
            }
            assets::to_pixmap(&assets::normalise(&img, width, height), "template load")?
        }
        None => cover.clone(),
    };

    let compositor = PageCompositor::new(
        background,
        fonts,
        checked.palette,
        plan.geometry,
        CompositorOptions {
            width,
            height,
            page_number_size: plan.base_font_size * config.page_number_scale,
            page_number_family: config.page_number_font_family.clone(),
            page_number_margin_ratio: config.page_number_margin_ratio,
            underline: config.underline_policy,
        },
    )?;

    // Output
    let ebook_id = request
        .ebook_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let dir = config.output_root.join(&ebook_id);
    std::fs::create_dir_all(&dir).map_err(|e| EngineError::io("output directory", None, e))?;
    log::info!("generating '{}' into {}", checked.title, dir.display());

    let cover_png = encode_png(&cover, None)?;
    std::fs::write(dir.join(COVER_FILE), cover_png).map_err(|e| EngineError::io("cover write", None, e))?;

    let artifacts = write_pages(&compositor, &plan, &dir, config.parallel_render)?;

    let mut files = Vec::with_capacity(artifacts.len() + 1);
    files.push(public_path(config, &ebook_id, COVER_FILE));
    files.extend(
        artifacts
            .iter()
            .map(|a| public_path(config, &ebook_id, &page_file_name(a.page_number))),
    );
    let content_pages = artifacts.len() as u32;
    let manifest = Manifest {
        cover_path: public_path(config, &ebook_id, COVER_FILE),
        ebook_id,
        title: checked.title.to_string(),
        total_pages: content_pages + 1,
        content_pages,
        resolution: config.resolution_label(),
        template_id: request.template_id.clone().filter(|id| !id.is_empty()),
        files,
    };
    std::fs::write(dir.join(MANIFEST_FILE), manifest.to_json()?)
        .map_err(|e| EngineError::io("manifest write", None, e))?;
    log::info!("wrote {} content page(s) for {}", content_pages, manifest.ebook_id);
    Ok(manifest)
}

/// Render and write every planned page. Results keep plan order.
fn write_pages(
    compositor: &PageCompositor<'_>,
    plan: &EbookPlan,
    dir: &Path,
    parallel: bool,
) -> Result<Vec<PageArtifact>> {
    let write_one = |page: &PagePlan| -> Result<PageArtifact> {
        let png = compositor.render_png(page, &plan.blocks)?;
        let path = dir.join(page_file_name(page.page_number));
        std::fs::write(&path, png).map_err(|e| EngineError::io("page write", Some(page.page_number), e))?;
        Ok(PageArtifact {
            path,
            page_number: page.page_number,
        })
    };

    #[cfg(feature = "parallel")]
    {
        if parallel {
            use rayon::prelude::*;
            return plan.pages.par_iter().map(write_one).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    {
        if parallel {
            log::debug!("built without the `parallel` feature, rendering sequentially");
        }
    }

    plan.pages.iter().map(write_one).collect()
}
