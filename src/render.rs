//! Page compositor – rasterises one [`PagePlan`] onto a copy of the
//! background with `tiny-skia`.
//!
//! Glyph outlines come from `ttf-parser`. When only heuristic metrics are
//! available the compositor draws greeked bars with the same advances the
//! line breaker measured, so layout never depends on a font file being
//! present.

use tiny_skia::{
    FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};
use ttf_parser::OutlineBuilder;

use crate::blocks::{Block, BlockKind};
use crate::config::UnderlinePolicy;
use crate::error::{EngineError, Result};
use crate::fonts::{FontKey, FontManager};
use crate::layout_plan::{PageGeometry, PagePlan};
use crate::style::Color;

/// Horizontal shear applied to upright faces rendered as italic.
const SYNTHETIC_ITALIC_SKEW: f32 = 0.2;

/// Page-level drawing parameters that do not depend on content.
#[derive(Debug, Clone)]
pub struct CompositorOptions {
    pub width: u32,
    pub height: u32,
    pub page_number_size: f32,
    pub page_number_family: String,
    /// Distance of the page number's bottom edge from the bottom of the
    /// page, as a fraction of the page height.
    pub page_number_margin_ratio: f32,
    pub underline: UnderlinePolicy,
}

pub struct PageCompositor<'a> {
    background: Pixmap,
    fonts: &'a FontManager,
    palette: Color,
    geometry: PageGeometry,
    options: CompositorOptions,
}

impl<'a> PageCompositor<'a> {
    /// `background` is stretched to the output size here, once, and copied
    /// for every page.
    pub fn new(
        background: Pixmap,
        fonts: &'a FontManager,
        palette: Color,
        geometry: PageGeometry,
        options: CompositorOptions,
    ) -> Result<Self> {
        let background = stretch(&background, options.width, options.height)?;
        Ok(Self {
            background,
            fonts,
            palette,
            geometry,
            options,
        })
    }

    pub fn render_page(&self, page: &PagePlan, blocks: &[Block]) -> Result<Pixmap> {
        let mut canvas = self.background.clone();
        let line_height = self.geometry.line_height;
        let x = self.geometry.text_box.x;
        let mut cursor = self.geometry.text_box.y;

        for (i, placement) in page.placements.iter().enumerate() {
            let block = blocks.get(placement.block).ok_or_else(|| {
                EngineError::validation(format!(
                    "page {} references missing block {}",
                    page.page_number, placement.block
                ))
            })?;
            let lines = block.lines.get(placement.lines.clone()).ok_or_else(|| {
                EngineError::validation(format!(
                    "page {} references lines {:?} of a {}-line block",
                    page.page_number,
                    placement.lines,
                    block.lines.len()
                ))
            })?;

            let style = &block.style;
            let key = FontKey::for_style(style);
            let color = Color::parse(&style.color).unwrap_or_else(|| {
                log::warn!("unparsable color {:?}, using palette", style.color);
                self.palette
            });
            let paint = solid(color);
            let ascender = self.fonts.ascender_px(style.font_size, &key);

            let mut y = self.geometry.block_top(cursor, lines.len(), i == 0);
            for line in lines {
                let baseline = y + ascender;
                let width = self.draw_text(&mut canvas, line, x, baseline, style.font_size, &key, &paint);
                if style.is_underlined() {
                    let (offset, stroke) =
                        underline_metrics(block.kind, style.font_size, self.options.underline);
                    draw_rule(&mut canvas, x, x + width, baseline + offset, stroke, &paint);
                }
                y += line_height;
            }
            cursor = y;
        }

        self.draw_page_number(&mut canvas, page.page_number);
        Ok(canvas)
    }

    /// Render and PNG-encode a page.
    pub fn render_png(&self, page: &PagePlan, blocks: &[Block]) -> Result<Vec<u8>> {
        let pixmap = self.render_page(page, blocks)?;
        encode_png(&pixmap, Some(page.page_number))
    }

    fn draw_page_number(&self, canvas: &mut Pixmap, number: u32) {
        let text = number.to_string();
        let size = self.options.page_number_size;
        let key = FontKey::new(&self.options.page_number_family, true, false);
        let width: f32 = self.fonts.glyph_advances(&text, size, &key).iter().sum();
        let page_w = self.options.width as f32;
        let page_h = self.options.height as f32;
        let bottom = page_h - page_h * self.options.page_number_margin_ratio;
        let baseline = bottom + self.fonts.descender_px(size, &key);
        let x = (page_w - width) / 2.0;
        self.draw_text(canvas, &text, x, baseline, size, &key, &solid(self.palette));
    }

    /// Draw `text` with its baseline at `baseline`; returns the advance width.
    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        canvas: &mut Pixmap,
        text: &str,
        x: f32,
        baseline: f32,
        size: f32,
        key: &FontKey,
        paint: &Paint<'_>,
    ) -> f32 {
        let advances = self.fonts.glyph_advances(text, size, key);
        let resolved = self.fonts.resolve(key);

        match resolved.data.face() {
            Some(face) => {
                let scale = size / resolved.data.units_per_em;
                let skew = if key.italic && !resolved.key.italic {
                    SYNTHETIC_ITALIC_SKEW
                } else {
                    0.0
                };
                let embolden = key.bold && !resolved.key.bold;
                let mut pen = x;
                for (ch, advance) in text.chars().zip(&advances) {
                    if let Some(gid) = face.glyph_index(ch) {
                        let mut builder = GlyphPathBuilder::new(pen, baseline, scale, skew);
                        if face.outline_glyph(gid, &mut builder).is_some() {
                            if let Some(path) = builder.finish() {
                                fill_glyph(canvas, &path, paint, embolden.then_some(size / 30.0));
                            }
                        }
                    }
                    pen += advance;
                }
            }
            None => greek(canvas, text, &advances, x, baseline, size, paint),
        }
        advances.iter().sum()
    }
}

/// Underline `(offset below baseline, stroke width)` in px.
pub fn underline_metrics(kind: BlockKind, font_size: f32, policy: UnderlinePolicy) -> (f32, f32) {
    let offset = (font_size * 0.1).max(2.0);
    match policy {
        UnderlinePolicy::Proportional => (offset, (font_size * 0.05).max(1.0)),
        UnderlinePolicy::Legacy if kind.is_heading() => (offset, (font_size * 0.05).max(2.0)),
        UnderlinePolicy::Legacy if kind.is_heading_like() => (offset, 1.0),
        UnderlinePolicy::Legacy => (2.0, 1.0),
    }
}

pub fn encode_png(pixmap: &Pixmap, page: Option<u32>) -> Result<Vec<u8>> {
    pixmap
        .encode_png()
        .map_err(|e| EngineError::io("png encode", page, std::io::Error::other(e.to_string())))
}

/// Copy `src` onto a `width`×`height` canvas, scaling when sizes differ.
pub fn stretch(src: &Pixmap, width: u32, height: u32) -> Result<Pixmap> {
    if src.width() == width && src.height() == height {
        return Ok(src.clone());
    }
    let mut dst = Pixmap::new(width, height).ok_or_else(|| {
        EngineError::validation(format!("cannot allocate a {width}x{height} canvas"))
    })?;
    let sx = width as f32 / src.width() as f32;
    let sy = height as f32 / src.height() as f32;
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    dst.draw_pixmap(0, 0, src.as_ref(), &paint, Transform::from_scale(sx, sy), None);
    Ok(dst)
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn fill_glyph(canvas: &mut Pixmap, path: &Path, paint: &Paint<'_>, embolden: Option<f32>) {
    canvas.fill_path(path, paint, FillRule::Winding, Transform::identity(), None);
    if let Some(width) = embolden {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        canvas.stroke_path(path, paint, &stroke, Transform::identity(), None);
    }
}

fn draw_rule(canvas: &mut Pixmap, x0: f32, x1: f32, y: f32, width: f32, paint: &Paint<'_>) {
    if x1 <= x0 {
        return;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(x0, y);
    pb.line_to(x1, y);
    if let Some(path) = pb.finish() {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        canvas.stroke_path(&path, paint, &stroke, Transform::identity(), None);
    }
}

/// Placeholder bars, x-height tall, one per visible character.
fn greek(
    canvas: &mut Pixmap,
    text: &str,
    advances: &[f32],
    x: f32,
    baseline: f32,
    size: f32,
    paint: &Paint<'_>,
) {
    let x_height = size * 0.5;
    let mut pen = x;
    for (ch, advance) in text.chars().zip(advances) {
        if !ch.is_whitespace() {
            if let Some(rect) = Rect::from_xywh(pen + advance * 0.1, baseline - x_height, advance * 0.8, x_height) {
                canvas.fill_rect(rect, paint, Transform::identity(), None);
            }
        }
        pen += advance;
    }
}

/// Feeds ttf-parser outlines into a tiny-skia path, flipping the font's
/// y-up space into canvas y-down space.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
    skew: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32, skew: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
            skew,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin_x + (x + y * self.skew) * self.scale,
            self.origin_y - y * self.scale,
        )
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_plan::{Placement, TextBox};
    use crate::style::{FontStyle, FontWeight, StyleContext, TextDecoration};

    const W: u32 = 200;
    const H: u32 = 300;

    fn white(width: u32, height: u32) -> Pixmap {
        let mut p = Pixmap::new(width, height).unwrap();
        p.fill(tiny_skia::Color::WHITE);
        p
    }

    fn geometry() -> PageGeometry {
        PageGeometry {
            text_box: TextBox::new(20.0, 20.0, 160.0, 200.0),
            line_height: 30.0,
            paragraph_spacing: 10.0,
        }
    }

    fn options(underline: UnderlinePolicy) -> CompositorOptions {
        CompositorOptions {
            width: W,
            height: H,
            page_number_size: 16.0,
            page_number_family: "Arial".into(),
            page_number_margin_ratio: 0.05,
            underline,
        }
    }

    fn block(color: &str, lines: &[&str]) -> Block {
        Block {
            kind: BlockKind::Paragraph,
            style: StyleContext::base(20.0, color, FontWeight::Normal, "Arial", FontStyle::Normal),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn page(placements: Vec<Placement>) -> PagePlan {
        PagePlan {
            page_number: 7,
            placements,
        }
    }

    /// Count pixels in rows `y0..y1` that are not pure white.
    fn inked(p: &Pixmap, y0: u32, y1: u32) -> usize {
        let mut n = 0;
        for y in y0..y1 {
            for x in 0..p.width() {
                let c = p.pixel(x, y).unwrap();
                if c.red() < 250 || c.green() < 250 || c.blue() < 250 {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn draws_text_inside_box_and_page_number_at_bottom() {
        let fonts = FontManager::default();
        let blocks = vec![block("#000000", &["hello world"])];
        let comp = PageCompositor::new(white(W, H), &fonts, Color::BLACK, geometry(), options(UnderlinePolicy::Legacy)).unwrap();
        let plan = page(vec![Placement { block: 0, lines: 0..1 }]);
        let out = comp.render_page(&plan, &blocks).unwrap();

        assert!(inked(&out, 20, 50) > 0, "first line missing");
        assert_eq!(inked(&out, 60, 220), 0, "ink below the only line");
        // Page number sits in the bottom 15% of the page.
        assert!(inked(&out, 255, 286) > 0, "page number missing");
    }

    #[test]
    fn second_block_stays_inside_a_two_line_box() {
        let fonts = FontManager::default();
        let blocks = vec![block("#000000", &["first"]), block("#000000", &["second"])];
        let tight = PageGeometry {
            text_box: TextBox::new(20.0, 20.0, 160.0, 60.0),
            ..geometry()
        };
        let comp = PageCompositor::new(white(W, H), &fonts, Color::BLACK, tight, options(UnderlinePolicy::Legacy)).unwrap();
        let plan = page(vec![
            Placement { block: 0, lines: 0..1 },
            Placement { block: 1, lines: 0..1 },
        ]);
        let out = comp.render_page(&plan, &blocks).unwrap();

        assert!(inked(&out, 50, 80) > 0, "second block missing");
        assert_eq!(inked(&out, 81, 250), 0, "ink below the text box");
    }

    #[test]
    fn block_color_is_used() {
        let fonts = FontManager::default();
        let blocks = vec![block("#ff0000", &["red"])];
        let comp = PageCompositor::new(white(W, H), &fonts, Color::BLACK, geometry(), options(UnderlinePolicy::Legacy)).unwrap();
        let out = comp
            .render_page(&page(vec![Placement { block: 0, lines: 0..1 }]), &blocks)
            .unwrap();
        let found = (20..50).any(|y| {
            (0..W).any(|x| {
                let c = out.pixel(x, y).unwrap();
                c.red() == 255 && c.green() < 50 && c.blue() < 50
            })
        });
        assert!(found);
    }

    #[test]
    fn background_is_stretched_to_output_size() {
        let mut small = Pixmap::new(10, 10).unwrap();
        small.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 255));
        let fonts = FontManager::default();
        let comp = PageCompositor::new(small, &fonts, Color::BLACK, geometry(), options(UnderlinePolicy::Legacy)).unwrap();
        let out = comp.render_page(&page(Vec::new()), &[]).unwrap();
        assert_eq!((out.width(), out.height()), (W, H));
        let c = out.pixel(W / 2, 100).unwrap();
        assert_eq!((c.red(), c.blue()), (0, 255));
    }

    #[test]
    fn underline_adds_ink_below_baseline() {
        let fonts = FontManager::default();
        let mut underlined = block("#000000", &["abc"]);
        underlined.style.text_decoration = TextDecoration::Underline;
        let plain = block("#000000", &["abc"]);
        let comp = PageCompositor::new(white(W, H), &fonts, Color::BLACK, geometry(), options(UnderlinePolicy::Legacy)).unwrap();
        let plan = page(vec![Placement { block: 0, lines: 0..1 }]);
        // Heuristic ascender at 20px is 15, so the baseline is at y 35.
        let with = comp.render_page(&plan, &[underlined]).unwrap();
        let without = comp.render_page(&plan, &[plain]).unwrap();
        assert!(inked(&with, 36, 39) > inked(&without, 36, 39));
    }

    #[test]
    fn legacy_underline_differs_by_kind() {
        let p = UnderlinePolicy::Legacy;
        assert_eq!(underline_metrics(BlockKind::Paragraph, 40.0, p), (2.0, 1.0));
        assert_eq!(underline_metrics(BlockKind::Heading1, 40.0, p), (4.0, 2.0));
        assert_eq!(underline_metrics(BlockKind::Heading2, 60.0, p), (6.0, 3.0));
        assert_eq!(underline_metrics(BlockKind::Decorated, 40.0, p), (4.0, 1.0));
        assert_eq!(underline_metrics(BlockKind::Decorated, 10.0, p), (2.0, 1.0));
    }

    #[test]
    fn proportional_underline_ignores_kind() {
        let p = UnderlinePolicy::Proportional;
        assert_eq!(
            underline_metrics(BlockKind::Paragraph, 60.0, p),
            underline_metrics(BlockKind::Heading1, 60.0, p)
        );
        assert_eq!(underline_metrics(BlockKind::Paragraph, 10.0, p), (2.0, 1.0));
    }

    #[test]
    fn out_of_range_placement_is_an_error() {
        let fonts = FontManager::default();
        let blocks = vec![block("#000000", &["one"])];
        let comp = PageCompositor::new(white(W, H), &fonts, Color::BLACK, geometry(), options(UnderlinePolicy::Legacy)).unwrap();
        let plan = page(vec![Placement { block: 0, lines: 0..3 }]);
        assert!(comp.render_page(&plan, &blocks).is_err());
    }

    #[test]
    fn png_has_signature() {
        let bytes = encode_png(&white(4, 4), None).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
