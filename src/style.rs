//! Style resolver – inherits a [`StyleContext`] down the content tree and
//! applies the small set of overrides the editor can produce.

use serde::{Deserialize, Serialize};

use crate::dom::{ElementNode, Tag};

/// Resolved text style for one node. Cloned from the parent before any
/// override is applied, so a child never affects its parent's copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleContext {
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: String,
    /// CSS color string as authored (`#1a2b3c`, `red`, ...). Parsed into a
    /// [`Color`] only at render time.
    pub color: String,
    pub text_decoration: TextDecoration,
}

impl StyleContext {
    /// Root style built from the request palette.
    pub fn base(
        font_size: f32,
        color: &str,
        font_weight: FontWeight,
        font_family: &str,
        font_style: FontStyle,
    ) -> Self {
        Self {
            font_size,
            font_weight,
            font_style,
            font_family: font_family.to_string(),
            color: color.to_string(),
            text_decoration: TextDecoration::None,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    pub fn is_underlined(&self) -> bool {
        self.text_decoration == TextDecoration::Underline
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    /// Map a CSS `font-weight` word. Numeric weights of 600 and above count
    /// as bold.
    pub fn from_css(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "bold" | "bolder" => Some(FontWeight::Bold),
            "normal" | "lighter" => Some(FontWeight::Normal),
            other => other.parse::<u32>().ok().map(|w| {
                if w >= 600 {
                    FontWeight::Bold
                } else {
                    FontWeight::Normal
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "italic" | "oblique" => Some(FontStyle::Italic),
            "normal" => Some(FontStyle::Normal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Self::rgb(r, g, b))
        } else if hex.len() == 3 {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Self::rgb(r, g, b))
        } else {
            None
        }
    }

    /// Parse a `#hex` value or one of the common CSS color names.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        let c = match value.to_ascii_lowercase().as_str() {
            "black" => Self::rgb(0, 0, 0),
            "white" => Self::rgb(255, 255, 255),
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "blue" => Self::rgb(0, 0, 255),
            "navy" => Self::rgb(0, 0, 128),
            "yellow" => Self::rgb(255, 255, 0),
            "orange" => Self::rgb(255, 165, 0),
            "purple" => Self::rgb(128, 0, 128),
            "fuchsia" | "magenta" => Self::rgb(255, 0, 255),
            "aqua" | "cyan" => Self::rgb(0, 255, 255),
            "teal" => Self::rgb(0, 128, 128),
            "maroon" => Self::rgb(128, 0, 0),
            "olive" => Self::rgb(128, 128, 0),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "silver" => Self::rgb(192, 192, 192),
            "brown" => Self::rgb(165, 42, 42),
            "pink" => Self::rgb(255, 192, 203),
            "gold" => Self::rgb(255, 215, 0),
            "darkblue" => Self::rgb(0, 0, 139),
            "darkred" => Self::rgb(139, 0, 0),
            "darkgreen" => Self::rgb(0, 100, 0),
            "darkgray" | "darkgrey" => Self::rgb(169, 169, 169),
            "lightgray" | "lightgrey" => Self::rgb(211, 211, 211),
            _ => return None,
        };
        Some(c)
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
        .unwrap_or(tiny_skia::Color::BLACK)
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Applies tag and attribute overrides on top of an inherited style.
///
/// Heading sizes are multiples of the document's base font size, not of the
/// parent's size, so nesting headings does not compound.
#[derive(Debug, Clone, Copy)]
pub struct StyleResolver {
    pub base_font_size: f32,
}

impl StyleResolver {
    pub const H1_SCALE: f32 = 1.8;
    pub const H2_SCALE: f32 = 1.5;
    pub const H3_SCALE: f32 = 1.3;

    pub fn new(base_font_size: f32) -> Self {
        Self { base_font_size }
    }

    pub fn resolve(&self, element: &ElementNode, parent: &StyleContext) -> StyleContext {
        let mut style = parent.clone();

        match element.tag {
            Tag::H1 => style.font_size = self.base_font_size * Self::H1_SCALE,
            Tag::H2 => style.font_size = self.base_font_size * Self::H2_SCALE,
            Tag::H3 => style.font_size = self.base_font_size * Self::H3_SCALE,
            Tag::B | Tag::Strong => style.font_weight = FontWeight::Bold,
            Tag::I | Tag::Em => style.font_style = FontStyle::Italic,
            Tag::U => style.text_decoration = TextDecoration::Underline,
            _ => {}
        }

        if let Some(color) = element.font_color() {
            style.color = color.trim().to_string();
        }

        if let Some(inline) = element.inline_style() {
            apply_inline_style(&mut style, inline);
        }

        style
    }
}

// ---------------------------------------------------------------------------
// Inline style parsing (color and font-weight only)
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut StyleContext, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        let val = val.trim();
        match prop.trim().to_ascii_lowercase().as_str() {
            "color" => {
                if let Some(color) = css_color_token(val) {
                    s.color = color;
                }
            }
            "font-weight" => {
                if let Some(weight) = FontWeight::from_css(val) {
                    s.font_weight = weight;
                }
            }
            _ => {}
        }
    }
}

/// Accept `#` followed by 3–6 hex digits, or an alphabetic color name.
fn css_color_token(val: &str) -> Option<String> {
    let token = val.split_whitespace().next()?;
    if let Some(hex) = token.strip_prefix('#') {
        let ok = (3..=6).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit());
        return ok.then(|| token.to_string());
    }
    token
        .chars()
        .all(|c| c.is_ascii_alphabetic())
        .then(|| token.to_string())
}
