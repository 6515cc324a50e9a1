//! Block segmentation – turns the content tree into an ordered list of
//! pre-wrapped [`Block`]s, one per non-empty text run.

use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, Tag};
use crate::fonts::{wrap_text, FontManager};
use crate::style::{StyleContext, StyleResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading1,
    Heading2,
    Heading3,
    /// Text under b/strong/i/em/u/font.
    Decorated,
    Paragraph,
}

impl BlockKind {
    /// Headings and decorated runs are never split across pages on their own
    /// and pull the following block onto their page.
    pub fn is_heading_like(self) -> bool {
        !matches!(self, BlockKind::Paragraph)
    }

    pub fn is_heading(self) -> bool {
        matches!(
            self,
            BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3
        )
    }

    fn from_tag(tag: &Tag) -> Option<Self> {
        match tag.heading_level() {
            Some(1) => Some(BlockKind::Heading1),
            Some(2) => Some(BlockKind::Heading2),
            Some(3) => Some(BlockKind::Heading3),
            _ if tag.is_decoration() => Some(BlockKind::Decorated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub style: StyleContext,
    pub lines: Vec<String>,
}

/// Depth-first walk producing one block per non-empty text node, in document
/// order. Each block's kind is taken from its nearest styled ancestor.
pub fn segment(
    nodes: &[DomNode],
    base: &StyleContext,
    resolver: &StyleResolver,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<Block> {
    let mut segmenter = Segmenter {
        resolver,
        fonts,
        max_width,
        blocks: Vec::new(),
    };
    for node in nodes {
        segmenter.visit(node, base, BlockKind::Paragraph);
    }
    segmenter.blocks
}

struct Segmenter<'a> {
    resolver: &'a StyleResolver,
    fonts: &'a FontManager,
    max_width: f32,
    blocks: Vec<Block>,
}

impl Segmenter<'_> {
    fn visit(&mut self, node: &DomNode, parent_style: &StyleContext, kind: BlockKind) {
        match node {
            DomNode::Element(e) => {
                if e.tag.is_hidden() {
                    return;
                }
                let style = self.resolver.resolve(e, parent_style);
                let kind = BlockKind::from_tag(&e.tag).unwrap_or(kind);
                for child in &e.children {
                    self.visit(child, &style, kind);
                }
            }
            DomNode::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                let lines = wrap_text(text, parent_style, self.max_width, self.fonts);
                if lines.is_empty() {
                    return;
                }
                self.blocks.push(Block {
                    kind,
                    style: parent_style.clone(),
                    lines,
                });
            }
        }
    }
}

pub fn total_lines(blocks: &[Block]) -> usize {
    blocks.iter().map(|b| b.lines.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::style::{FontStyle, FontWeight};

    fn run(html: &str, width: f32) -> Vec<Block> {
        let base = StyleContext::base(10.0, "#000000", FontWeight::Normal, "Arial", FontStyle::Normal);
        segment(
            &parse_html(html),
            &base,
            &StyleResolver::new(10.0),
            width,
            &FontManager::default(),
        )
    }

    #[test]
    fn one_block_per_text_run() {
        let blocks = run("<h1>Title</h1><p>Plain <b>bold</b> tail</p>", 500.0);
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Heading1,
                BlockKind::Paragraph,
                BlockKind::Decorated,
                BlockKind::Paragraph
            ]
        );
        assert_eq!(blocks[1].lines, vec!["Plain"]);
        assert!(blocks[2].style.is_bold());
    }

    #[test]
    fn nearest_styled_ancestor_wins() {
        let blocks = run("<h2><span>inside span</span></h2><p><i><span>it</span></i></p>", 500.0);
        assert_eq!(blocks[0].kind, BlockKind::Heading2);
        assert_eq!(blocks[1].kind, BlockKind::Decorated);
        assert!(blocks[1].style.is_italic());
    }

    #[test]
    fn heading_in_decoration_is_heading() {
        let blocks = run("<b><h3>x</h3></b>", 500.0);
        assert_eq!(blocks[0].kind, BlockKind::Heading3);
        assert!(blocks[0].style.is_bold());
        assert!((blocks[0].style.font_size - 13.0).abs() < 1e-4);
    }

    #[test]
    fn whitespace_only_runs_are_skipped() {
        let blocks = run("<p>   </p><div>\n</div><p>x</p>", 500.0);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn hidden_elements_are_skipped() {
        let blocks = run("<style>p { color: red }</style><p>x</p>", 500.0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines, vec!["x"]);
    }

    #[test]
    fn text_at_root_is_paragraph() {
        let blocks = run("loose text", 500.0);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn lines_are_wrapped_to_box_width() {
        // 5px per char at 10px; width 50 fits 10 chars
        let blocks = run("<p>aaaa bbbb cccc</p>", 50.0);
        assert_eq!(blocks[0].lines, vec!["aaaa bbbb", "cccc"]);
        assert_eq!(total_lines(&blocks), 2);
    }
}
