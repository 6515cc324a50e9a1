//! Rich-text parser – converts editor HTML into a simple, immutable DOM tree.
//!
//! The content comes from a rich-text editor and only a small whitelist of
//! tags carries meaning downstream:
//! - Headings: h1, h2, h3
//! - Inline emphasis: b, strong, i, em, u, font (with `color`)
//! - Neutral containers: p, div, span, br, body, html
//!
//! Every element may carry an inline `style` attribute; only its `color` and
//! `font-weight` declarations are honoured (see [`crate::style`]).

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    H1,
    H2,
    H3,
    B,
    Strong,
    I,
    Em,
    U,
    Font,
    P,
    Div,
    Span,
    Br,
    Body,
    Html,
    Head,
    Style,
    Script,
    /// Anything outside the whitelist. Children are still walked; the tag
    /// itself contributes no styling.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "i" => Tag::I,
            "em" => Tag::Em,
            "u" => Tag::U,
            "font" => Tag::Font,
            "p" => Tag::P,
            "div" => Tag::Div,
            "span" => Tag::Span,
            "br" => Tag::Br,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            "style" => Tag::Style,
            "script" => Tag::Script,
            _ => Tag::Unknown(s.to_ascii_lowercase()),
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Br => true,
            Tag::Unknown(name) => matches!(
                name.as_str(),
                "hr" | "img" | "meta" | "link" | "input" | "wbr"
            ),
            _ => false,
        }
    }

    /// Elements whose text content is never laid out.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Tag::Head | Tag::Style | Tag::Script)
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Tag::H1 => Some(1),
            Tag::H2 => Some(2),
            Tag::H3 => Some(3),
            _ => None,
        }
    }

    /// Inline emphasis tags that turn their text into a decorated block.
    pub fn is_decoration(&self) -> bool {
        matches!(
            self,
            Tag::B | Tag::Strong | Tag::I | Tag::Em | Tag::U | Tag::Font
        )
    }
}

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn font_color(&self) -> Option<&str> {
        if self.tag == Tag::Font {
            self.attr("color")
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML fragment into a list of DOM nodes.
///
/// Hand-written for the controlled subset the editor emits. Attribute names
/// are lower-cased; entity decoding covers the common named entities.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Lower-cased names of the elements currently open.
    open: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
        }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace_preserve();
            if self.eof() {
                break;
            }
            if self.starts_with("</") {
                let name = self.peek_end_tag();
                if self.open.contains(&name) {
                    break;
                }
                // Stray end tag with no open element to close.
                log::debug!("ignoring unmatched </{name}>");
                self.skip_until('>');
                continue;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // Doctype / processing instruction
            self.skip_until('>');
            return None;
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A stray '<' that does not open a tag is literal text.
        if self.starts_with("<") {
            self.advance(1);
        }
        while !self.eof() && !(self.starts_with("<") && self.next_is_tag_start()) {
            self.advance(1);
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> DomNode {
        self.advance(1); // '<'
        let tag_name = self.parse_name().to_ascii_lowercase();
        let mut elem = ElementNode::new(Tag::from_name(&tag_name));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Unparseable attribute byte; skip it rather than spin.
                self.advance(1);
                continue;
            }
            if !key.is_empty() {
                elem.attributes.insert(key.to_ascii_lowercase(), value);
            }
        }

        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        self.open.push(tag_name);
        elem.children = self.parse_nodes();
        let tag_name = self.open.pop().unwrap_or_default();

        // An end tag for an outer element closes this one implicitly and is
        // left for that element to consume.
        if self.starts_with("</") && self.peek_end_tag() == tag_name {
            self.skip_until('>');
        }

        DomNode::Element(elem)
    }

    /// Lower-cased name of the end tag at the cursor, without consuming it.
    fn peek_end_tag(&mut self) -> String {
        let saved = self.pos;
        self.advance(2);
        let name = self.parse_name().to_ascii_lowercase();
        self.pos = saved;
        name
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1);
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance(1);
                }
                let val = self.input[start..self.pos].to_string();
                if !self.eof() {
                    self.advance(1);
                }
                return decode_entities(&val);
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' || c == '/' {
                break;
            }
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    fn next_is_tag_start(&self) -> bool {
        let mut rest = self.input[self.pos..].chars().skip(1);
        match rest.next() {
            Some(c) => c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?',
            None => false,
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_whitespace_preserve(&mut self) {
        // Whitespace between tags is dropped; whitespace leading into text is
        // kept so inline runs keep their spacing.
        let saved = self.pos;
        self.skip_whitespace();
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_until(&mut self, end: char) {
        while !self.eof() && self.current_char() != end {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(1);
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&rsquo;", "\u{2019}")
        .replace("&laquo;", "\u{00AB}")
        .replace("&raquo;", "\u{00BB}")
        .replace("&eacute;", "\u{00E9}")
        .replace("&egrave;", "\u{00E8}")
        .replace("&agrave;", "\u{00E0}")
        .replace("&ccedil;", "\u{00E7}")
        // Last, so "&amp;lt;" stays "&lt;"
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_heading_then_paragraph() {
        let nodes = parse_html("<h1>Title</h1><p>Body text</p>");
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            DomNode::Element(e) => {
                assert_eq!(e.tag, Tag::H1);
                assert!(matches!(&e.children[0], DomNode::Text(t) if t == "Title"));
            }
            _ => panic!("Expected element"),
        }
    }

    #[test]
    fn parse_font_color_attribute() {
        let nodes = parse_html(r##"<font color="#ff0000">red</font>"##);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Font);
            assert_eq!(e.font_color(), Some("#ff0000"));
        } else {
            panic!("Expected font element");
        }
    }

    #[test]
    fn parse_inline_runs_keep_spacing() {
        let nodes = parse_html("<p>Hello <b>bold</b> world</p>");
        if let DomNode::Element(p) = &nodes[0] {
            assert_eq!(p.children.len(), 3);
            assert!(matches!(&p.children[2], DomNode::Text(t) if t == " world"));
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn stray_end_tag_does_not_cut_the_document() {
        let nodes = parse_html("<p>one</p></span><p>two</p><p>three</p>");
        assert_eq!(nodes.len(), 3);
        if let DomNode::Element(e) = &nodes[2] {
            assert_eq!(e.tag, Tag::P);
            assert!(matches!(&e.children[0], DomNode::Text(t) if t == "three"));
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn stray_end_tag_inside_element_is_skipped() {
        let nodes = parse_html("<p>a</b>b</p>");
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(p) = &nodes[0] {
            let texts: Vec<&str> = p
                .children
                .iter()
                .filter_map(|n| match n {
                    DomNode::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(texts, ["a", "b"]);
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn outer_end_tag_closes_unclosed_inner_element() {
        let nodes = parse_html("<p><b>bold</p>after");
        assert_eq!(nodes.len(), 2);
        if let DomNode::Element(p) = &nodes[0] {
            assert_eq!(p.tag, Tag::P);
            assert!(matches!(&p.children[0], DomNode::Element(b) if b.tag == Tag::B));
        } else {
            panic!("Expected p element");
        }
        assert!(matches!(&nodes[1], DomNode::Text(t) if t == "after"));
    }

    #[test]
    fn br_is_void() {
        let nodes = parse_html("<p>one<br>two</p>");
        if let DomNode::Element(p) = &nodes[0] {
            assert_eq!(p.children.len(), 3);
            assert!(matches!(&p.children[1], DomNode::Element(e) if e.tag == Tag::Br));
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let nodes = parse_html("<p>a < b</p>");
        if let DomNode::Element(p) = &nodes[0] {
            let text: String = p
                .children
                .iter()
                .filter_map(|c| match c {
                    DomNode::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(text, "a < b");
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn body_children_unwraps_document() {
        let nodes = parse_html("<html><head><title>x</title></head><body><p>hi</p></body></html>");
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn entities_are_decoded() {
        let nodes = parse_html("<p>Tom &amp; Jerry &lt;3</p>");
        if let DomNode::Element(p) = &nodes[0] {
            assert!(matches!(&p.children[0], DomNode::Text(t) if t == "Tom & Jerry <3"));
        } else {
            panic!("Expected p element");
        }
    }
}
