//! HTML parser – converts an HTML string into a light DOM tree that keeps
//! the byte span of every start and end tag.
//!
//! The tree is only ever read. Rewrites (heading ids, TOC placement, style
//! injection) splice new text into the *original* string at recorded
//! offsets, so markup the pipeline does not touch comes out byte-for-byte
//! identical.
//!
//! Parsing, walking and dropping are all iterative, so nesting depth is
//! bounded only by memory.
//!
//! Parsing rules, enough for real-world fragments and documents:
//! - comments, doctypes and processing instructions are skipped
//! - `script`, `style`, `textarea` and `title` hold raw text
//! - void elements and `/>` never take children
//! - an end tag closes the nearest open element with that name; stray end
//!   tags are ignored
//! - a heading start tag implicitly closes an open heading

use std::collections::HashMap;
use std::ops::Range;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// Element kinds the pipeline cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    /// `h1`..`h6`, carrying the level.
    Heading(u8),
    Script,
    Style,
    /// Any other element, by lowercase name.
    Other(String),
}

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

impl Tag {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "script" => Tag::Script,
            "style" => Tag::Style,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Tag::Heading(lower.as_bytes()[1] - b'0'),
            _ => Tag::Other(lower),
        }
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Tag::Heading(level) => Some(*level),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Other(name) if VOID_ELEMENTS.contains(&name.as_str()))
    }

    fn is_raw_text(&self) -> bool {
        match self {
            Tag::Script | Tag::Style => true,
            Tag::Other(name) => name == "textarea" || name == "title",
            _ => false,
        }
    }
}

/// A node in our DOM tree.
#[derive(Debug)]
pub enum DomNode {
    Element(ElementNode),
    /// Text with entities decoded.
    Text(String),
}

/// An element node carrying tag, attributes, children and source spans.
#[derive(Debug)]
pub struct ElementNode {
    pub tag: Tag,
    /// Tag name exactly as written in the source.
    pub name: String,
    /// Attributes keyed by lowercase name; the first occurrence wins.
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
    /// Byte range of the start tag, `<` through `>`.
    pub start_tag: Range<usize>,
    /// Byte range of the matching end tag, when one was present.
    pub end_tag: Option<Range<usize>>,
}

impl ElementNode {
    /// The `id` attribute, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.attributes
            .get("id")
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Byte offset just past the tag name, where new attributes can go.
    pub fn attribute_insert_offset(&self) -> usize {
        self.start_tag.start + 1 + self.name.len()
    }

    /// Concatenated descendant text with whitespace runs collapsed.
    /// Script and style bodies are not rendered, so they are skipped.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        let mut stack = vec![self.children.iter()];
        while let Some(iter) = stack.last_mut() {
            match iter.next() {
                Some(DomNode::Text(t)) => raw.push_str(t),
                Some(DomNode::Element(e)) => {
                    if !matches!(e.tag, Tag::Script | Tag::Style) {
                        stack.push(e.children.iter());
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// Dropping a deeply nested tree recursively would exhaust the stack, so
// descendants are moved onto a heap worklist and dropped one level at a time.
impl Drop for ElementNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            if let DomNode::Element(mut e) = node {
                pending.append(&mut e.children);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tree walking
// ---------------------------------------------------------------------------

/// Pre-order iterator over every element below a node list.
pub struct Elements<'a> {
    stack: Vec<std::slice::Iter<'a, DomNode>>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a ElementNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(iter) = self.stack.last_mut() {
            match iter.next() {
                Some(DomNode::Element(e)) => {
                    self.stack.push(e.children.iter());
                    return Some(e);
                }
                Some(DomNode::Text(_)) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// Every element in document order (pre-order, by start tag).
pub fn elements(nodes: &[DomNode]) -> Elements<'_> {
    Elements {
        stack: vec![nodes.iter()],
    }
}

/// Visit every element in document order.
pub fn walk_elements<'a, F>(nodes: &'a [DomNode], visit: &mut F)
where
    F: FnMut(&'a ElementNode),
{
    for e in elements(nodes) {
        visit(e);
    }
}

/// First element, in document order, with the given tag.
pub fn find_element<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    elements(nodes).find(|e| &e.tag == tag)
}

// ---------------------------------------------------------------------------
// Parser – single pass over HTML with an explicit stack of open elements
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes. Never fails; malformed
/// markup is recovered the way the rules in the module docs describe.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    Parser::new(html).run()
}

/// An element whose children are still being parsed.
struct OpenElement {
    elem: ElementNode,
    lower: String,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Currently open elements, innermost last.
    stack: Vec<OpenElement>,
    /// How many elements of each lowercase name are open.
    open_counts: HashMap<String, usize>,
    roots: Vec<DomNode>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            stack: Vec::new(),
            open_counts: HashMap::new(),
            roots: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<DomNode> {
        while !self.eof() {
            if self.starts_with("</") {
                let name = self.peek_end_tag_name();
                if self.open_counts.get(&name).copied().unwrap_or(0) > 0 {
                    self.close_through(&name);
                } else {
                    self.skip_past('>');
                }
                continue;
            }
            if self.starts_with("<!--") {
                self.skip_comment();
                continue;
            }
            if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_past('>');
                continue;
            }
            if self.at_start_tag() {
                let in_heading = self
                    .stack
                    .last()
                    .is_some_and(|open| open.elem.tag.heading_level().is_some());
                if in_heading && self.peek_start_tag().heading_level().is_some() {
                    self.pop_open(None);
                }
                self.parse_element();
                continue;
            }
            let text = self.parse_text();
            self.attach(text);
        }
        while !self.stack.is_empty() {
            self.pop_open(None);
        }
        self.roots
    }

    /// Close open elements up to and including the innermost one named
    /// `name`, which takes the end tag at the current position.
    fn close_through(&mut self, name: &str) {
        while let Some(open) = self.stack.last() {
            if open.lower == name {
                let end_start = self.pos;
                self.skip_past('>');
                self.pop_open(Some(end_start..self.pos));
                return;
            }
            self.pop_open(None);
        }
    }

    fn pop_open(&mut self, end_tag: Option<Range<usize>>) {
        let Some(OpenElement { mut elem, lower }) = self.stack.pop() else {
            return;
        };
        if let Some(count) = self.open_counts.get_mut(&lower) {
            *count -= 1;
        }
        elem.end_tag = end_tag;
        self.attach(DomNode::Element(elem));
    }

    fn attach(&mut self, node: DomNode) {
        match self.stack.last_mut() {
            Some(open) => open.elem.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // The first character may be a '<' that does not open a tag.
        self.advance_char();
        let end = self.input[self.pos..]
            .find('<')
            .map_or(self.input.len(), |i| self.pos + i);
        self.pos = end;
        DomNode::Text(decode_entities(&self.input[start..end]))
    }

    fn parse_element(&mut self) {
        let start = self.pos;
        self.pos += 1; // '<'
        let name = self.parse_name().to_string();
        let tag = Tag::from_name(&name);
        let mut attributes = HashMap::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            if self.eof() {
                break;
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if self.starts_with("/") {
                self.pos += 1;
                continue;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                self.advance_char();
                continue;
            }
            attributes.entry(key.to_ascii_lowercase()).or_insert(value);
        }

        let mut elem = ElementNode {
            tag,
            name,
            attributes,
            children: Vec::new(),
            start_tag: start..self.pos,
            end_tag: None,
        };
        if self_closing || elem.tag.is_void() || self.eof() {
            self.attach(DomNode::Element(elem));
            return;
        }

        let lower = elem.name.to_ascii_lowercase();
        if !elem.tag.is_raw_text() {
            *self.open_counts.entry(lower.clone()).or_default() += 1;
            self.stack.push(OpenElement { elem, lower });
            return;
        }

        let closing = format!("</{lower}");
        let text_end = find_ignore_ascii_case(&self.input.as_bytes()[self.pos..], closing.as_bytes())
            .map_or(self.input.len(), |i| self.pos + i);
        let raw = &self.input[self.pos..text_end];
        if !raw.is_empty() {
            elem.children.push(DomNode::Text(raw.to_string()));
        }
        self.pos = text_end;
        if !self.eof() && self.peek_end_tag_name() == lower {
            let end_start = self.pos;
            self.skip_past('>');
            elem.end_tag = Some(end_start..self.pos);
        }
        self.attach(DomNode::Element(elem));
    }

    fn parse_name(&mut self) -> &'a str {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if b.is_ascii_whitespace() || b == b'=' || b == b'>' || b == b'/' {
                break;
            }
            self.pos += 1;
        }
        let key = self.input[start..self.pos].to_string();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.pos += 1; // '='
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.input[self.pos..].starts_with(quote) {
                self.pos += 1;
                let end = self.input[self.pos..]
                    .find(quote)
                    .map_or(self.input.len(), |i| self.pos + i);
                let value = decode_entities(&self.input[self.pos..end]);
                self.pos = (end + 1).min(self.input.len());
                return value;
            }
        }
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && !bytes[self.pos].is_ascii_whitespace() && bytes[self.pos] != b'>' {
            self.pos += 1;
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn at_start_tag(&self) -> bool {
        let bytes = self.input.as_bytes();
        bytes.get(self.pos) == Some(&b'<')
            && bytes.get(self.pos + 1).is_some_and(|b| b.is_ascii_alphabetic())
    }

    fn peek_start_tag(&self) -> Tag {
        Tag::from_name(name_at(self.input, self.pos + 1))
    }

    fn peek_end_tag_name(&self) -> String {
        name_at(self.input, self.pos + 2).to_ascii_lowercase()
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, delim: char) {
        self.pos = self.input[self.pos..]
            .find(delim)
            .map_or(self.input.len(), |i| self.pos + i + delim.len_utf8());
    }

    fn skip_comment(&mut self) {
        self.pos += 4; // <!--
        self.pos = self.input[self.pos..]
            .find("-->")
            .map_or(self.input.len(), |i| self.pos + i + 3);
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }
}

/// The tag name starting at byte `at`.
fn name_at(input: &str, at: usize) -> &str {
    let Some(rest) = input.get(at..) else {
        return "";
    };
    let len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
        .count();
    &rest[..len]
}

/// Byte offset of the first ASCII-case-insensitive match of `needle`.
fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let (&first, _) = needle.split_first()?;
    let mut from = 0;
    while let Some(i) = haystack[from..].iter().position(|&b| b == first) {
        let at = from + i;
        match haystack.get(at..at + needle.len()) {
            Some(window) if window.eq_ignore_ascii_case(needle) => return Some(at),
            Some(_) => from = at + 1,
            None => return None,
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Decode the named entities common in generated HTML plus numeric
/// character references. Unknown entities are left as written.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .bytes()
            .take(11)
            .position(|b| b == b';')
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escape text for use in HTML element content or a quoted attribute value.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
