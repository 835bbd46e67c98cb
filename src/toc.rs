//! Heading indexer and table-of-contents synthesizer.
//!
//! Headings are found by walking the parsed tree, never by pattern matching
//! on the raw string. Every heading gets an anchor: its own `id` when it has
//! one, otherwise `heading-<n>` where `n` counts *all* headings seen so far.

use crate::dom::{escape_html, find_element, parse_html, walk_elements, DomNode, Tag};

/// Title shown at the top of the generated table of contents.
pub const TOC_TITLE: &str = "Table of Contents";

/// One heading found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    /// Heading level, 1..=6.
    pub level: u8,
    /// Text content with nested tags stripped.
    pub text: String,
    /// Anchor the TOC links to.
    pub id: String,
    /// Whether `id` had to be synthesized.
    pub synthesized: bool,
}

/// Offsets at which the rewrite splices new markup into the source.
struct HeadingIndex {
    headings: Vec<HeadingRecord>,
    /// Start-tag offsets of headings that need an `id` attribute, paired
    /// with the index of their record.
    id_insertions: Vec<(usize, usize)>,
    /// Offset just past the `<body>` start tag, if the document has one.
    body_start: Option<usize>,
}

fn scan(nodes: &[DomNode]) -> HeadingIndex {
    let mut headings = Vec::new();
    let mut id_insertions = Vec::new();

    walk_elements(nodes, &mut |e| {
        let Some(level) = e.tag.heading_level() else {
            return;
        };
        let index = headings.len();
        let (id, synthesized) = match e.id() {
            Some(id) => (id.to_string(), false),
            None => {
                id_insertions.push((e.attribute_insert_offset(), index));
                (format!("heading-{index}"), true)
            }
        };
        headings.push(HeadingRecord {
            level,
            text: e.text_content(),
            id,
            synthesized,
        });
    });

    HeadingIndex {
        headings,
        id_insertions,
        body_start: find_element(nodes, &Tag::Body).map(|b| b.start_tag.end),
    }
}

/// Every heading in `html`, in document order.
pub fn index_headings(html: &str) -> Vec<HeadingRecord> {
    scan(&parse_html(html)).headings
}

/// Give every heading an anchor and put a linked table of contents, followed
/// by a page break, at the start of the body (or of the whole string when
/// there is no `<body>`).
///
/// Documents without headings are returned unchanged.
pub fn generate_table_of_contents(html: &str) -> String {
    let index = scan(&parse_html(html));
    if index.headings.is_empty() {
        return html.to_string();
    }
    log::debug!(
        "Indexed {} headings ({} anchors synthesized)",
        index.headings.len(),
        index.id_insertions.len()
    );

    let toc = build_toc(&index.headings);

    let mut insertions: Vec<(usize, String)> = index
        .id_insertions
        .iter()
        .map(|&(offset, i)| {
            let id = escape_html(&index.headings[i].id);
            (offset, format!(" id=\"{id}\""))
        })
        .collect();
    insertions.push((index.body_start.unwrap_or(0), toc));
    insertions.sort_by_key(|(offset, _)| *offset);

    let extra: usize = insertions.iter().map(|(_, s)| s.len()).sum();
    let mut out = String::with_capacity(html.len() + extra);
    let mut cursor = 0;
    for (offset, text) in &insertions {
        out.push_str(&html[cursor..*offset]);
        out.push_str(text);
        cursor = *offset;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Render the TOC fragment for `headings`.
///
/// Nesting follows level transitions: going deeper opens one list per level
/// skipped, going shallower closes one per level. Depth starts at level 1,
/// so it never drops below one open list.
pub fn build_toc(headings: &[HeadingRecord]) -> String {
    let mut toc = String::from("<div class=\"table-of-contents\"><h2>");
    toc.push_str(TOC_TITLE);
    toc.push_str("</h2><ul>");

    let mut depth: u8 = 1;
    for heading in headings {
        let level = heading.level.clamp(1, 6);
        if level > depth {
            toc.push_str(&"<ul>".repeat(usize::from(level - depth)));
        } else if level < depth {
            toc.push_str(&"</ul>".repeat(usize::from(depth - level)));
        }
        depth = level;
        toc.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>",
            escape_html(&heading.id),
            escape_html(&heading.text)
        ));
    }
    toc.push_str(&"</ul>".repeat(usize::from(depth)));
    toc.push_str("</div><div class=\"page-break\"></div>");
    toc
}
