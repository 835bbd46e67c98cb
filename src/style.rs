//! Print stylesheet composer – turns [`PrintSettings`] into a `<style>`
//! block and splices it into the document.
//!
//! Also builds the header/footer templates handed to the render backend.
//! User-supplied text is escaped for the context it lands in: CSS string
//! escapes for the watermark, HTML escapes for header and footer.

use crate::dom::{escape_html, find_element, parse_html, Tag};
use crate::settings::PrintSettings;

const BASE_CSS: &str = r#"
body {
  font-family: 'Segoe UI', 'Noto Sans', 'Malgun Gothic', Arial, sans-serif;
  line-height: 1.6;
  color: #333;
}

p {
  color: #333;
}

.table-of-contents {
  border: 1px solid #ddd;
  padding: 20px;
  margin-bottom: 30px;
  border-radius: 5px;
  background-color: #f9f9f9;
}

.table-of-contents h2 {
  margin-top: 0;
  color: #2563eb;
}

.table-of-contents ul {
  list-style-type: none;
  padding-left: 20px;
}

.table-of-contents li {
  margin: 5px 0;
}

.table-of-contents a {
  text-decoration: none;
  color: #2563eb;
}

.page-break {
  page-break-before: always;
}

.avoid-break {
  page-break-inside: avoid;
}

h1, h2, h3, h4, h5, h6 {
  page-break-after: avoid;
  margin-top: 1.5em;
  color: #1e293b;
}

pre {
  background-color: #f4f4f4;
  border: 1px solid #ddd;
  border-radius: 4px;
  padding: 10px;
  overflow-x: auto;
}

code {
  background-color: #f4f4f4;
  padding: 2px 4px;
  border-radius: 3px;
  font-family: 'Courier New', monospace;
}

blockquote {
  border-left: 4px solid #2563eb;
  padding-left: 15px;
  margin-left: 0;
  color: #666;
  font-style: italic;
}

@media print {
  body {
    -webkit-print-color-adjust: exact !important;
    print-color-adjust: exact !important;
  }
}
"#;

/// Where [`apply_print_styles`] puts the stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPoint {
    /// Immediately before the `</head>` tag at this offset.
    BeforeHeadClose(usize),
    /// A new `<head>` right after the `<html>` start tag ending here.
    AfterHtmlOpen(usize),
    /// No scaffold: wrap everything in a full document.
    WrapDocument,
}

/// Decide where the stylesheet goes in `html`.
pub fn injection_point(html: &str) -> InjectionPoint {
    let nodes = parse_html(html);
    if let Some(close) = find_element(&nodes, &Tag::Head).and_then(|h| h.end_tag.as_ref()) {
        return InjectionPoint::BeforeHeadClose(close.start);
    }
    match find_element(&nodes, &Tag::Html) {
        Some(root) => InjectionPoint::AfterHtmlOpen(root.start_tag.end),
        None => InjectionPoint::WrapDocument,
    }
}

/// Build the complete `<style>` element for `settings`.
pub fn compose_stylesheet(settings: &PrintSettings) -> String {
    let m = &settings.margins;
    let mut css = String::with_capacity(BASE_CSS.len() + 512);
    css.push_str("<style>\n@page {\n");
    css.push_str(&format!(
        "  size: {} {};\n",
        settings.page_size, settings.orientation
    ));
    css.push_str(&format!(
        "  margin: {}mm {}mm {}mm {}mm;\n}}\n",
        m.top, m.right, m.bottom, m.left
    ));
    css.push_str(BASE_CSS);
    if let Some(text) = &settings.watermark_text {
        css.push_str(&watermark_rule(text));
    }
    css.push_str("</style>");
    css
}

fn watermark_rule(text: &str) -> String {
    format!(
        r#"
body::before {{
  content: "{}";
  position: fixed;
  top: 50%;
  left: 50%;
  transform: translate(-50%, -50%) rotate(-45deg);
  font-size: 72px;
  color: rgba(0, 0, 0, 0.1);
  z-index: -1;
  white-space: nowrap;
  pointer-events: none;
}}
"#,
        escape_css_string(text)
    )
}

/// Insert the print stylesheet into `html`.
///
/// Repeated calls are not guarded: each call adds another `<style>` block
/// with identical rules.
pub fn apply_print_styles(html: &str, settings: &PrintSettings) -> String {
    let styles = compose_stylesheet(settings);
    let point = injection_point(html);
    log::debug!("Injecting print styles at {point:?}");
    match point {
        InjectionPoint::BeforeHeadClose(at) => splice(html, at, &styles),
        InjectionPoint::AfterHtmlOpen(at) => splice(html, at, &format!("<head>{styles}</head>")),
        InjectionPoint::WrapDocument => {
            format!("<html><head>{styles}</head><body>{html}</body></html>")
        }
    }
}

fn splice(html: &str, at: usize, text: &str) -> String {
    let mut out = String::with_capacity(html.len() + text.len());
    out.push_str(&html[..at]);
    out.push_str(text);
    out.push_str(&html[at..]);
    out
}

/// Header template for the render backend, when header text is set.
pub fn header_template(settings: &PrintSettings) -> Option<String> {
    settings.header_text.as_ref().map(|text| {
        format!(
            r#"<div style="font-size: 10px; width: 100%; text-align: center;">{}</div>"#,
            escape_html(text)
        )
    })
}

/// Footer template for the render backend: footer text on the left and,
/// when enabled, `Page N of M` on the right.
pub fn footer_template(settings: &PrintSettings) -> Option<String> {
    if settings.footer_text.is_none() && !settings.enable_page_numbers {
        return None;
    }
    let text = settings
        .footer_text
        .as_deref()
        .map(escape_html)
        .unwrap_or_default();
    let numbers = if settings.enable_page_numbers {
        r#"<span>Page <span class="pageNumber"></span> of <span class="totalPages"></span></span>"#
    } else {
        ""
    };
    Some(format!(
        r#"<div style="font-size: 10px; width: 100%; display: flex; justify-content: space-between; padding: 0 20px;"><span>{text}</span>{numbers}</div>"#
    ))
}

/// Escape text for a double-quoted CSS string. `<` and `>` are escaped too
/// so the value can never close the surrounding `<style>` element.
pub fn escape_css_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '<' | '>' => out.push_str(&format!("\\{:X} ", u32::from(c))),
            c if c.is_control() => out.push_str(&format!("\\{:X} ", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}
