//! Integration tests for the printforge pipeline.
//!
//! These tests validate:
//! - Markdown and HTML normalize into the expected fragments
//! - Heading anchors and the table of contents are synthesized correctly
//! - The print stylesheet reflects the settings and lands in the right place
//! - The full pipeline hands the backend a print-ready document

use std::sync::Mutex;

use printforge::dom::{parse_html, DomNode, Tag};
use printforge::render::PdfRenderOptions;
use printforge::style::apply_print_styles;
use printforge::toc::{generate_table_of_contents, index_headings, TOC_TITLE};
use printforge::validate::validate_settings;
use printforge::{generate_pdf, prepare_document, ForgeError, InputType, PrintSettings, RenderBackend};
use serde_json::json;

// =====================================================================
// Helper
// =====================================================================

#[derive(Default)]
struct MockBackend {
    calls: Mutex<Vec<(String, PdfRenderOptions)>>,
}

impl RenderBackend for MockBackend {
    fn render(&self, html: &str, options: &PdfRenderOptions) -> printforge::Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((html.to_string(), options.clone()));
        Ok(b"%PDF-1.4\n%mock\n".to_vec())
    }
}

fn settings(value: serde_json::Value) -> PrintSettings {
    validate_settings(Some(&value)).expect("settings should validate")
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// =====================================================================
// Normalization
// =====================================================================

#[test]
fn markdown_heading_and_paragraph() {
    let html = prepare_document("# T\n\ncontent", InputType::Markdown, &PrintSettings::default());
    assert!(html.contains("<h1>T</h1>"));
    assert!(html.contains("<p>content</p>"));
}

#[test]
fn markdown_tables_render() {
    let md = "| a | b |\n|---|---|\n| 1 | 2 |\n";
    let html = prepare_document(md, InputType::Markdown, &PrintSettings::default());
    assert!(html.contains("<table>"));
    assert!(html.contains("<td>2</td>"));
}

#[test]
fn html_body_content_is_preserved() {
    let doc = "<div class=\"x\"><em>keep</em> me</div>";
    let html = prepare_document(doc, InputType::Html, &PrintSettings::default());
    assert!(html.contains(doc));
}

// =====================================================================
// Table of contents
// =====================================================================

#[test]
fn chapter_section_scenario() {
    let s = settings(json!({ "enableTableOfContents": true }));
    let html = prepare_document(
        "<h1>Chapter 1</h1><h2>Section 1.1</h2>",
        InputType::Html,
        &s,
    );
    assert!(html.contains(TOC_TITLE));
    assert!(html.contains(r##"<a href="#heading-0">Chapter 1</a>"##));
    assert!(html.contains(r##"<a href="#heading-1">Section 1.1</a>"##));
    assert!(html.contains(r#"<h1 id="heading-0">Chapter 1</h1>"#));
    assert!(html.contains(r#"<h2 id="heading-1">Section 1.1</h2>"#));
}

#[test]
fn toc_disabled_leaves_headings_alone() {
    let html = prepare_document("<h1>Only</h1>", InputType::Html, &PrintSettings::default());
    assert!(!html.contains("table-of-contents\"><h2>"));
    assert!(html.contains("<h1>Only</h1>"));
}

#[test]
fn every_toc_link_resolves_to_a_heading() {
    let doc = r#"<html><body>
        <h1>Intro</h1>
        <h3 id="deep">Deep <em>dive</em></h3>
        <h2>Back up</h2>
        <div><h4>Nested in div</h4></div>
        <h1 id="">Empty id</h1>
    </body></html>"#;
    let out = generate_table_of_contents(doc);

    let headings = index_headings(doc);
    assert_eq!(headings.len(), 5);
    for h in &headings {
        assert!(out.contains(&format!("href=\"#{}\"", h.id)), "missing link to {}", h.id);
        assert!(out.contains(&format!("id=\"{}\"", h.id)), "missing anchor {}", h.id);
    }
    assert_eq!(headings[1].id, "deep");
    assert_eq!(headings[1].text, "Deep dive");
    assert_eq!(headings[4].id, "heading-4");
}

#[test]
fn toc_goes_at_start_of_body() {
    let out = generate_table_of_contents("<html><head><title>t</title></head><body><h1>A</h1></body></html>");
    let body = out.find("<body>").unwrap() + "<body>".len();
    assert!(out[body..].starts_with("<div class=\"table-of-contents\">"));
    assert!(out.contains("<div class=\"page-break\"></div><h1 id=\"heading-0\">A</h1>"));
}

#[test]
fn toc_lists_are_balanced() {
    let doc = "<h3>a</h3><h1>b</h1><h6>c</h6><h2>d</h2>";
    let out = generate_table_of_contents(doc);
    assert_eq!(count(&out, "<ul>"), count(&out, "</ul>"));
}

#[test]
fn headings_inside_scripts_and_comments_are_ignored() {
    let doc = "<!-- <h1>no</h1> --><script>var s = '<h2>no</h2>';</script><h1>yes</h1>";
    let headings = index_headings(doc);
    assert_eq!(headings.len(), 1);
    assert_eq!(headings[0].text, "yes");
}

// =====================================================================
// Print styles
// =====================================================================

#[test]
fn stylesheet_reflects_settings() {
    let s = settings(json!({
        "pageSize": "Letter",
        "orientation": "landscape",
        "marginTop": 10,
        "marginRight": 15,
        "marginBottom": 20,
        "marginLeft": 25,
    }));
    let html = apply_print_styles("<p>x</p>", &s);
    assert!(html.contains("size: Letter landscape;"));
    assert!(html.contains("margin: 10mm 15mm 20mm 25mm;"));
}

#[test]
fn watermark_rule_present_only_when_set() {
    let plain = apply_print_styles("<p>x</p>", &PrintSettings::default());
    assert!(!plain.contains("body::before"));

    let s = settings(json!({ "watermarkText": "DRAFT" }));
    let marked = apply_print_styles("<p>x</p>", &s);
    assert!(marked.contains("body::before"));
    assert!(marked.contains("content: \"DRAFT\""));
}

#[test]
fn styles_land_in_existing_head() {
    let doc = "<html><head><title>t</title></head><body><p>x</p></body></html>";
    let out = apply_print_styles(doc, &PrintSettings::default());
    let style = out.find("<style>").unwrap();
    assert!(style > out.find("<title>").unwrap());
    assert!(style < out.find("</head>").unwrap());
    assert_eq!(count(&out, "<head>"), 1);
}

#[test]
fn styles_create_head_under_html() {
    let out = apply_print_styles("<html><body><p>x</p></body></html>", &PrintSettings::default());
    assert!(out.starts_with("<html><head><style>"));
    assert!(out.ends_with("</head><body><p>x</p></body></html>"));
}

#[test]
fn fragment_is_wrapped_into_a_document() {
    let out = apply_print_styles("<p>x</p>", &PrintSettings::default());
    let nodes = parse_html(&out);
    assert_eq!(nodes.len(), 1);
    match &nodes[0] {
        DomNode::Element(root) => assert_eq!(root.tag, Tag::Html),
        other => panic!("expected <html> root, got {other:?}"),
    }
    assert!(out.ends_with("<body><p>x</p></body></html>"));
}

#[test]
fn deeply_nested_document_is_styled() {
    let doc = "<div>".repeat(200_000);
    let out = apply_print_styles(&doc, &PrintSettings::default());
    assert!(out.starts_with("<html><head><style>"));
    assert!(out.ends_with(&format!("<body>{doc}</body></html>")));
}

#[test]
fn many_style_blocks_prepare_quickly() {
    let doc = "<p><style>a{}</style></p>".repeat(40_000);
    let s = settings(json!({ "enableTableOfContents": true }));
    let started = std::time::Instant::now();
    let out = prepare_document(&doc, InputType::Html, &s);
    assert!(
        started.elapsed() < std::time::Duration::from_secs(5),
        "took {:?}",
        started.elapsed()
    );
    assert!(out.contains(&doc));
}

// =====================================================================
// Full pipeline
// =====================================================================

#[test]
fn backend_receives_styled_document_and_options() {
    let backend = MockBackend::default();
    let s = settings(json!({
        "pageSize": "A5",
        "orientation": "landscape",
        "footerText": "footer",
        "enablePageNumbers": true,
        "enableTableOfContents": true,
    }));
    let conversion = generate_pdf("# One\n\n## Two", InputType::Markdown, &s, &backend).unwrap();
    assert!(conversion.pdf.starts_with(b"%PDF-"));

    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (html, options) = &calls[0];
    assert_eq!(html, &conversion.html);
    assert!(html.contains("size: A5 landscape;"));
    assert!(html.contains(r##"href="#heading-1""##));
    assert!(options.landscape);
    assert!(options.display_header_footer);
    let footer = options.footer_template.as_deref().unwrap();
    assert!(footer.contains("footer"));
    assert!(footer.contains("pageNumber"));
}

#[test]
fn blank_content_never_reaches_backend() {
    let backend = MockBackend::default();
    let err = generate_pdf("  \n\t", InputType::Markdown, &PrintSettings::default(), &backend)
        .unwrap_err();
    assert!(matches!(err, ForgeError::Content(_)));
    assert!(backend.calls.lock().unwrap().is_empty());
}

#[test]
fn header_text_is_escaped_for_the_template() {
    let backend = MockBackend::default();
    let s = settings(json!({ "headerText": "<b>Q&A</b>" }));
    generate_pdf("<p>x</p>", InputType::Html, &s, &backend).unwrap();
    let calls = backend.calls.lock().unwrap();
    let header = calls[0].1.header_template.as_deref().unwrap();
    assert!(header.contains("&lt;b&gt;Q&amp;A&lt;/b&gt;"));
}
