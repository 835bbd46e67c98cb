//! Markdown normalizer – turns the request content into an HTML fragment.

use pulldown_cmark::{html, Options, Parser};

/// The format of the submitted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    #[default]
    Html,
    Markdown,
}

impl InputType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "html" => Some(InputType::Html),
            "markdown" => Some(InputType::Markdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Html => "html",
            InputType::Markdown => "markdown",
        }
    }
}

/// Normalize `content` to HTML.
///
/// HTML passes through untouched and empty input yields an empty string.
/// Markdown is rendered with tables, strikethrough, task lists and
/// footnotes enabled; malformed markdown degrades the way the renderer
/// decides and never fails.
pub fn process_content(content: &str, input_type: InputType) -> String {
    if content.is_empty() {
        return String::new();
    }
    match input_type {
        InputType::Html => content.to_string(),
        InputType::Markdown => markdown_to_html(content),
    }
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
