//! Request validation – the gate every conversion passes before any
//! rendering starts.
//!
//! Settings arrive as loosely typed JSON, so each rule inspects the raw
//! [`Value`] and the first violated rule is reported. A successful pass
//! yields an immutable [`PrintSettings`].

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ForgeError, Result};
use crate::markdown::InputType;
use crate::settings::{Margins, Orientation, PageSize, PrintSettings};

/// Largest accepted document or upload, in bytes.
pub const MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;

/// Longest accepted header, footer or watermark text, in characters.
pub const MAX_TEXT_CHARS: usize = 500;

pub const MAX_MARGIN_MM: f64 = 100.0;

pub const ALLOWED_EXTENSIONS: [&str; 5] = [".html", ".htm", ".md", ".markdown", ".txt"];

pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "text/html",
    "text/markdown",
    "text/plain",
    "application/octet-stream",
];

const DEFAULT_FILENAME: &str = "converted.pdf";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Validate a raw settings value and build [`PrintSettings`] from it.
///
/// `None` and JSON `null` mean "all defaults". Missing fields fall back to
/// the defaults documented on [`PrintSettings`].
pub fn validate_settings(raw: Option<&Value>) -> Result<PrintSettings> {
    let empty = Map::new();
    let map = match raw {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ForgeError::validation(
                "settings",
                json_type(other),
                "Must be an object",
            ))
        }
    };

    let mut settings = PrintSettings::default();

    if let Some(v) = present(map, "pageSize") {
        settings.page_size = v
            .as_str()
            .and_then(PageSize::parse)
            .ok_or_else(|| {
                let allowed: Vec<&str> = PageSize::ALL.iter().map(|p| p.as_str()).collect();
                ForgeError::validation(
                    "pageSize",
                    display_value(v),
                    format!("Must be one of: {}", allowed.join(", ")),
                )
            })?;
    }

    if let Some(v) = present(map, "orientation") {
        settings.orientation = v
            .as_str()
            .and_then(Orientation::parse)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Orientation::ALL.iter().map(|o| o.as_str()).collect();
                ForgeError::validation(
                    "orientation",
                    display_value(v),
                    format!("Must be one of: {}", allowed.join(", ")),
                )
            })?;
    }

    let mut margins = Margins::default();
    for (field, slot) in [
        ("marginTop", &mut margins.top),
        ("marginBottom", &mut margins.bottom),
        ("marginLeft", &mut margins.left),
        ("marginRight", &mut margins.right),
    ] {
        if let Some(v) = map.get(field).filter(|v| !v.is_null()) {
            *slot = validate_margin(field, v)?;
        }
    }
    settings.margins = margins;

    settings.header_text = validate_text(map, "headerText")?;
    settings.footer_text = validate_text(map, "footerText")?;
    settings.watermark_text = validate_text(map, "watermarkText")?;

    settings.enable_page_numbers = validate_flag(map, "enablePageNumbers")?;
    settings.enable_table_of_contents = validate_flag(map, "enableTableOfContents")?;

    settings.filename = map
        .get("filename")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| sanitize_filename(Some(s)));

    Ok(settings)
}

fn validate_margin(field: &str, v: &Value) -> Result<f64> {
    let value = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(mm) if mm < 0.0 => Err(ForgeError::validation(
            field,
            display_value(v),
            "Cannot be negative",
        )),
        Some(mm) if mm.is_finite() && mm <= MAX_MARGIN_MM => Ok(mm),
        _ => Err(ForgeError::validation(
            field,
            display_value(v),
            "Must be a number between 0 and 100",
        )),
    }
}

fn validate_text(map: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    let Some(v) = present(map, field) else {
        return Ok(None);
    };
    let Some(text) = v.as_str() else {
        return Err(ForgeError::validation(field, json_type(v), "Must be a string"));
    };
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(ForgeError::validation(
            field,
            chars,
            format!("Must be at most {MAX_TEXT_CHARS} characters"),
        ));
    }
    Ok(Some(text.to_string()))
}

fn validate_flag(map: &Map<String, Value>, field: &str) -> Result<bool> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(ForgeError::validation(
            field,
            json_type(other),
            "Must be a boolean",
        )),
    }
}

/// A field counts as present unless it is missing, `null` or `""`.
fn present<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    map.get(field)
        .filter(|v| !v.is_null() && v.as_str() != Some(""))
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Content and input type
// ---------------------------------------------------------------------------

/// Check that `content` is a non-blank string within the size limit.
pub fn validate_content(content: Option<&Value>) -> Result<&str> {
    let text = match content {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => {
            return Err(ForgeError::Content(
                "Content must be a non-empty string".into(),
            ))
        }
    };
    check_content_text(text)?;
    Ok(text)
}

/// Blank and size checks shared by JSON bodies and decoded uploads.
pub fn check_content_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ForgeError::Content("Content cannot be empty".into()));
    }
    if text.len() > MAX_CONTENT_BYTES {
        return Err(ForgeError::Content("Content size exceeds 10MB limit".into()));
    }
    Ok(())
}

/// Resolve `inputType`, defaulting to HTML when it is absent.
pub fn validate_input_type(raw: Option<&Value>) -> Result<InputType> {
    match raw {
        None | Some(Value::Null) => Ok(InputType::Html),
        Some(v) => v.as_str().and_then(InputType::parse).ok_or_else(|| {
            ForgeError::validation(
                "inputType",
                display_value(v),
                "Must be either \"html\" or \"markdown\"",
            )
        }),
    }
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Check an uploaded file's size, extension and MIME type and infer the
/// input type from its extension.
pub fn validate_upload(filename: &str, mime: Option<&str>, size: usize) -> Result<InputType> {
    if size > MAX_CONTENT_BYTES {
        return Err(ForgeError::File("File size exceeds 10MB limit".into()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ForgeError::File(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let essence = mime
        .and_then(|m| m.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if !ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
        return Err(ForgeError::File(format!("Invalid MIME type: {essence}")));
    }

    Ok(match extension.as_str() {
        ".md" | ".markdown" => InputType::Markdown,
        _ => InputType::Html,
    })
}

// ---------------------------------------------------------------------------
// Sanitizers
// ---------------------------------------------------------------------------

struct SanitizePatterns {
    script: Regex,
    javascript: Regex,
    handler: Regex,
    data_html: Regex,
    vbscript: Regex,
}

fn patterns() -> &'static SanitizePatterns {
    static PATTERNS: OnceLock<SanitizePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SanitizePatterns {
        script: Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid script pattern"),
        javascript: Regex::new(r"(?i)javascript:").expect("valid scheme pattern"),
        handler: Regex::new(r"(?i)on\w+\s*=").expect("valid handler pattern"),
        data_html: Regex::new(r"(?i)data:text/html").expect("valid data-uri pattern"),
        vbscript: Regex::new(r"(?i)vbscript:").expect("valid scheme pattern"),
    })
}

/// Strip script blocks, script URL schemes and inline event handlers from
/// user HTML before it is previewed or rendered.
pub fn sanitize_html(html: &str) -> String {
    let p = patterns();
    let html = p.script.replace_all(html, "");
    let html = p.javascript.replace_all(&html, "");
    let html = p.handler.replace_all(&html, "");
    let html = p.data_html.replace_all(&html, "data:text/plain");
    p.vbscript.replace_all(&html, "").into_owned()
}

/// Reduce a user-supplied name to `[A-Za-z0-9.-_]`, at most 100 characters.
pub fn sanitize_filename(name: Option<&str>) -> String {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return DEFAULT_FILENAME.to_string();
    };
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.chars().take(100).collect()
}
