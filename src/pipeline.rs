//! Pipeline – ties together normalization, TOC synthesis, style injection
//! and rendering into a single function call.
//!
//! Everything up to [`prepare_document`] is pure and cheap; only
//! [`generate_pdf`] touches the render backend.

use crate::error::{ForgeError, Result};
use crate::markdown::{process_content, InputType};
use crate::render::{PdfRenderOptions, RenderBackend};
use crate::settings::PrintSettings;
use crate::style::apply_print_styles;
use crate::toc::generate_table_of_contents;

/// Result of a full conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub pdf: Vec<u8>,
    /// The styled document that was rendered.
    pub html: String,
}

/// Content → print-ready HTML: normalize, add the TOC when enabled, inject
/// the print stylesheet.
pub fn prepare_document(content: &str, input_type: InputType, settings: &PrintSettings) -> String {
    let mut html = process_content(content, input_type);
    if settings.enable_table_of_contents {
        html = generate_table_of_contents(&html);
    }
    apply_print_styles(&html, settings)
}

/// Full pipeline: content → PDF bytes via `backend`.
///
/// `settings` must already be validated. Blank content is rejected before
/// the backend is touched; backend failures are reported, not retried.
pub fn generate_pdf(
    content: &str,
    input_type: InputType,
    settings: &PrintSettings,
    backend: &dyn RenderBackend,
) -> Result<Conversion> {
    if content.trim().is_empty() {
        return Err(ForgeError::Content("Content cannot be empty".into()));
    }

    let html = prepare_document(content, input_type, settings);
    let options = PdfRenderOptions::from_settings(settings);
    let pdf = backend.render(&html, &options)?;
    log::info!(
        "Rendered {} document: {} bytes of HTML -> {} bytes of PDF",
        input_type.as_str(),
        html.len(),
        pdf.len()
    );

    Ok(Conversion { pdf, html })
}
