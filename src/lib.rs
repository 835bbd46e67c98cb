//! # printforge – HTML / Markdown → print-ready PDF
//!
//! This crate turns user-supplied HTML or Markdown into a styled PDF by
//! handing a prepared document to a headless Chrome instance. The pipeline
//! stages are:
//!
//! 1. **Validate** – request fields and print settings ([`validate`])
//! 2. **Normalize** – Markdown → HTML fragment ([`markdown`])
//! 3. **Index** – assign heading anchors, synthesize a TOC ([`toc`])
//! 4. **Style** – compose and inject the print stylesheet ([`style`])
//! 5. **Render** – print the document through a backend ([`render`])
//!
//! The [`server`] module exposes the pipeline over HTTP behind the
//! sliding-window limiter in [`rate_limit`].

pub mod config;
pub mod dom;
pub mod error;
pub mod markdown;
pub mod pipeline;
pub mod rate_limit;
pub mod render;
pub mod server;
pub mod settings;
pub mod style;
pub mod toc;
pub mod validate;

// Re-exports for convenience
pub use error::{ForgeError, Result};
pub use markdown::InputType;
pub use pipeline::{generate_pdf, prepare_document, Conversion};
pub use render::{ChromeBackend, RenderBackend};
pub use settings::{Orientation, PageSize, PrintSettings};
