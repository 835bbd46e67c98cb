//! Rendering backend – the only part of the pipeline that leaves the
//! process. A [`RenderBackend`] turns a styled HTML string into PDF bytes.
//!
//! [`ChromeBackend`] drives a headless Chromium per call. The browser is
//! owned by the call's stack frame, so it is shut down on every exit path.

use std::path::PathBuf;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use headless_chrome::{types::PrintToPdfOptions, Browser, LaunchOptions};

use crate::error::{ForgeError, Result};
use crate::settings::PrintSettings;
use crate::style::{footer_template, header_template};

const MM_PER_INCH: f64 = 25.4;

/// Page and decoration options passed to the backend, in the units the
/// print engine expects (inches).
#[derive(Debug, Clone, PartialEq)]
pub struct PdfRenderOptions {
    /// Portrait paper width; `landscape` rotates it.
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub landscape: bool,
    pub margin_top_in: f64,
    pub margin_right_in: f64,
    pub margin_bottom_in: f64,
    pub margin_left_in: f64,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub print_background: bool,
}

impl PdfRenderOptions {
    pub fn from_settings(settings: &PrintSettings) -> Self {
        let (w, h) = settings.page_size.dimensions_mm();
        let m = &settings.margins;
        Self {
            paper_width_in: w / MM_PER_INCH,
            paper_height_in: h / MM_PER_INCH,
            landscape: settings.orientation == crate::settings::Orientation::Landscape,
            margin_top_in: m.top / MM_PER_INCH,
            margin_right_in: m.right / MM_PER_INCH,
            margin_bottom_in: m.bottom / MM_PER_INCH,
            margin_left_in: m.left / MM_PER_INCH,
            display_header_footer: settings.displays_header_footer(),
            header_template: header_template(settings),
            footer_template: footer_template(settings),
            print_background: true,
        }
    }
}

/// Renders a complete HTML document to PDF bytes.
///
/// Implementations block; async callers should run them on a blocking
/// thread.
pub trait RenderBackend: Send + Sync {
    fn render(&self, html: &str, options: &PdfRenderOptions) -> Result<Vec<u8>>;
}

/// Headless Chromium backend.
#[derive(Debug, Clone)]
pub struct ChromeBackend {
    /// Pause after load so embedded scripts and web fonts can settle.
    pub settle: Duration,
    /// Browser binary; autodetected when `None`.
    pub chrome_path: Option<PathBuf>,
}

impl Default for ChromeBackend {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1000),
            chrome_path: None,
        }
    }
}

impl ChromeBackend {
    pub fn new(settle: Duration, chrome_path: Option<PathBuf>) -> Self {
        Self {
            settle,
            chrome_path,
        }
    }

    fn launch(&self) -> Result<Browser> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(self.chrome_path.clone())
            .build()
            .map_err(|e| ForgeError::PdfGeneration(format!("invalid launch options: {e}")))?;
        Browser::new(options)
            .map_err(|e| ForgeError::PdfGeneration(format!("failed to launch browser: {e}")))
    }
}

impl RenderBackend for ChromeBackend {
    fn render(&self, html: &str, options: &PdfRenderOptions) -> Result<Vec<u8>> {
        let browser = self.launch()?;
        let tab = browser
            .new_tab()
            .map_err(|e| ForgeError::PdfGeneration(format!("failed to open tab: {e}")))?;

        let url = format!("data:text/html;base64,{}", BASE64_STD.encode(html));
        tab.navigate_to(&url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| ForgeError::PdfGeneration(format!("failed to load document: {e}")))?;

        std::thread::sleep(self.settle);

        let pdf = tab
            .print_to_pdf(Some(print_options(options)))
            .map_err(|e| ForgeError::PdfGeneration(e.to_string()))?;
        log::debug!("Chrome produced {} bytes", pdf.len());
        Ok(pdf)
    }
}

fn print_options(options: &PdfRenderOptions) -> PrintToPdfOptions {
    // An empty template would make Chrome print its default date/title.
    let blank = || Some("<span></span>".to_string());
    PrintToPdfOptions {
        landscape: Some(options.landscape),
        display_header_footer: Some(options.display_header_footer),
        print_background: Some(options.print_background),
        scale: Some(1.0),
        paper_width: Some(options.paper_width_in),
        paper_height: Some(options.paper_height_in),
        margin_top: Some(options.margin_top_in),
        margin_bottom: Some(options.margin_bottom_in),
        margin_left: Some(options.margin_left_in),
        margin_right: Some(options.margin_right_in),
        header_template: options.header_template.clone().or_else(blank),
        footer_template: options.footer_template.clone().or_else(blank),
        prefer_css_page_size: Some(false),
        ..Default::default()
    }
}
