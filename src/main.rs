//! forge – HTML / Markdown → PDF converter and conversion server.
//!
//! Usage:
//!   forge serve [--port 3000] [--static-dir public]
//!   forge convert <input.md|input.html> [output.pdf] [--toc] [--landscape] ...
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same stem (e.g. `report.md` → `report.pdf`).

use std::{fs, path::PathBuf, process};

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use printforge::config::{RenderConfig, ServerConfig};
use printforge::validate::validate_settings;
use printforge::{generate_pdf, server, InputType};

#[derive(Parser)]
#[command(name = "forge", version, about = "HTML / Markdown to PDF converter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP conversion server.
    Serve(ServerConfig),
    /// Convert a single file.
    Convert(ConvertArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// HTML or Markdown file; `.md` and `.markdown` are read as Markdown.
    input: PathBuf,

    /// Output path (default: same stem as input with .pdf).
    output: Option<PathBuf>,

    /// A4, A3, A5, Letter or Legal.
    #[arg(long, default_value = "A4")]
    page_size: String,

    #[arg(long, short = 'l')]
    landscape: bool,

    /// Uniform page margin in millimetres.
    #[arg(long)]
    margin: Option<f64>,

    /// Insert a table of contents built from the document headings.
    #[arg(long)]
    toc: bool,

    #[arg(long)]
    watermark: Option<String>,

    #[arg(long)]
    header: Option<String>,

    #[arg(long)]
    footer: Option<String>,

    #[arg(long)]
    page_numbers: bool,

    #[command(flatten)]
    render: RenderConfig,
}

impl ConvertArgs {
    /// Settings in request form, so the CLI goes through the same
    /// validation as the HTTP API.
    fn settings_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("pageSize".into(), json!(self.page_size));
        map.insert(
            "orientation".into(),
            json!(if self.landscape { "landscape" } else { "portrait" }),
        );
        if let Some(m) = self.margin {
            for key in ["marginTop", "marginRight", "marginBottom", "marginLeft"] {
                map.insert(key.into(), json!(m));
            }
        }
        map.insert("headerText".into(), json!(self.header));
        map.insert("footerText".into(), json!(self.footer));
        map.insert("watermarkText".into(), json!(self.watermark));
        map.insert("enablePageNumbers".into(), json!(self.page_numbers));
        map.insert("enableTableOfContents".into(), json!(self.toc));
        Value::Object(map)
    }

    fn input_type(&self) -> InputType {
        match self.input.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown") => {
                InputType::Markdown
            }
            _ => InputType::Html,
        }
    }
}

fn main() {
    env_logger::init();

    match Cli::parse().command {
        Command::Serve(config) => serve(config),
        Command::Convert(args) => convert(args),
    }
}

fn serve(config: ServerConfig) {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(server::serve(config)) {
        log::error!("Server failed: {e}");
        process::exit(1);
    }
}

fn convert(args: ConvertArgs) {
    let settings = match validate_settings(Some(&args.settings_value())) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    // Default output: same directory + same stem as input, but with .pdf
    let output = args.output.clone().unwrap_or_else(|| {
        let mut o = args.input.clone();
        o.set_extension("pdf");
        o
    });

    let content = match fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", args.input.display());
            process::exit(1);
        }
    };

    let input_type = args.input_type();
    let backend = args.render.backend();
    match generate_pdf(&content, input_type, &settings, &backend) {
        Ok(conversion) => {
            // Create output directory if necessary.
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        eprintln!("Error creating output directory: {e}");
                        process::exit(1);
                    }
                }
            }
            if let Err(e) = fs::write(&output, &conversion.pdf) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            eprintln!(
                "Wrote '{}' ({} bytes, {} {}, from {})",
                output.display(),
                conversion.pdf.len(),
                settings.page_size,
                settings.orientation,
                input_type.as_str()
            );
        }
        Err(e) => {
            eprintln!("Error generating PDF: {e}");
            process::exit(1);
        }
    }
}
