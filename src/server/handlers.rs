use std::net::SocketAddr;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        ConnectInfo, Multipart, OriginalUri, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{timestamp, ForgeError, Result};
use crate::markdown::InputType;
use crate::pipeline::{generate_pdf, prepare_document};
use crate::settings::PrintSettings;
use crate::validate::{
    check_content_text, sanitize_filename, sanitize_html, validate_content, validate_input_type,
    validate_settings, validate_upload,
};

use super::AppState;

type JsonBody = std::result::Result<Json<ConvertRequest>, JsonRejection>;

/// Body of `/api/convert` and `/api/preview`. Fields stay untyped so the
/// validator, not the deserializer, decides what is wrong with them.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub content: Option<Value>,
    #[serde(rename = "inputType")]
    pub input_type: Option<Value>,
    pub settings: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub content: String,
    #[serde(rename = "inputType")]
    pub input_type: &'static str,
    pub filename: String,
    pub size: usize,
}

/// Who made a request, for error logs.
pub struct RequestContext {
    endpoint: &'static str,
    client: String,
    user_agent: String,
}

impl RequestContext {
    fn new(
        endpoint: &'static str,
        headers: &HeaderMap,
        connect: Option<ConnectInfo<SocketAddr>>,
    ) -> Self {
        Self {
            endpoint,
            client: connect
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string(),
        }
    }

    /// Log `err` with this context and turn it into a response.
    fn fail(&self, err: ForgeError) -> Response {
        if err.is_client_error() {
            log::warn!(
                "Client error on {} [{}]: {} (client={}, agent={})",
                self.endpoint,
                err.kind(),
                err,
                self.client,
                self.user_agent
            );
        } else {
            log::error!(
                "Server error on {} [{}]: {} (client={}, agent={})",
                self.endpoint,
                err.kind(),
                err,
                self.client,
                self.user_agent
            );
        }
        err.into_response()
    }
}

/// Validated conversion input shared by convert and preview.
struct ConversionInput {
    content: String,
    input_type: InputType,
    settings: PrintSettings,
}

fn parse_conversion(body: JsonBody) -> Result<ConversionInput> {
    let Json(req) = body.map_err(|rejection| {
        log::debug!("Rejected request body: {rejection}");
        ForgeError::validation("JSON", "malformed", "Invalid JSON format")
    })?;

    let content = validate_content(req.content.as_ref())?;
    let input_type = validate_input_type(req.input_type.as_ref())?;
    let settings = validate_settings(req.settings.as_ref())?;

    let content = match input_type {
        InputType::Html => sanitize_html(content),
        InputType::Markdown => content.to_string(),
    };
    Ok(ConversionInput {
        content,
        input_type,
        settings,
    })
}

/// `POST /api/convert` – render the content to a PDF download.
pub async fn convert(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: JsonBody,
) -> Response {
    let ctx = RequestContext::new("/api/convert", &headers, connect);
    match convert_inner(state, body).await {
        Ok(response) => response,
        Err(err) => ctx.fail(err),
    }
}

async fn convert_inner(state: AppState, body: JsonBody) -> Result<Response> {
    let input = parse_conversion(body)?;
    let filename = input
        .settings
        .filename
        .clone()
        .unwrap_or_else(|| sanitize_filename(None));

    let backend = state.backend.clone();
    let conversion = tokio::task::spawn_blocking(move || {
        generate_pdf(
            &input.content,
            input.input_type,
            &input.settings,
            backend.as_ref(),
        )
    })
    .await
    .map_err(|e| ForgeError::PdfGeneration(format!("render task failed: {e}")))??;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ForgeError::Generic(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        conversion.pdf,
    )
        .into_response())
}

/// `POST /api/preview` – the styled HTML that would be rendered.
pub async fn preview(
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: JsonBody,
) -> Response {
    let ctx = RequestContext::new("/api/preview", &headers, connect);
    match preview_inner(body).await {
        Ok(html) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            html,
        )
            .into_response(),
        Err(err) => ctx.fail(err),
    }
}

async fn preview_inner(body: JsonBody) -> Result<String> {
    let input = parse_conversion(body)?;
    // Parsing a 10MB document is CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || {
        prepare_document(&input.content, input.input_type, &input.settings)
    })
    .await
    .map_err(|e| ForgeError::Generic(format!("preview task failed: {e}")))
}

/// `POST /api/upload` – read a text document from the multipart `file`
/// field and hand its content back for editing.
pub async fn upload(
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let ctx = RequestContext::new("/api/upload", &headers, connect);
    let Ok(multipart) = multipart else {
        return ctx.fail(ForgeError::File("No file uploaded".into()));
    };
    match upload_inner(multipart).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => ctx.fail(err),
    }
}

async fn upload_inner(mut multipart: Multipart) -> Result<UploadResponse> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if field.name() != Some("file") {
            return Err(ForgeError::File("Unexpected file field.".into()));
        }
        let mime = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        let input_type = validate_upload(&filename, mime.as_deref(), data.len())?;
        let content = String::from_utf8_lossy(&data).into_owned();
        check_content_text(&content)?;

        log::info!("Accepted upload '{}' ({} bytes)", filename, data.len());
        return Ok(UploadResponse {
            content,
            input_type: input_type.as_str(),
            filename: sanitize_filename(Some(&filename)),
            size: data.len(),
        });
    }
    Err(ForgeError::File("No file uploaded".into()))
}

fn multipart_error(err: MultipartError) -> ForgeError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ForgeError::FileTooLarge
    } else {
        ForgeError::File(err.body_text())
    }
}

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": timestamp() }))
}

/// Fallback for unknown `/api` routes.
pub async fn not_found(method: Method, OriginalUri(uri): OriginalUri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Route {} {} not found", method, uri.path()),
            "timestamp": timestamp(),
        })),
    )
        .into_response()
}
