//! HTTP tests for the `/api` surface, driven through `tower::ServiceExt`
//! against a mock render backend.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use printforge::rate_limit::RateLimiter;
use printforge::render::PdfRenderOptions;
use printforge::server::{router, AppState};
use printforge::{ForgeError, RenderBackend};

// =====================================================================
// Helper
// =====================================================================

#[derive(Default)]
struct MockBackend {
    rendered: Mutex<Vec<String>>,
}

impl RenderBackend for MockBackend {
    fn render(&self, html: &str, _options: &PdfRenderOptions) -> printforge::Result<Vec<u8>> {
        self.rendered.lock().unwrap().push(html.to_string());
        Ok(b"%PDF-1.4\n%mock\n".to_vec())
    }
}

struct BrokenBackend;

impl RenderBackend for BrokenBackend {
    fn render(&self, _html: &str, _options: &PdfRenderOptions) -> printforge::Result<Vec<u8>> {
        Err(ForgeError::PdfGeneration("browser exited".into()))
    }
}

fn app_with(backend: Arc<dyn RenderBackend>, conversion_limit: usize) -> Router {
    let window = Duration::from_secs(60);
    let state = AppState::new(
        backend,
        Arc::new(RateLimiter::new(window, 100)),
        Arc::new(RateLimiter::new(window, conversion_limit)),
    );
    router(state, Path::new("public"))
}

fn app() -> Router {
    app_with(Arc::new(MockBackend::default()), 100)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(field: &str, filename: &str, mime: &str, content: &str) -> Request<Body> {
    let boundary = "printforge-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: {mime}\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// =====================================================================
// Convert
// =====================================================================

#[tokio::test]
async fn convert_returns_pdf_attachment() {
    let backend = Arc::new(MockBackend::default());
    let response = app_with(backend.clone(), 100)
        .oneshot(post_json(
            "/api/convert",
            json!({
                "content": "# Report\n\nBody",
                "inputType": "markdown",
                "settings": { "filename": "my report.pdf", "enableTableOfContents": true }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"my_report.pdf\""
    );
    assert!(body_bytes(response).await.starts_with(b"%PDF-"));

    let rendered = backend.rendered.lock().unwrap();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains(r##"href="#heading-0""##));
}

#[tokio::test]
async fn convert_defaults_filename() {
    let response = app()
        .oneshot(post_json("/api/convert", json!({ "content": "<p>x</p>" })))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"converted.pdf\""
    );
}

#[tokio::test]
async fn convert_strips_scripts_from_html() {
    let backend = Arc::new(MockBackend::default());
    app_with(backend.clone(), 100)
        .oneshot(post_json(
            "/api/convert",
            json!({ "content": "<p onclick=\"x()\">hi</p><script>alert(1)</script>" }),
        ))
        .await
        .unwrap();
    let rendered = backend.rendered.lock().unwrap();
    assert!(!rendered[0].contains("alert(1)"));
    assert!(!rendered[0].contains("onclick"));
}

#[tokio::test]
async fn unknown_page_size_is_rejected() {
    let backend = Arc::new(MockBackend::default());
    let response = app_with(backend.clone(), 100)
        .oneshot(post_json(
            "/api/convert",
            json!({ "content": "<p>x</p>", "settings": { "pageSize": "Tabloid" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["type"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().starts_with("Invalid pageSize: Tabloid."));
    assert!(backend.rendered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn negative_margin_is_rejected() {
    let response = app()
        .oneshot(post_json(
            "/api/convert",
            json!({ "content": "<p>x</p>", "settings": { "marginTop": -1 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid marginTop: -1. Cannot be negative");
}

#[tokio::test]
async fn blank_content_is_a_content_error() {
    for content in [json!(""), json!("   "), json!(42)] {
        let response = app()
            .oneshot(post_json("/api/convert", json!({ "content": content })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["type"], "CONTENT_ERROR");
    }
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"content\": "))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["type"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Invalid JSON: malformed. Invalid JSON format");
}

#[tokio::test]
async fn backend_failure_is_a_server_error() {
    let response = app_with(Arc::new(BrokenBackend), 100)
        .oneshot(post_json("/api/convert", json!({ "content": "<p>x</p>" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["type"], "PDF_GENERATION_ERROR");
    assert_eq!(body["error"], "PDF Generation Error: browser exited");
}

// =====================================================================
// Rate limiting
// =====================================================================

#[tokio::test]
async fn conversion_limit_returns_429() {
    let app = app_with(Arc::new(MockBackend::default()), 2);
    let request = || post_json("/api/convert", json!({ "content": "<p>x</p>" }));

    for remaining in ["1", "0"] {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry > 0 && retry <= 60);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Too many requests");

    // Other routes only answer to the general limiter.
    let health = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.headers()["x-ratelimit-limit"], "100");
}

// =====================================================================
// Preview, upload, health, fallback
// =====================================================================

#[tokio::test]
async fn preview_returns_styled_html() {
    let response = app()
        .oneshot(post_json(
            "/api/preview",
            json!({
                "content": "# Hello",
                "inputType": "markdown",
                "settings": { "watermarkText": "DRAFT" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("<h1>Hello</h1>"));
    assert!(html.contains("size: A4 portrait;"));
    assert!(html.contains("content: \"DRAFT\""));
}

#[tokio::test]
async fn preview_rejects_unknown_input_type() {
    let response = app()
        .oneshot(post_json(
            "/api/preview",
            json!({ "content": "x", "inputType": "rtf" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid inputType: rtf."));
}

#[tokio::test]
async fn upload_returns_content_and_type() {
    let response = app()
        .oneshot(multipart_upload("file", "notes v1.md", "text/markdown", "# Notes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["content"], "# Notes");
    assert_eq!(body["inputType"], "markdown");
    assert_eq!(body["filename"], "notes_v1.md");
    assert_eq!(body["size"], 7);
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let response = app()
        .oneshot(multipart_upload("file", "tool.exe", "application/octet-stream", "MZ"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["type"], "FILE_ERROR");
    assert!(body["error"].as_str().unwrap().starts_with("Invalid file type."));
}

#[tokio::test]
async fn upload_rejects_other_file_fields() {
    let response = app()
        .oneshot(multipart_upload("document", "a.html", "text/html", "<p>x</p>"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Unexpected file field.");
}

#[tokio::test]
async fn upload_rejects_bad_mime() {
    let response = app()
        .oneshot(multipart_upload("file", "page.html", "image/png", "<p>x</p>"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["type"], "FILE_ERROR");
    assert_eq!(body["error"], "Invalid MIME type: image/png");
}

#[tokio::test]
async fn upload_rejects_oversized_body() {
    let content = "a".repeat(11 * 1024 * 1024);
    let response = app()
        .oneshot(multipart_upload("file", "big.txt", "text/plain", &content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;
    assert_eq!(body["type"], "FILE_ERROR");
    assert_eq!(body["error"], "File too large. Maximum size is 10MB.");
}

#[tokio::test]
async fn preview_handles_deeply_nested_content() {
    let content = format!("{}<h1>Deep</h1>", "<div>".repeat(200_000));
    let response = app()
        .oneshot(post_json(
            "/api/preview",
            json!({ "content": content, "settings": { "enableTableOfContents": true } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains(r#"<h1 id="heading-0">Deep</h1>"#));
    assert!(html.contains(r##"<a href="#heading-0">Deep</a>"##));
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = app()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_api_route_is_json_404() {
    let response = app()
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["message"], "Route GET /api/nope not found");
}
