//! Error type shared by the pipeline, the render backend and the HTTP layer.
//!
//! Every variant maps to a stable `type` tag and an HTTP status so the server
//! can turn any failure into a `{error, type, timestamp}` JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failure kinds surfaced by printforge.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// A request field has the wrong type, enum value or range.
    #[error("Invalid {field}: {value}. {constraint}")]
    Validation {
        field: String,
        value: String,
        constraint: String,
    },

    /// The document content is missing, blank or oversized.
    #[error("Content Processing Error: {0}")]
    Content(String),

    /// An uploaded file is missing or has a disallowed type or size.
    #[error("{0}")]
    File(String),

    /// The upload body exceeded the transport limit before it could be read.
    #[error("File too large. Maximum size is 10MB.")]
    FileTooLarge,

    /// The rendering backend failed.
    #[error("PDF Generation Error: {0}")]
    PdfGeneration(String),

    #[error("{0}")]
    Generic(String),
}

impl ForgeError {
    pub fn validation(
        field: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Stable tag written to the `type` field of error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Content(_) => "CONTENT_ERROR",
            Self::File(_) | Self::FileTooLarge => "FILE_ERROR",
            Self::PdfGeneration(_) => "PDF_GENERATION_ERROR",
            Self::Generic(_) => "GENERIC_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Content(_) | Self::File(_) => StatusCode::BAD_REQUEST,
            Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::PdfGeneration(_) | Self::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client errors are expected; anything 5xx points at the backend or a bug.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// The JSON body returned to HTTP clients.
    pub fn to_body(&self) -> serde_json::Value {
        json!({
            "error": self.to_string(),
            "type": self.kind(),
            "timestamp": timestamp(),
        })
    }
}

impl IntoResponse for ForgeError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}

/// Current UTC time in RFC 3339 form with millisecond precision.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub type Result<T> = std::result::Result<T, ForgeError>;
