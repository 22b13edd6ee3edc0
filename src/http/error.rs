use crate::error::{Error, ErrorKind};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub const NO_FILES: &str = "No PDF files uploaded";
pub const ALL_FAILED: &str = "Failed to compress any PDFs. Make sure Ghostscript is installed.";
pub const NOT_FOUND: &str = "File not found";
pub const URL_REQUIRED: &str = "URL is required";
pub const QR_FAILED: &str = "Failed to generate QR code";

/// A `{"error": message}` response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}
impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, message) = match &*err {
            ErrorKind::NoFiles => (StatusCode::BAD_REQUEST, NO_FILES.to_string()),
            ErrorKind::Intake(reason) => (StatusCode::BAD_REQUEST, format!("Invalid upload: {reason}")),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND.to_string()),
            ErrorKind::AllFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, ALL_FAILED.to_string()),
            ErrorKind::Archive => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create the archive".to_string()),
            ErrorKind::Qr => (StatusCode::INTERNAL_SERVER_ERROR, QR_FAILED.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Error processing PDFs".to_string()),
        };
        match status.is_server_error() {
            true => tracing::error!(error = ?err, "Request failed"),
            false => tracing::debug!(error = ?err, "Request rejected"),
        }
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
