//! Response types and helpers shared by the admin and traffic handlers.

use crate::error::PactError;
use crate::pact::{MockSequencing, Pact, PactMode, RecordingMode};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Read-only view of the controller returned by `GET {root}/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDocument {
    pub status: &'static str,
    pub mode: PactMode,
    pub recording_mode: RecordingMode,
    pub strict_mocking: bool,
    pub mock_sequencing: MockSequencing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pact: Option<PactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub adapter: AdapterStatus,
    pub log_level: String,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdapterStatus {
    pub folder: String,
}

/// Short description of a pact.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PactSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<String>,
    pub records: usize,
}

impl PactSummary {
    pub fn of(pact: &Pact) -> Self {
        Self {
            id: pact.id.to_string(),
            title: pact.info.title.clone(),
            records: pact.len(),
        }
    }
}

/// Body of `POST {root}/current` responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    #[serde(flatten)]
    pub pact: PactSummary,
    pub created: bool,
    pub mode: PactMode,
    pub recording_mode: RecordingMode,
    pub strict_mocking: bool,
}

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with the given status and body.
///
/// Falls back to a minimal response if the builder rejects its input.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

pub fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    build_response(status, Bytes::new())
}

pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Error response with the status the error maps to.
pub fn pact_error_response(error: &PactError) -> Response<Full<Bytes>> {
    error_response(error.status_code(), &error.to_string())
}

pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}
