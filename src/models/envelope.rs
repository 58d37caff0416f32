//! The terminal artifact of a request, shaped after the HTTP gateway proxy
//! convention: `{ statusCode, headers, body, isBase64Encoded? }`.
//!
//! An envelope can leave the service two ways: serialized as JSON for a
//! gateway to unwrap, or rendered straight into an HTTP response.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

/// Status used when diagnostics replace the normal payload.
pub const DIAGNOSTICS_STATUS: u16 = 222;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    status_code: u16,
    headers: BTreeMap<String, String>,
    body: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_base64_encoded: bool,
}

impl ResponseEnvelope {
    fn new(status_code: u16, content_type: &str, body: String, is_base64_encoded: bool) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        Self {
            status_code,
            headers,
            body,
            is_base64_encoded,
        }
    }

    /// 200 carrying binary content, base64 encoded.
    pub fn binary(bytes: &[u8], content_type: &str) -> Self {
        Self::new(
            200,
            content_type,
            general_purpose::STANDARD.encode(bytes),
            true,
        )
    }

    /// 200 carrying textual content as-is. Bytes that are not UTF-8 go out
    /// base64 encoded so the caller still receives them unaltered.
    pub fn text(bytes: &[u8], content_type: &str) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::new(200, content_type, text.to_owned(), false),
            Err(_) => Self::binary(bytes, content_type),
        }
    }

    /// An error status with a `{"error": ...}` JSON body.
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::new(
            status_code,
            "application/json",
            json!({ "error": message }).to_string(),
            false,
        )
    }

    /// Debug-mode replacement for whatever the request would have returned.
    pub fn diagnostics(report: &serde_json::Value) -> Self {
        let body = serde_json::to_string_pretty(report).unwrap_or_else(|_| report.to_string());
        Self::new(DIAGNOSTICS_STATUS, "application/json", body, false)
    }

    /// Adds a header while the envelope is still being built.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_base64_encoded(&self) -> bool {
        self.is_base64_encoded
    }

    /// The body as it would reach an HTTP client, base64 undone.
    pub fn decoded_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.is_base64_encoded {
            general_purpose::STANDARD.decode(&self.body)
        } else {
            Ok(self.body.clone().into_bytes())
        }
    }
}

/// Renders the envelope as the HTTP response a gateway would have produced.
impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match self.decoded_body() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!("envelope body is not valid base64: {}", err);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
        }
        response
    }
}
