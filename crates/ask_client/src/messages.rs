//! Wire types for the `/ask` and `/ask-image` endpoints.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;

use crate::error::QueryError;

/// Content type of the `/ask` request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Everything outside the RFC 3986 unreserved set is percent-encoded.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Build the `/ask` body: `query=<percent-encoded query>`.
pub fn encode_form_body(query: &str) -> String {
    format!("query={}", utf8_percent_encode(query, FORM_VALUE))
}

/// File attached to an `/ask-image` question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Guess a MIME type from the file extension for the common image formats.
    pub fn guess_mime_type(file_name: &str) -> Option<&'static str> {
        let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            "bmp" => Some("image/bmp"),
            "tif" | "tiff" => Some("image/tiff"),
            _ => None,
        }
    }
}

/// One outbound question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskRequest {
    /// `POST /ask` with a urlencoded `query` field.
    Query { query: String },
    /// `POST /ask-image` with multipart `file` and `query` fields.
    Image { query: String, image: ImageUpload },
}

impl AskRequest {
    /// Endpoint path relative to the base URL.
    pub fn path(&self) -> &'static str {
        match self {
            AskRequest::Query { .. } => "/ask",
            AskRequest::Image { .. } => "/ask-image",
        }
    }

    pub fn query(&self) -> &str {
        match self {
            AskRequest::Query { query } | AskRequest::Image { query, .. } => query,
        }
    }
}

/// Server → client: the only recognised success payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// Status and body as received, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Non-2xx becomes `Server` without touching JSON; 2xx must decode to `AnswerResponse`.
    pub fn into_answer(self) -> Result<String, QueryError> {
        if !(200..=299).contains(&self.status) {
            return Err(QueryError::Server {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            });
        }
        let decoded: AnswerResponse =
            serde_json::from_slice(&self.body).map_err(|e| QueryError::Decode(e.to_string()))?;
        Ok(decoded.answer)
    }
}
