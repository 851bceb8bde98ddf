//! Error types for queries and configuration.

use thiserror::Error;

/// Terminal failure of a query. Every variant ends the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Query was empty or whitespace-only; rejected before any I/O.
    #[error("query must not be empty")]
    EmptyQuery,

    /// A request is already running on this client.
    #[error("a request is already in flight")]
    Busy,

    /// Image upload was missing a file name or payload.
    #[error("invalid image upload: {0}")]
    InvalidImage(String),

    /// Cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,

    /// Connect, read or total timeout exceeded.
    #[error("request timed out")]
    Timeout,

    /// DNS, connect or connection-lost failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status. `body` is kept as diagnostic text.
    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// 2xx response whose payload is not `{"answer": "<string>"}`.
    #[error("decode error: {0}")]
    Decode(String),
}

impl QueryError {
    /// Text shown to the user in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::EmptyQuery => "Enter a prompt".into(),
            QueryError::Busy => "A request is already running".into(),
            QueryError::InvalidImage(detail) => format!("Invalid image: {}", detail),
            QueryError::Cancelled => "Request cancelled.".into(),
            QueryError::Timeout => "The request timed out. Please try again.".into(),
            QueryError::Network(detail) => format!("Network issue: {}", detail),
            QueryError::Server { status, body } if body.trim().is_empty() => {
                format!("Server error ({})", status)
            }
            QueryError::Server { status, body } => {
                format!("Server error ({}): {}", status, body.trim())
            }
            QueryError::Decode(detail) => format!("Could not read the answer: {}", detail),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return QueryError::Timeout;
        }
        // Body read failures surface as "error decoding response body";
        // the connection dropped, nothing was decoded.
        if err.is_body() || err.is_decode() {
            return QueryError::Network(format!("connection lost: {}", root_cause(&err)));
        }
        QueryError::Network(error_chain(&err))
    }
}

fn root_cause(err: &dyn std::error::Error) -> String {
    let mut cause = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

/// Joins an error and its sources: reqwest's top-level message omits the cause.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Config load/save or client construction error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("HTTP transport error: {0}")]
    Transport(String),
}
