//! HTTP transport: the single POST the client performs.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::config::{Config, Timeouts};
use crate::error::{ConfigError, QueryError};
use crate::messages::{encode_form_body, AskRequest, RawResponse, FORM_CONTENT_TYPE};

/// Performs one outbound request and returns the raw status and body.
///
/// Cancellation is handled by the caller dropping the returned future, so
/// implementations must not rely on running to completion.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &AskRequest) -> Result<RawResponse, QueryError>;
}

/// reqwest-backed transport with connect, total and per-call timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeouts: Timeouts,
}

impl HttpTransport {
    /// `base_url` must already be normalized (no trailing slash).
    pub fn new(base_url: impl Into<String>, timeouts: Timeouts) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.connect)
            .timeout(timeouts.resource)
            .build()
            .map_err(|e| ConfigError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            timeouts,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.base_url()?, config.timeouts())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, request: &AskRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &AskRequest) -> Result<RawResponse, QueryError> {
        let builder = self
            .client
            .post(self.endpoint(request))
            .timeout(self.timeouts.effective_request());

        let builder = match request {
            AskRequest::Query { query } => builder
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(encode_form_body(query)),
            AskRequest::Image { query, image } => {
                let mut part = Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
                if let Some(mime) = &image.mime_type {
                    part = part
                        .mime_str(mime)
                        .map_err(|e| QueryError::InvalidImage(e.to_string()))?;
                }
                builder.multipart(Form::new().part("file", part).text("query", query.clone()))
            }
        };

        let response = builder.send().await.map_err(QueryError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(QueryError::from_reqwest)?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
