//! Question-answering client library (config, HTTP transport, request
//! lifecycle and cancellation). Used by the `ask` CLI and by UI front ends.

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;

pub use client::{Outcome, QueryClient, RequestHandle, RequestState};
pub use config::{default_config_path, Config, ServerSection, TimeoutSection, Timeouts};
pub use error::{ConfigError, QueryError};
pub use messages::{encode_form_body, AnswerResponse, AskRequest, ImageUpload, RawResponse};
pub use session::{AskSession, Completion};
pub use transport::{HttpTransport, Transport};
