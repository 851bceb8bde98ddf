//! Query client: submit one question at a time, cancel it, await its outcome.
//!
//! Each request moves `Running → Completed | Cancelled` exactly once. Both the
//! worker and `cancel` go through the same guarded transition on a watch
//! channel, so once `cancel` has won, a response that arrives afterwards is
//! dropped and the handle reports `Cancelled`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ConfigError, QueryError};
use crate::messages::{AskRequest, ImageUpload};
use crate::transport::{HttpTransport, Transport};

/// Final result of one request: the answer text or why there is none.
pub type Outcome = Result<String, QueryError>;

/// Lifecycle of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Running,
    Completed(Outcome),
    Cancelled,
}

impl RequestState {
    pub fn is_running(&self) -> bool {
        matches!(self, RequestState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    /// The outcome seen by the caller, once terminal.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            RequestState::Running => None,
            RequestState::Completed(outcome) => Some(outcome.clone()),
            RequestState::Cancelled => Some(Err(QueryError::Cancelled)),
        }
    }
}

/// Move `Running` to `next`; returns false if the request already finished.
fn finish(state: &watch::Sender<RequestState>, next: RequestState) -> bool {
    state.send_if_modified(|current| {
        if current.is_running() {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// Caller-held reference to one request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: u64,
    token: CancellationToken,
    state: Arc<watch::Sender<RequestState>>,
}

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Wait until the request reaches a terminal state.
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.state.subscribe();
        let outcome = match rx.wait_for(RequestState::is_terminal).await {
            Ok(state) => state.outcome().unwrap_or(Err(QueryError::Cancelled)),
            // The handle keeps the sender alive, so the channel cannot close.
            Err(_) => Err(QueryError::Cancelled),
        };
        outcome
    }
}

/// Issues questions to the answer service, one at a time.
#[derive(Clone)]
pub struct QueryClient {
    transport: Arc<dyn Transport>,
    runtime: Handle,
    next_id: Arc<AtomicU64>,
    current: Arc<Mutex<Option<Arc<watch::Sender<RequestState>>>>>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    /// Requests are spawned onto `runtime`.
    pub fn new(transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        Self {
            transport,
            runtime,
            next_id: Arc::new(AtomicU64::new(1)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Client over an `HttpTransport` built from `config`.
    pub fn from_config(config: &Config, runtime: Handle) -> Result<Self, ConfigError> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport), runtime))
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// True while the latest request is still running.
    pub fn is_busy(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .is_some_and(|state| state.borrow().is_running())
    }

    /// Start `POST /ask` for `query`. Returns immediately.
    pub fn submit(&self, query: &str) -> Result<RequestHandle, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        self.start(AskRequest::Query {
            query: query.to_string(),
        })
    }

    /// Start `POST /ask-image` with `image` attached. Returns immediately.
    pub fn submit_image(&self, query: &str, image: ImageUpload) -> Result<RequestHandle, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if image.file_name.trim().is_empty() {
            return Err(QueryError::InvalidImage("missing file name".into()));
        }
        if image.bytes.is_empty() {
            return Err(QueryError::InvalidImage("empty file".into()));
        }
        self.start(AskRequest::Image {
            query: query.to_string(),
            image,
        })
    }

    /// Cancel `handle` if it is still running; no-op otherwise.
    pub fn cancel(&self, handle: &RequestHandle) {
        if finish(&handle.state, RequestState::Cancelled) {
            handle.token.cancel();
            debug!(request_id = handle.id, "request cancelled");
        }
    }

    fn start(&self, request: AskRequest) -> Result<RequestHandle, QueryError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current
            .as_ref()
            .is_some_and(|state| state.borrow().is_running())
        {
            return Err(QueryError::Busy);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (state, _) = watch::channel(RequestState::Running);
        let handle = RequestHandle {
            id,
            token: CancellationToken::new(),
            state: Arc::new(state),
        };
        *current = Some(handle.state.clone());

        debug!(request_id = id, endpoint = request.path(), "submitting query");
        self.runtime.spawn(run_request(
            self.transport.clone(),
            request,
            handle.clone(),
        ));
        Ok(handle)
    }
}

async fn run_request(transport: Arc<dyn Transport>, request: AskRequest, handle: RequestHandle) {
    let outcome = tokio::select! {
        biased;

        _ = handle.token.cancelled() => return,

        result = transport.send(&request) => result.and_then(|raw| raw.into_answer()),
    };

    if let Err(err) = &outcome {
        if !handle.token.is_cancelled() {
            warn!(request_id = handle.id, error = %err, "query failed");
        }
    }
    if finish(&handle.state, RequestState::Completed(outcome)) {
        debug!(request_id = handle.id, "query completed");
    } else {
        debug!(request_id = handle.id, "discarding response for cancelled request");
    }
}
