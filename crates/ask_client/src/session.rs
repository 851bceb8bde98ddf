//! Screen-level state for a front end: busy flag, display text, and completion
//! delivery onto the thread that owns the session.
//!
//! Requests run on the client's runtime. Their outcomes are forwarded into a
//! channel that the owning thread drains with [`AskSession::poll`] or
//! [`AskSession::wait`], so all state updates happen on that one thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::client::{Outcome, QueryClient, RequestHandle};
use crate::error::QueryError;
use crate::messages::ImageUpload;

/// Outcome of one request, tagged with its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request_id: u64,
    pub outcome: Outcome,
}

/// Single-question screen model.
pub struct AskSession {
    client: QueryClient,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    current: Option<RequestHandle>,
    display: String,
    last_outcome: Option<Outcome>,
}

impl AskSession {
    pub fn new(client: QueryClient) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            client,
            completion_tx,
            completion_rx,
            current: None,
            display: String::new(),
            last_outcome: None,
        }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    /// Text currently shown: an answer, an error message, or empty.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Outcome of the most recent request that finished or was cancelled.
    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    /// Submit `text`. Errors are also shown in the display.
    pub fn ask(&mut self, text: &str) -> Result<u64, QueryError> {
        let submitted = self.guard_idle().and_then(|()| self.client.submit(text));
        self.track(submitted)
    }

    /// Submit `text` with an image attached.
    pub fn ask_with_image(&mut self, text: &str, image: ImageUpload) -> Result<u64, QueryError> {
        let submitted = self
            .guard_idle()
            .and_then(|()| self.client.submit_image(text, image));
        self.track(submitted)
    }

    /// One-button behaviour: cancel while busy, ask otherwise.
    pub fn ask_or_cancel(&mut self, text: &str) -> Result<Option<u64>, QueryError> {
        if self.cancel() {
            return Ok(None);
        }
        self.ask(text).map(Some)
    }

    /// Cancel the running request. Returns false if idle.
    pub fn cancel(&mut self) -> bool {
        let Some(handle) = self.current.take() else {
            return false;
        };
        self.client.cancel(&handle);
        self.show(Err(QueryError::Cancelled));
        true
    }

    /// Clear the display. Refused while a request is running.
    pub fn clear(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.display.clear();
        true
    }

    /// Apply any completions that have arrived. Returns true if the current
    /// request finished.
    pub fn poll(&mut self) -> bool {
        let mut finished = false;
        while let Ok(completion) = self.completion_rx.try_recv() {
            finished |= self.apply(completion);
        }
        finished
    }

    /// Block until the current request finishes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.poll() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completion_rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if self.apply(completion) {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                // The session holds a sender, so this only happens on shutdown.
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        false
    }

    /// Wait for the current request in `tick` slices, cancelling it once
    /// `interrupted` is set.
    pub fn wait_or_cancel(&mut self, interrupted: &AtomicBool, tick: Duration) {
        while self.is_busy() {
            if self.wait(tick) {
                break;
            }
            if interrupted.load(Ordering::SeqCst) {
                self.cancel();
                break;
            }
        }
    }

    fn guard_idle(&self) -> Result<(), QueryError> {
        if self.is_busy() {
            Err(QueryError::Busy)
        } else {
            Ok(())
        }
    }

    fn track(&mut self, submitted: Result<RequestHandle, QueryError>) -> Result<u64, QueryError> {
        let handle = match submitted {
            Ok(handle) => handle,
            Err(err) => {
                if err != QueryError::Busy {
                    self.show(Err(err.clone()));
                }
                return Err(err);
            }
        };

        let id = handle.id();
        let tx = self.completion_tx.clone();
        let waiter = handle.clone();
        self.client.runtime().spawn(async move {
            let outcome = waiter.wait().await;
            let _ = tx.send(Completion {
                request_id: waiter.id(),
                outcome,
            });
        });
        self.current = Some(handle);
        Ok(id)
    }

    fn apply(&mut self, completion: Completion) -> bool {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|handle| handle.id() == completion.request_id);
        if !is_current {
            debug!(request_id = completion.request_id, "dropping stale completion");
            return false;
        }
        self.current = None;
        self.show(completion.outcome);
        true
    }

    fn show(&mut self, outcome: Outcome) {
        self.display = match &outcome {
            Ok(answer) => answer.clone(),
            Err(err) => err.user_message(),
        };
        self.last_outcome = Some(outcome);
    }
}
