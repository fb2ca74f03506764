/// Background cursor pagination for the SQL endpoint.
///
/// After the first page of a query comes back with a cursor, the rest of the result is
/// pulled by a [`PaginationTask`] running on the shared runtime's blocking pool:
/// - each cursor page is POSTed as `{"cursor": ..}` to the SQL endpoint
/// - pages are pushed into the result queue, retrying while retrieval is still wanted
/// - the page without a continuation cursor ends the loop, after a best-effort close
///
/// Nothing escapes the task. Failures are recorded on the connection's error state and
/// end the loop, which the consumer sees as the end of the result plus a `Failed` outcome.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::constants::{CONTENT_TYPE_JSON, CURSOR_CLOSE_SUFFIX, QUEUE_TIMEOUT};
use crate::decode;
use crate::error::{CommError, ErrorKind, ErrorState};
use crate::models::{ResultPage, RetrievalOutcome};
use crate::queue::{PushError, ResultQueue};
use crate::request::{RequestBuilder, RequestPayload};
use crate::transport::{HttpMethod, HttpTransport};

#[derive(Debug, Default)]
struct RetrievalInner {
    generation: u64,
    retrieving: bool,
    outcome: RetrievalOutcome,
}

/// "Still retrieving" flag plus the outcome of the current query's retrieval.
///
/// Every query gets a new generation. A task only acts while its own generation is
/// current, so a task abandoned by a fenced reconnect cannot touch the next query.
#[derive(Debug, Default)]
pub struct RetrievalState {
    inner: Mutex<RetrievalInner>,
}

impl RetrievalState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RetrievalInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new retrieval and return its generation
    pub fn begin(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.retrieving = true;
        inner.outcome = RetrievalOutcome::InProgress;
        inner.generation
    }

    /// Mark a query that needed no background retrieval as done
    pub fn complete_without_task(&self) {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.retrieving = false;
        inner.outcome = RetrievalOutcome::Completed;
    }

    /// Record a query that failed before any page was queued
    pub fn fail_without_task(&self) {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.retrieving = false;
        inner.outcome = RetrievalOutcome::Failed;
    }

    /// Ask the current retrieval to stop. Returns true if one was running.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        let was_running = inner.retrieving;
        inner.retrieving = false;
        if inner.outcome == RetrievalOutcome::InProgress {
            inner.outcome = RetrievalOutcome::Cancelled;
        }
        was_running
    }

    /// Finish the retrieval of `generation`, returning the outcome that stuck.
    /// `None` if a newer retrieval has started since.
    pub fn finish(&self, generation: u64, outcome: RetrievalOutcome) -> Option<RetrievalOutcome> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        if inner.outcome == RetrievalOutcome::InProgress {
            inner.outcome = outcome;
        }
        inner.retrieving = false;
        Some(inner.outcome)
    }

    pub fn is_retrieving(&self) -> bool {
        self.lock().retrieving
    }

    pub fn is_active(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.retrieving && inner.generation == generation
    }

    pub fn outcome(&self) -> RetrievalOutcome {
        self.lock().outcome
    }
}

/// Everything the pagination loop needs, owned so the task can outlive the call that
/// spawned it.
pub struct PaginationTask {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) requests: RequestBuilder,
    pub(crate) endpoint: String,
    pub(crate) queue: Arc<ResultQueue>,
    pub(crate) retrieval: Arc<RetrievalState>,
    pub(crate) errors: ErrorState,
    pub(crate) generation: u64,
}

impl PaginationTask {
    /// Pull pages until the cursor runs out, retrieval is cancelled or something fails
    pub fn run(self, cursor: String) {
        tracing::debug!("Starting cursor pagination.");
        let outcome = self.paginate(cursor);

        match self.retrieval.finish(self.generation, outcome) {
            Some(RetrievalOutcome::Cancelled) => {
                self.queue.clear();
                tracing::debug!("Cursor pagination cancelled.");
            }
            Some(outcome) => tracing::debug!(?outcome, "Cursor pagination finished."),
            None => tracing::debug!("Cursor pagination superseded by a newer query."),
        }
    }

    fn paginate(&self, mut cursor: String) -> RetrievalOutcome {
        if cursor.is_empty() {
            return RetrievalOutcome::Completed;
        }

        while self.is_active() {
            let Some(page) = self.fetch_page(&cursor) else {
                return RetrievalOutcome::Failed;
            };

            let last = match page.cursor.clone() {
                Some(next) => {
                    cursor = next;
                    false
                }
                None => {
                    send_close_cursor_request(
                        self.transport.as_ref(),
                        &self.requests,
                        &self.endpoint,
                        &cursor,
                    );
                    true
                }
            };

            if !self.push(page) {
                return RetrievalOutcome::Cancelled;
            }
            if last {
                return RetrievalOutcome::Completed;
            }
        }

        RetrievalOutcome::Cancelled
    }

    fn is_active(&self) -> bool {
        self.retrieval.is_active(self.generation)
    }

    /// Fetch and decode one cursor page. `None` means an error was recorded.
    fn fetch_page(&self, cursor: &str) -> Option<ResultPage> {
        let payload = RequestPayload::Cursor(cursor);
        let response = self
            .requests
            .build(&self.endpoint, HttpMethod::Post, Some(CONTENT_TYPE_JSON), &payload)
            .and_then(|request| self.transport.send(request));

        let response = match response {
            Ok(response) => response,
            Err(e @ CommError::Transport(_)) => {
                self.errors.set_local(
                    "Cursor error",
                    format!("Failed to receive response from cursor. Received NULL response. {e}"),
                    ErrorKind::QuerySyntax,
                );
                return None;
            }
            Err(e) => {
                self.errors.set(e.into());
                return None;
            }
        };

        let body = response.body_text();
        if !response.is_ok() {
            match decode::parse_error_response(&body, ErrorKind::QuerySyntax) {
                Ok(details) => {
                    tracing::error!("{}", response.failure_description());
                    self.errors.set(details);
                }
                Err(_) => {
                    self.errors.set_local(
                        "Cursor error",
                        response.failure_description(),
                        ErrorKind::QuerySyntax,
                    );
                }
            }
            return None;
        }

        match decode::parse_cursor_page(&body) {
            Ok(page) => Some(page),
            Err(e) => {
                self.errors.set_local(
                    "Cursor error",
                    format!("Received runtime exception: {e}"),
                    ErrorKind::QuerySyntax,
                );
                None
            }
        }
    }

    /// Push until the queue takes the page. False if retrieval stopped first.
    fn push(&self, mut page: ResultPage) -> bool {
        loop {
            if !self.is_active() {
                return false;
            }
            match self.queue.push(QUEUE_TIMEOUT, page) {
                Ok(()) => return true,
                Err(PushError::Closed(_)) => return false,
                Err(PushError::Timeout(returned)) => page = returned,
            }
        }
    }
}

/// Release a server-side cursor. Failures are logged and otherwise ignored.
pub fn send_close_cursor_request(
    transport: &dyn HttpTransport,
    requests: &RequestBuilder,
    sql_endpoint: &str,
    cursor: &str,
) {
    let endpoint = format!("{sql_endpoint}{CURSOR_CLOSE_SUFFIX}");
    let payload = RequestPayload::Cursor(cursor);

    let result = requests
        .build(&endpoint, HttpMethod::Post, Some(CONTENT_TYPE_JSON), &payload)
        .and_then(|request| transport.send(request));

    match result {
        Ok(response) if response.is_ok() => tracing::debug!("Cursor closed."),
        Ok(response) => tracing::warn!(
            "Cursor close request was not accepted. {}",
            response.failure_description()
        ),
        Err(e) => tracing::warn!(
            "Failed to receive response from cursor close request. Received NULL response. {e}"
        ),
    }
}
