/// Query execution and result hand-off
///
/// `execute_direct` runs the first page synchronously and queues it. If the page carries
/// a cursor, a [`PaginationTask`] is spawned on the runtime's blocking pool to fetch the
/// rest while the caller drains the queue with `pop_result`.
///
/// Stopping retrieval flips the retrieval flag and closes the queue; blocked pushes and
/// pops notice within one queue timeout.
use std::sync::Arc;

use crate::connection::Connection;
use crate::constants::{CONTENT_TYPE_JSON, PAGINATION_JOIN_GRACE, QUEUE_TIMEOUT};
use crate::cursor::{PaginationTask, RetrievalState};
use crate::decode;
use crate::error::{CommError, ErrorDetails, ErrorKind};
use crate::models::{ConnStatus, ResultPage, RetrievalOutcome};
use crate::queue::{PushError, ResultQueue};
use crate::request::RequestPayload;
use crate::transport::HttpMethod;

/// Stops result retrieval from any thread, without access to the connection
#[derive(Debug, Clone)]
pub struct CancelHandle {
    queue: Arc<ResultQueue>,
    retrieval: Arc<RetrievalState>,
}

impl CancelHandle {
    /// Idempotent
    pub fn cancel(&self) {
        stop(&self.retrieval, &self.queue);
    }

    pub fn outcome(&self) -> RetrievalOutcome {
        self.retrieval.outcome()
    }
}

fn stop(retrieval: &RetrievalState, queue: &ResultQueue) {
    if retrieval.cancel() {
        tracing::debug!("Result retrieval stopped.");
    }
    queue.close();
}

impl Connection {
    /// Execute `query` and queue its first page.
    ///
    /// Returns once the first page is queued; later pages arrive in the background.
    pub fn execute_direct(
        &mut self,
        query: Option<&str>,
        fetch_size: &str,
    ) -> Result<(), ErrorDetails> {
        self.errors.clear();

        let Some(query) = query else {
            return Err(self.errors.set_local(
                "Execution error",
                "Query is NULL",
                ErrorKind::InvalidNullPtr,
            ));
        };
        let (Some(client), Some(requests)) = (self.client.clone(), self.requests.clone()) else {
            return Err(self.errors.set_local(
                "Execution error",
                "Unable to connect. Please try connecting again.",
                ErrorKind::CommLinkFailure,
            ));
        };

        self.fence_pagination();
        self.queue.reopen();

        let endpoint = self.sql_endpoint().to_string();
        tracing::debug!("Attempting to execute a query \"{query}\"");

        let payload = RequestPayload::Query {
            query,
            fetch_size: Some(fetch_size),
        };
        let response = requests
            .build(&endpoint, HttpMethod::Post, Some(CONTENT_TYPE_JSON), &payload)
            .and_then(|request| client.send(request));

        let response = match response {
            Ok(response) => response,
            Err(CommError::Transport(e)) => {
                tracing::debug!(error = %e, "Query request produced no response");
                return Err(self.fail_query(ErrorDetails::local(
                    "Execution error",
                    "Failed to receive response from query. Received NULL response.",
                    ErrorKind::QuerySyntax,
                )));
            }
            Err(e) => return Err(self.fail_query(e.into())),
        };

        let body = response.body_text();
        if !response.is_ok() {
            let message = response.failure_description();
            tracing::error!("{message}");
            let details = decode::parse_error_response(&body, ErrorKind::QuerySyntax)
                .unwrap_or_else(|_| {
                    ErrorDetails::local("Execution error", message, ErrorKind::QuerySyntax)
                });
            return Err(self.fail_query(details));
        }

        let page = match decode::parse_query_page(&body) {
            Ok(page) => page,
            Err(e) => {
                return Err(self.fail_query(ErrorDetails::local(
                    "Execution error",
                    format!("Received runtime exception: {e}"),
                    ErrorKind::QuerySyntax,
                )));
            }
        };

        let cursor = page.cursor.clone();
        let generation = match &cursor {
            Some(_) => Some(self.retrieval.begin()),
            None => {
                self.retrieval.complete_without_task();
                None
            }
        };

        self.push_first_page(page)?;

        if let (Some(cursor), Some(generation)) = (cursor, generation) {
            let task = PaginationTask {
                transport: client,
                requests,
                endpoint,
                queue: self.queue.clone(),
                retrieval: self.retrieval.clone(),
                errors: self.errors.clone(),
                generation,
            };

            match self.runtime.handle() {
                Ok(handle) => {
                    self.pagination = Some(handle.spawn_blocking(move || task.run(cursor)));
                }
                Err(e) => {
                    self.errors.set_local(
                        "Cursor error",
                        format!("Unable to start cursor pagination: {e}"),
                        ErrorKind::QuerySyntax,
                    );
                    self.retrieval.finish(generation, RetrievalOutcome::Failed);
                }
            }
        }

        Ok(())
    }

    fn push_first_page(&mut self, mut page: ResultPage) -> Result<(), ErrorDetails> {
        loop {
            match self.queue.push(QUEUE_TIMEOUT, page) {
                Ok(()) => return Ok(()),
                Err(PushError::Timeout(returned)) if self.status == ConnStatus::Ok => {
                    page = returned;
                }
                Err(_) => {
                    return Err(self.fail_query(ErrorDetails::local(
                        "Execution error",
                        "Unable to queue the query result, the connection is no longer open.",
                        ErrorKind::CommLinkFailure,
                    )));
                }
            }
        }
    }

    fn fail_query(&mut self, details: ErrorDetails) -> ErrorDetails {
        self.retrieval.fail_without_task();
        self.errors.set(details.clone());
        details
    }

    /// Next queued page, waiting while retrieval is still running.
    ///
    /// `None` once retrieval has ended and nothing is left; check
    /// [`Connection::retrieval_outcome`] to tell completion from failure.
    pub fn pop_result(&self) -> Option<ResultPage> {
        loop {
            if let Some(page) = self.queue.pop(QUEUE_TIMEOUT) {
                return Some(page);
            }
            if !self.retrieval.is_retrieving() {
                // A page may have landed between the timed-out pop and the flag flip.
                return self.queue.try_pop();
            }
        }
    }

    /// Stop background retrieval and drop everything queued. Idempotent.
    pub fn stop_result_retrieval(&self) {
        stop(&self.retrieval, &self.queue);
    }

    pub fn retrieval_outcome(&self) -> RetrievalOutcome {
        self.retrieval.outcome()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            queue: self.queue.clone(),
            retrieval: self.retrieval.clone(),
        }
    }

    /// Stop the previous pagination task and wait for it, bounded by the response
    /// timeout plus a grace period. A task still running after that is abandoned.
    pub(crate) fn fence_pagination(&mut self) {
        let Some(handle) = self.pagination.take() else {
            return;
        };

        self.stop_result_retrieval();
        if handle.is_finished() {
            return;
        }

        let limit = self.options.response_timeout() + PAGINATION_JOIN_GRACE;
        match self
            .runtime
            .block_on(tokio::time::timeout(limit, handle))
        {
            Ok(Ok(Ok(()))) => tracing::debug!("Previous pagination task joined."),
            Ok(Ok(Err(e))) => tracing::warn!("Previous pagination task failed: {e}"),
            Ok(Err(_)) => tracing::warn!(
                "Previous pagination task still running after {limit:?}; abandoning it."
            ),
            Err(e) => tracing::warn!("Unable to wait for previous pagination task: {e}"),
        }
    }
}
