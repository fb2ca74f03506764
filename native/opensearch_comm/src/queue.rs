//! Bounded hand-off between the pagination task and the row-fetch caller
//!
//! Pushes and pops block for at most one timeout interval. Callers loop around them
//! and re-check the retrieval flag between attempts, which is what makes cancellation
//! bounded: flipping the flag and closing the queue wakes everything within one
//! interval.
//!
//! A closed queue holds nothing. Pushes are refused (the page is handed back) and pops
//! return `None` straight away until [`ResultQueue::reopen`] is called for the next query.
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::models::ResultPage;

/// Why a push did not take the page. The page is handed back either way.
#[derive(Debug)]
pub enum PushError {
    /// Still full after the timeout
    Timeout(ResultPage),
    /// The queue was closed
    Closed(ResultPage),
}

impl PushError {
    pub fn into_page(self) -> ResultPage {
        match self {
            PushError::Timeout(page) | PushError::Closed(page) => page,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PushError::Closed(_))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pages: VecDeque<ResultPage>,
    closed: bool,
}

#[derive(Debug)]
pub struct ResultQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl ResultQueue {
    pub fn new(capacity: usize) -> Self {
        ResultQueue {
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    // Nothing panics while holding the lock, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a page, waiting up to `timeout` for space
    pub fn push(&self, timeout: Duration, page: ResultPage) -> Result<(), PushError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(PushError::Closed(page));
            }
            if state.pages.len() < self.capacity {
                state.pages.push_back(page);
                drop(state);
                self.not_empty.notify_one();
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PushError::Timeout(page));
            }
            state = self
                .not_full
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Pop the oldest page, waiting up to `timeout` for one to arrive
    pub fn pop(&self, timeout: Duration) -> Option<ResultPage> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if state.closed {
                return None;
            }
            if let Some(page) = state.pages.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(page);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<ResultPage> {
        self.pop(Duration::ZERO)
    }

    /// Drop every queued page and wake blocked producers
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.lock();
            std::mem::take(&mut state.pages)
        };
        self.not_full.notify_all();
        drop(dropped);
    }

    /// Clear the queue and refuse further pushes until reopened
    pub fn close(&self) {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.pages)
        };
        self.not_full.notify_all();
        self.not_empty.notify_all();
        drop(dropped);
    }

    /// Accept pushes again. Anything left over from a previous query is dropped.
    pub fn reopen(&self) {
        let mut state = self.lock();
        state.pages.clear();
        state.closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
