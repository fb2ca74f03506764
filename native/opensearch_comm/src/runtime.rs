//! Process-wide async runtime with lease-based lifetime
//!
//! The reqwest transport is async, while the ODBC-facing API is synchronous. All
//! async work is driven through a single multi-thread tokio runtime shared by every
//! connection in the process:
//! - The first [`RuntimeLease::acquire`] builds the runtime (under a mutex).
//! - Each lease bumps an atomic count; cloning a lease acquires another one.
//! - Dropping the last lease shuts the runtime down in the background.
//!
//! Connections and transports each hold a lease, so the runtime outlives any
//! in-flight pagination task that still owns a transport.
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{CommError, Result};

static RUNTIME_SLOT: Lazy<Mutex<Option<Arc<Runtime>>>> = Lazy::new(|| Mutex::new(None));
static ACTIVE_LEASES: AtomicUsize = AtomicUsize::new(0);

/// Shared ownership of the process-wide runtime
#[derive(Debug)]
pub struct RuntimeLease {
    runtime: Option<Arc<Runtime>>,
}

impl RuntimeLease {
    /// Acquire a lease, building the runtime if this is the first one
    pub fn acquire() -> Result<Self> {
        let mut slot = crate::utils::safe_lock(&RUNTIME_SLOT, "RuntimeLease::acquire")?;

        let runtime = match slot.as_ref() {
            Some(runtime) => runtime.clone(),
            None => {
                let runtime = Arc::new(
                    Builder::new_multi_thread()
                        .enable_all()
                        .thread_name("opensearch-comm")
                        .build()
                        .map_err(|e| CommError::Runtime(format!("Failed to build runtime: {e}")))?,
                );
                tracing::debug!("Transport runtime initialized");
                *slot = Some(runtime.clone());
                runtime
            }
        };

        ACTIVE_LEASES.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Number of leases currently alive in the process
    pub fn active_leases() -> usize {
        ACTIVE_LEASES.load(Ordering::SeqCst)
    }

    fn runtime(&self) -> Result<&Arc<Runtime>> {
        self.runtime
            .as_ref()
            .ok_or_else(|| CommError::Runtime("Runtime lease already released".to_string()))
    }

    /// Handle for spawning onto the runtime
    pub fn handle(&self) -> Result<Handle> {
        Ok(self.runtime()?.handle().clone())
    }

    /// Drive a future to completion from synchronous code
    ///
    /// Must not be called from inside an async context. Calling it from a
    /// `spawn_blocking` task is fine.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        Ok(self.runtime()?.block_on(future))
    }

    /// Acquire an additional lease on the same runtime
    pub fn try_clone(&self) -> Result<Self> {
        let runtime = self.runtime()?.clone();
        let _slot = crate::utils::safe_lock(&RUNTIME_SLOT, "RuntimeLease::try_clone")?;
        ACTIVE_LEASES.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            runtime: Some(runtime),
        })
    }
}

impl Drop for RuntimeLease {
    fn drop(&mut self) {
        let mine = self.runtime.take();
        let mut slot = RUNTIME_SLOT.lock().unwrap_or_else(PoisonError::into_inner);

        if ACTIVE_LEASES.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }

        let shared = slot.take();
        drop(slot);
        drop(mine);

        if let Some(runtime) = shared {
            // A leftover clone means someone is still inside block_on; let it go down with them.
            if let Ok(runtime) = Arc::try_unwrap(runtime) {
                runtime.shutdown_background();
                tracing::debug!("Transport runtime shut down");
            }
        }
    }
}
