//! Ambient access to the [`Context`] of the request being handled.
//!
//! Code that is not handed the context explicitly reads it with [`current`]. Where the value
//! lives depends on the [`PropagationMode`]:
//!
//! * [`PropagationMode::PerProcess`]: one process-wide slot. Only valid when a process handles a
//!   single request at a time, as on most function hosts. The slot is readable only while a
//!   per-process region is running, so code outside any region can still observe it if a
//!   per-process handler in the same process is mid-request.
//! * [`PropagationMode::Scoped`]: every request runs inside a task-local region holding its own
//!   cell. Concurrent requests never observe each other's context, and the cell is gone once the
//!   region exits, whether it completed, failed or was dropped.

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;

use super::Context;
use crate::error::ContextError;

tokio::task_local! {
    static REQUEST_CELL: RwLock<Option<Context>>;
}

static PROCESS_SLOT: Lazy<RwLock<Option<Context>>> = Lazy::new(Default::default);
static PROCESS_REGIONS: AtomicUsize = AtomicUsize::new(0);

/// How the request context is made available ambiently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationMode {
    /// Isolate every request in its own task-local cell.
    #[default]
    Scoped,
    /// Share a single process-wide slot.
    PerProcess,
}

/// Creates and tears down the ambient storage for one request at a time.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropagationScope {
    mode: PropagationMode,
}

impl PropagationScope {
    pub fn new(mode: PropagationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PropagationMode {
        self.mode
    }

    pub fn is_scoped_mode_enabled(&self) -> bool {
        self.mode == PropagationMode::Scoped
    }

    /// Run `body` inside a fresh storage region. The region's storage is released on every exit
    /// path of `body`.
    pub async fn run_scoped<F: Future>(&self, body: F) -> F::Output {
        match self.mode {
            PropagationMode::Scoped => REQUEST_CELL.scope(RwLock::new(None), body).await,
            PropagationMode::PerProcess => {
                PROCESS_REGIONS.fetch_add(1, Ordering::SeqCst);
                let _reset = scopeguard::guard((), |_| {
                    PROCESS_SLOT.write().take();
                    PROCESS_REGIONS.fetch_sub(1, Ordering::SeqCst);
                });
                body.await
            }
        }
    }

    /// Make `context` the ambient context of the running request.
    ///
    /// In scoped mode this fails when called outside of [`PropagationScope::run_scoped`].
    pub fn publish(&self, context: &Context) -> Result<(), ContextError> {
        match self.mode {
            PropagationMode::Scoped => REQUEST_CELL
                .try_with(|cell| {
                    *cell.write() = Some(context.clone());
                })
                .map_err(|_| ContextError::OutsideScope),
            PropagationMode::PerProcess => {
                *PROCESS_SLOT.write() = Some(context.clone());
                Ok(())
            }
        }
    }
}

/// The context of the request currently being handled, if one was published.
///
/// Inside a scoped region only that region's cell is consulted. Outside of one, the process slot
/// is consulted only while a per-process region is running.
pub fn current() -> Option<Context> {
    REQUEST_CELL
        .try_with(|cell| cell.read().clone())
        .unwrap_or_else(|_| {
            if PROCESS_REGIONS.load(Ordering::SeqCst) == 0 {
                None
            } else {
                PROCESS_SLOT.read().clone()
            }
        })
}
