//! Tokio-backed background task runner.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use readthrough_core::{BoxTask, TaskRunner};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Runs background refreshes on the current Tokio runtime.
///
/// Submission never blocks and never fails the caller: without a runtime the
/// task is logged and dropped, and a panicking task is logged once it ends.
/// The runner counts tasks in flight so shutdown code and tests can wait for
/// them with [`TokioTaskRunner::drain`].
#[derive(Debug, Clone, Default)]
pub struct TokioTaskRunner {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl TokioTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of submitted tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until every submitted task has finished.
    pub async fn drain(&self) {
        loop {
            let idle = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}

impl TaskRunner for TokioTaskRunner {
    fn submit(&self, name: &str, task: BoxTask) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(task = %name, error = %e, "no runtime available, background task dropped");
                return;
            },
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let tracker = InFlight {
            count: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        };

        let name = name.to_owned();
        debug!(task = %name, "background task submitted");

        let join = handle.spawn(async move {
            let _tracker = tracker;
            task.await;
        });

        handle.spawn(async move {
            if let Err(e) = join.await
                && e.is_panic()
            {
                error!(task = %name, "background task panicked");
            }
        });
    }
}

/// Decrements the in-flight count when the task ends, panics included.
struct InFlight {
    count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
