//! Task submission capability.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed unit of background work.
pub type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fire-and-forget execution of background work.
///
/// The orchestrator hands off stale-key refreshes through this trait and
/// never waits for them. Per-key exclusivity is already enforced before
/// submission, so implementations need no deduplication of their own.
///
/// Implementations own failure isolation: a task that cannot be started, or
/// that panics, must be logged and dropped, never reported back.
pub trait TaskRunner: Send + Sync {
    /// Submits `task` for execution. `name` identifies it in logs.
    fn submit(&self, name: &str, task: BoxTask);
}

impl<R: TaskRunner + ?Sized> TaskRunner for Arc<R> {
    fn submit(&self, name: &str, task: BoxTask) {
        (**self).submit(name, task)
    }
}
