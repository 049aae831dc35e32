//! Deferred job queue - batches component updates.
//!
//! Reactive writes do not re-render immediately. A component's update effect
//! carries a scheduler that enqueues a job keyed by the component's ID, and
//! duplicate IDs are dropped, so a burst of writes collapses into a single
//! re-render at the next flush. Tests drive the flush directly with
//! [`flush_jobs`]; an embedding event loop would call it once per turn.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::reactivity::EffectRunner;

// =============================================================================
// Job
// =============================================================================

const RUNNER_ID_TAG: u64 = 1 << 63;

/// A deferred unit of work with a deduplication ID.
pub struct Job {
    id: u64,
    callback: Box<dyn FnMut()>,
}

impl Job {
    /// Create a job with an explicit dedup ID.
    pub fn new(id: u64, callback: impl FnMut() + 'static) -> Self {
        Self {
            id,
            callback: Box::new(callback),
        }
    }

    /// A job that re-runs an effect, deduplicated by the effect's ID.
    ///
    /// Effect IDs and caller-chosen IDs come from different counters, so
    /// runner jobs live in a tagged half of the ID space.
    pub fn from_runner(runner: &EffectRunner) -> Self {
        let runner = runner.clone();
        Self::new(runner.id() | RUNNER_ID_TAG, move || runner.run())
    }
}

// =============================================================================
// Queue
// =============================================================================

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
    static FLUSH_PENDING: Cell<bool> = const { Cell::new(false) };
}

/// Enqueue a job unless one with the same ID is already waiting.
pub fn queue_job(job: Job) {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.iter().any(|queued| queued.id == job.id) {
            return;
        }
        queue.push_back(job);
    });
    FLUSH_PENDING.with(|pending| pending.set(true));
}

/// Run queued jobs in FIFO order until the queue drains.
///
/// Jobs enqueued while flushing run in the same flush. Jobs run outside the
/// queue lock, so a job may freely enqueue more work.
pub fn flush_jobs() {
    FLUSH_PENDING.with(|pending| pending.set(false));
    loop {
        let job = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        match job {
            Some(mut job) => (job.callback)(),
            None => break,
        }
    }
}

/// Flush pending jobs, then run `f` against the settled state.
pub fn next_tick(f: impl FnOnce()) {
    flush_jobs();
    f();
}

/// Whether a flush is due.
pub fn has_pending_jobs() -> bool {
    FLUSH_PENDING.with(|pending| pending.get())
}

/// Drop all queued jobs (for testing).
pub fn reset_scheduler_state() {
    QUEUE.with(|queue| queue.borrow_mut().clear());
    FLUSH_PENDING.with(|pending| pending.set(false));
}
