// src/crawl/pool.rs
// =============================================================================
// A fixed-capacity pool of tokio worker tasks that run crawl jobs.
//
// How it works:
// 1. submit() puts a job on the queue and either wakes an idle worker or,
//    if every worker is busy and we are below max_workers, spawns a new one
// 2. Each worker loops: pop a job, run it, repeat
// 3. With nothing to do, workers above core_workers wait keep_alive and then
//    exit; the core workers wait indefinitely
// 4. cancel_all() fires a CancellationToken that every running job is raced
//    against, so in-flight jobs are dropped at their next .await and queued
//    ones are discarded
// 5. A job that panics is caught at the worker; the worker and its slot
//    carry on with the next job
//
// At most max_workers jobs ever run at the same time, no matter how many
// are submitted.
//
// Rust concepts:
// - Arc + Mutex: shared bookkeeping between the pool handle and its workers
// - Notify: parking idle workers without busy-waiting
// - tokio::select!: racing a job against cancellation
// =============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::PoolError;

/// One unit of work for the pool
pub type Job = BoxFuture<'static, ()>;

// Cloning gives another handle to the same pool
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

struct Shared {
    core_workers: usize,
    max_workers: usize,
    keep_alive: Duration,
    state: Mutex<PoolState>,
    job_ready: Notify,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Job>,
    // Live worker tasks, busy or idle
    workers: usize,
    // Workers parked waiting for a job
    idle: usize,
    // notify_one() calls not yet picked up by an idle worker
    wakeups: usize,
    // Workers currently running a job
    active: usize,
}

impl WorkerPool {
    // Creates an empty pool; workers are spawned lazily by submit().
    //
    // Must be used from inside a tokio runtime.
    pub fn new(core_workers: usize, max_workers: usize, keep_alive: Duration) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            shared: Arc::new(Shared {
                core_workers: core_workers.min(max_workers),
                max_workers,
                keep_alive,
                state: Mutex::new(PoolState::default()),
                job_ready: Notify::new(),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    // Schedules a job. Never blocks: if every worker is busy the job waits
    // in the queue.
    pub fn submit(&self, job: Job) -> Result<(), PoolError> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        // Checked under the lock so a concurrent cancel_all() can't strand
        // a job in a queue nobody will drain
        if shared.cancel.is_cancelled() {
            return Err(PoolError::ShuttingDown);
        }

        state.queue.push_back(job);

        if state.idle > state.wakeups {
            state.wakeups += 1;
            shared.job_ready.notify_one();
        } else if state.workers < shared.max_workers {
            state.workers += 1;
            shared.tracker.spawn(run_worker(Arc::clone(shared)));
        }

        Ok(())
    }

    // Slots not currently running a job. Queued jobs don't count.
    //
    // A hint: it can be stale by the time the caller acts on it.
    pub fn available_slots(&self) -> usize {
        let state = self.shared.state.lock();
        self.shared.max_workers.saturating_sub(state.active)
    }

    // Discards queued jobs, interrupts running ones and refuses new work.
    // Safe to call more than once.
    pub fn cancel_all(&self) {
        let dropped = {
            let mut state = self.shared.state.lock();
            self.shared.cancel.cancel();
            std::mem::take(&mut state.queue)
        };
        self.shared.tracker.close();

        if !dropped.is_empty() {
            tracing::debug!(discarded = dropped.len(), "dropped queued jobs on cancel");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    // Waits for every worker task to exit. Only returns after cancel_all(),
    // since core workers otherwise stay parked forever.
    pub async fn join(&self) {
        self.shared.tracker.wait().await;
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkerPool")
            .field("core_workers", &self.shared.core_workers)
            .field("max_workers", &self.shared.max_workers)
            .field("workers", &state.workers)
            .field("active", &state.active)
            .field("queued", &state.queue.len())
            .field("shutting_down", &self.shared.cancel.is_cancelled())
            .finish()
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let Some(job) = shared.next_job() else {
            if shared.wait_for_job().await {
                continue;
            }
            return;
        };

        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                let mut state = shared.state.lock();
                state.active -= 1;
                state.workers -= 1;
                return;
            }
            result = AssertUnwindSafe(job).catch_unwind() => {
                if result.is_err() {
                    tracing::error!("pool job panicked");
                }
            }
        }

        shared.state.lock().active -= 1;
    }
}

impl Shared {
    fn next_job(&self) -> Option<Job> {
        let mut state = self.state.lock();
        if self.cancel.is_cancelled() {
            return None;
        }
        let job = state.queue.pop_front()?;
        state.active += 1;
        Some(job)
    }

    // Parks an idle worker. Returns false when the worker should exit.
    async fn wait_for_job(&self) -> bool {
        let reclaimable = {
            let mut state = self.state.lock();
            if self.cancel.is_cancelled() {
                state.workers -= 1;
                return false;
            }
            // A submit slipped in between next_job() and here
            if !state.queue.is_empty() {
                return true;
            }
            state.idle += 1;
            state.workers > self.core_workers
        };

        let woken = tokio::select! {
            _ = self.cancel.cancelled() => {
                let mut state = self.state.lock();
                state.idle -= 1;
                state.workers -= 1;
                return false;
            }
            woken = self.park(reclaimable) => woken,
        };

        let mut state = self.state.lock();
        state.idle -= 1;
        if woken || !state.queue.is_empty() {
            state.wakeups = state.wakeups.saturating_sub(1);
        }

        if !woken && state.queue.is_empty() && state.workers > self.core_workers {
            state.workers -= 1;
            return false;
        }

        true
    }

    async fn park(&self, reclaimable: bool) -> bool {
        if reclaimable {
            tokio::time::timeout(self.keep_alive, self.job_ready.notified())
                .await
                .is_ok()
        } else {
            self.job_ready.notified().await;
            true
        }
    }
}
