//! Cancellable, restartable delayed task
//!
//! A [`DebounceTimer`] holds at most one scheduled task. Every
//! [`reset`](DebounceTimer::reset) replaces the pending task and restarts the
//! delay; [`cancel`](DebounceTimer::cancel) drops it. Once the delay has
//! elapsed and the task has started running it is no longer pending and will
//! not be aborted: in-flight crypto and network work always runs to
//! completion.
//!
//! Superseded tasks are fenced by a generation counter checked under the same
//! lock that `reset` takes, so a timer whose abort lands late still cannot
//! fire after a newer one was scheduled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct DebounceTimer {
    delay: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task` to run after the delay, replacing any pending task
    ///
    /// Must be called from within a tokio runtime.
    pub fn reset<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }

        let shared = self.slot.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = shared.lock();
                if slot.generation != generation {
                    return;
                }
                slot.pending = None;
            }
            task.await;
        });
        slot.pending = Some(handle);
    }

    /// Drop the pending task, if any
    ///
    /// Returns whether a task was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        match slot.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a task is waiting for its delay to elapse
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}
