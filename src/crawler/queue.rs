//! Unbounded work queue with a join barrier
//!
//! Workers pop items with [`WorkQueue::get`] and report completion through
//! the returned [`WorkGuard`], which can travel with the item into another
//! task. [`WorkQueue::join`] resolves once every item ever put on the queue
//! has completed, including items added while the queue was being drained.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

struct QueueState<T> {
    items: VecDeque<T>,

    /// Items put but not yet completed (queued + in flight)
    unfinished: usize,
}

pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    item_ready: Notify,
    all_done: Notify,
    idle: Notify,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            item_ready: Notify::new(),
            all_done: Notify::new(),
            idle: Notify::new(),
        }
    }

    // Critical sections never panic, so a poisoned lock still holds
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends an item to the back of the queue
    pub fn put(&self, item: T) {
        {
            let mut state = self.lock();
            state.items.push_back(item);
            state.unfinished += 1;
        }
        self.item_ready.notify_one();
    }

    /// Waits for the next item
    ///
    /// The item counts as in flight until the returned guard is dropped. The
    /// guard holds its own reference to the queue.
    pub async fn get(self: &Arc<Self>) -> (T, WorkGuard<T>) {
        loop {
            let next = self.lock().items.pop_front();
            if let Some(item) = next {
                return (
                    item,
                    WorkGuard {
                        queue: Arc::clone(self),
                    },
                );
            }
            self.item_ready.notified().await;
        }
    }

    /// Waits until every item put so far (and every item they spawn) has completed
    pub async fn join(&self) {
        loop {
            let notified = self.all_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.lock().unfinished == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Waits until no popped item is still being worked on
    ///
    /// Items still waiting in the queue do not count.
    pub async fn wait_in_flight(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Items waiting to be picked up
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items put but not completed, in flight ones included
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Items popped but not completed yet
    pub fn in_flight(&self) -> usize {
        let state = self.lock();
        state.unfinished.saturating_sub(state.items.len())
    }

    fn task_done(&self) {
        let (finished, idle) = {
            let mut state = self.lock();
            state.unfinished = state.unfinished.saturating_sub(1);
            (state.unfinished == 0, state.unfinished <= state.items.len())
        };

        if finished {
            self.all_done.notify_waiters();
        }
        if idle {
            self.idle.notify_waiters();
        }
    }
}

/// Marks an item complete when dropped, even if its handler panicked or was aborted
pub struct WorkGuard<T> {
    queue: Arc<WorkQueue<T>>,
}

impl<T> Drop for WorkGuard<T> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
