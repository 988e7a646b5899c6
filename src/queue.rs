//! Bounded-concurrency work queue.
//!
//! Items are boxed futures. At most `concurrency` of them are polled at once;
//! the rest wait in FIFO order. The queue is reusable: items may be enqueued
//! and `run` called again after a previous batch drained.
//!
//! The queue does not spawn tasks. Its owner drives it by awaiting
//! [`WorkQueue::next`], which keeps every completion on the owner's control
//! flow.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::future::Future;

/// Default number of concurrent work items
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Something observed while driving the queue
#[derive(Debug, PartialEq, Eq)]
pub enum QueueEvent<T> {
    /// A work item finished with this output
    Completed(T),
    /// Nothing is outstanding any more for the current run
    Drained,
}

pub struct WorkQueue<T> {
    concurrency: usize,
    pending: VecDeque<BoxFuture<'static, T>>,
    running: FuturesUnordered<BoxFuture<'static, T>>,
    is_running: bool,
    stopped: bool,
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            pending: VecDeque::new(),
            running: FuturesUnordered::new(),
            is_running: false,
            stopped: false,
        }
    }

    /// Append an item without starting it. Ignored once the queue is stopped.
    pub fn enqueue<F>(&mut self, item: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.stopped {
            return;
        }
        self.pending.push_back(Box::pin(item));
    }

    /// Start executing enqueued items. A later [`QueueEvent::Drained`] is
    /// reported once nothing is outstanding.
    pub fn run(&mut self) {
        if self.stopped {
            return;
        }
        self.is_running = true;
        self.fill();
    }

    /// Prevent not-yet-started items from ever starting. Items already
    /// running are left alone and still complete through [`WorkQueue::next`].
    pub fn stop(&mut self) {
        self.stopped = true;
        self.pending.clear();
    }

    /// Drop every item, running ones included
    pub fn clear(&mut self) {
        self.pending.clear();
        self.running = FuturesUnordered::new();
        self.is_running = false;
    }

    /// Number of items currently being polled
    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Number of items waiting for a slot
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for the next completion or for the current run to drain.
    ///
    /// Never resolves while the queue is idle. Cancel safe: dropping the
    /// returned future loses no completion.
    pub async fn next(&mut self) -> QueueEvent<T> {
        if !self.running.is_empty() {
            if let Some(output) = self.running.next().await {
                self.fill();
                return QueueEvent::Completed(output);
            }
        }
        if self.is_running {
            self.is_running = false;
            return QueueEvent::Drained;
        }
        std::future::pending().await
    }

    fn fill(&mut self) {
        while self.running.len() < self.concurrency {
            match self.pending.pop_front() {
                Some(item) => self.running.push(item),
                None => break,
            }
        }
    }
}
