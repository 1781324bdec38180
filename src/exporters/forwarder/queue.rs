// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::warn;

use super::error::{ForwardError, Result};
use super::item::ForwardItem;

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time view of the forwarder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub accepted: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// Ordered, optionally bounded queue of pending items. Items are only ever
/// appended at the tail and removed from the head.
#[derive(Debug)]
pub(crate) struct ForwarderQueue {
    items: Mutex<VecDeque<ForwardItem>>,
    capacity: Option<usize>,
    eager_every: Option<usize>,
    eager: Notify,
    counters: Counters,
}

impl ForwarderQueue {
    pub(crate) fn new(capacity: Option<usize>, eager_every: Option<usize>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            eager_every,
            eager: Notify::new(),
            counters: Counters::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ForwardItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, item: ForwardItem) -> Result<()> {
        let len = {
            let mut items = self.lock();
            if let Some(capacity) = self.capacity {
                if items.len() >= capacity {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        capacity,
                        monitor_id = %item.monitor_id,
                        message = %item.message,
                        "Rejected result, forwarder queue is full"
                    );
                    return Err(ForwardError::QueueFull(capacity));
                }
            }
            items.push_back(item);
            items.len()
        };

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        if let Some(every) = self.eager_every {
            if len % every == 0 {
                self.eager.notify_one();
            }
        }
        Ok(())
    }

    /// Copies of the items at the head of the queue. `single` limits the
    /// batch to one item.
    pub(crate) fn head(&self, max_batch_size: Option<usize>, single: bool) -> Vec<ForwardItem> {
        let items = self.lock();
        let mut size = match max_batch_size {
            Some(max) => max.min(items.len()),
            None => items.len(),
        };
        if single {
            size = size.min(1);
        }
        items.iter().take(size).cloned().collect()
    }

    pub(crate) fn remove_head(&self, n: usize) {
        let mut items = self.lock();
        let n = n.min(items.len());
        items.drain(..n);
    }

    pub(crate) fn record_delivered(&self, n: usize) {
        self.counters
            .delivered
            .fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, n: usize) {
        self.counters.dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) async fn eager_drain_requested(&self) {
        self.eager.notified().await
    }

    pub(crate) fn request_drain(&self) {
        self.eager.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn stats(&self) -> ForwarderStats {
        ForwarderStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the forwarder. Cheap to clone, enqueue never blocks.
#[derive(Debug, Clone)]
pub struct ForwarderHandle {
    queue: Arc<ForwarderQueue>,
}

impl ForwarderHandle {
    pub(crate) fn new(queue: Arc<ForwarderQueue>) -> Self {
        Self { queue }
    }

    /// Append an item, or drop it when the queue is at capacity.
    pub fn enqueue(&self, item: ForwardItem) -> Result<()> {
        self.queue.push(item)
    }

    /// Schedule an out-of-band drain.
    pub fn request_drain(&self) {
        self.queue.request_drain()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ForwarderStats {
        self.queue.stats()
    }
}
