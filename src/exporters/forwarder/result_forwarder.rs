// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use tokio::select;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;
use tower::{BoxError, Service};
use tracing::{debug, info, warn};

use super::config::ForwarderConfig;
use super::item::ForwardItem;
use super::queue::{ForwarderHandle, ForwarderQueue, ForwarderStats};

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue was emptied
    Drained,
    /// A transport failure left items queued for the next drain
    Deferred,
}

struct DrainState<S> {
    sink: S,
    tries: u32,
}

/// Delivers queued items to the sink in batches.
///
/// After a failed send the next attempt carries a single item, so a transport
/// that partially delivered a batch before failing duplicates at most one
/// item per retry. A batch is dropped once `max_tries` attempts failed.
pub struct ResultForwarder<S> {
    config: ForwarderConfig,
    queue: Arc<ForwarderQueue>,
    state: Mutex<DrainState<S>>,
}

impl<S> ResultForwarder<S>
where
    S: Service<Vec<ForwardItem>, Response = (), Error = BoxError> + Send,
    S::Future: Send,
{
    pub fn new(config: ForwarderConfig, sink: S) -> Self {
        let queue = Arc::new(ForwarderQueue::new(
            config.queue_capacity,
            config.eager_drain_every,
        ));
        Self {
            config,
            queue,
            state: Mutex::new(DrainState { sink, tries: 0 }),
        }
    }

    pub fn handle(&self) -> ForwarderHandle {
        ForwarderHandle::new(self.queue.clone())
    }

    pub fn stats(&self) -> ForwarderStats {
        self.queue.stats()
    }

    /// Send batches until the queue is empty or a send fails without
    /// exhausting its tries. Only one drain runs at a time.
    pub async fn drain(&self) -> DrainOutcome {
        let mut state = self.state.lock().await;

        loop {
            let batch = self.queue.head(self.config.max_batch_size, state.tries > 0);
            if batch.is_empty() {
                return DrainOutcome::Drained;
            }

            let size = batch.len();
            let first_message = batch[0].message.clone();

            match send(&mut state.sink, batch).await {
                Ok(()) => {
                    debug!(batch_size = size, "Forwarded results");
                    self.queue.remove_head(size);
                    self.queue.record_delivered(size);
                    state.tries = 0;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        batch_size = size,
                        queue_len = self.queue.len(),
                        "[{}/{}] Failed forwarding results: {} ...",
                        state.tries,
                        self.max_tries_label(),
                        first_message
                    );

                    state.tries += 1;
                    match self.config.max_tries {
                        Some(max) if state.tries >= max => {
                            warn!(
                                batch_size = size,
                                queue_len = self.queue.len(),
                                "[{}/{}] Giving up forwarding results: {} ...",
                                state.tries,
                                max,
                                first_message
                            );
                            self.queue.remove_head(size);
                            self.queue.record_dropped(size);
                            state.tries = 0;
                        }
                        _ => return DrainOutcome::Deferred,
                    }
                }
            }
        }
    }

    /// Drain periodically and whenever an eager drain is requested, until
    /// cancelled. A final drain bounded by the shutdown timeout runs on exit.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        let mut ticker = self.config.drain_interval.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(
            capacity = ?self.config.queue_capacity,
            max_batch_size = ?self.config.max_batch_size,
            max_tries = ?self.config.max_tries,
            drain_interval = ?self.config.drain_interval,
            "Starting result forwarder"
        );

        loop {
            select! {
                _ = tick(&mut ticker) => {
                    self.drain().await;
                },
                _ = self.queue.eager_drain_requested() => {
                    debug!(queue_len = self.queue.len(), "Eager drain requested");
                    self.drain().await;
                },
                _ = cancel.cancelled() => break,
            }
        }

        if timeout(self.config.shutdown_flush_timeout, self.drain())
            .await
            .is_err()
        {
            warn!("Timed out flushing result forwarder on shutdown");
        }

        let stats = self.stats();
        info!(
            accepted = stats.accepted,
            delivered = stats.delivered,
            rejected = stats.rejected,
            dropped = stats.dropped,
            remaining = self.queue.len(),
            "Result forwarder stopped"
        );
        Ok(())
    }

    fn max_tries_label(&self) -> String {
        match self.config.max_tries {
            Some(max) => max.to_string(),
            None => "-1".to_string(),
        }
    }
}

async fn send<S>(sink: &mut S, batch: Vec<ForwardItem>) -> Result<(), BoxError>
where
    S: Service<Vec<ForwardItem>, Response = (), Error = BoxError>,
{
    sink.ready().await?.call(batch).await
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
