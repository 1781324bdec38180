// SPDX-License-Identifier: Apache-2.0

use std::future::{Ready, ready};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tower::{BoxError, Service};
use tracing::debug;

/// Sink that accepts and discards every batch
#[derive(Debug, Default, Clone)]
pub struct BlackholeSink {
    discarded: Arc<AtomicU64>,
}

impl BlackholeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl<T> Service<Vec<T>> for BlackholeSink {
    type Response = ();
    type Error = BoxError;
    type Future = Ready<Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, batch: Vec<T>) -> Self::Future {
        debug!(batch_size = batch.len(), "Discarding batch");
        self.discarded
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn discards_batches() {
        let mut sink = BlackholeSink::new();
        ServiceExt::<Vec<i32>>::ready(&mut sink)
            .await
            .unwrap()
            .call(vec![1, 2, 3])
            .await
            .unwrap();
        ServiceExt::<Vec<&str>>::ready(&mut sink)
            .await
            .unwrap()
            .call(vec!["a"])
            .await
            .unwrap();
        assert_eq!(sink.discarded(), 4);
    }
}
