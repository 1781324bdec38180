// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::future::{Ready, ready};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::{BoxError, Service};

use super::item::ForwardItem;

/// Sink that records the messages of every call and fails calls according
/// to a script. Once the script runs out every call succeeds.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSink {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    items: Arc<Mutex<Vec<ForwardItem>>>,
    failures: Arc<Mutex<VecDeque<bool>>>,
}

impl ScriptedSink {
    pub(crate) fn failing(script: &[bool]) -> Self {
        let sink = Self::default();
        sink.failures.lock().unwrap().extend(script.iter().copied());
        sink
    }

    /// Messages of every call, failed ones included
    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Items of successful calls only
    pub(crate) fn delivered(&self) -> Vec<ForwardItem> {
        self.items.lock().unwrap().clone()
    }
}

impl Service<Vec<ForwardItem>> for ScriptedSink {
    type Response = ();
    type Error = BoxError;
    type Future = Ready<Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, batch: Vec<ForwardItem>) -> Self::Future {
        self.calls
            .lock()
            .unwrap()
            .push(batch.iter().map(|i| i.message.clone()).collect());

        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            ready(Err("transport unavailable".into()))
        } else {
            self.items.lock().unwrap().extend(batch);
            ready(Ok(()))
        }
    }
}
