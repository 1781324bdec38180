// SPDX-License-Identifier: Apache-2.0

use crate::bounded_channel::BoundedReceiver;
use crate::receivers::logfile::Notification;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower::{BoxError, Service, ServiceExt};
use tracing::{debug, warn};

/// Delivers tailer notifications to the event sink, one at a time and
/// without retries.
pub struct NotificationExporter<S> {
    rx: BoundedReceiver<Notification>,
    sink: S,
}

impl<S> NotificationExporter<S>
where
    S: Service<Vec<Notification>, Response = (), Error = BoxError>,
{
    pub fn new(rx: BoundedReceiver<Notification>, sink: S) -> Self {
        NotificationExporter { rx, sink }
    }

    pub async fn start(&mut self, cancel_token: CancellationToken) -> Result<(), BoxError> {
        loop {
            select! {
                n = self.rx.next() => match n {
                    Some(n) => self.deliver(n).await,
                    None => break,
                },
                _ = cancel_token.cancelled() => break,
            }
        }

        // Deliver whatever was raised before shutdown
        while let Some(n) = self.rx.try_recv() {
            self.deliver(n).await;
        }
        debug!("exiting notification exporter");
        Ok(())
    }

    async fn deliver(&mut self, notification: Notification) {
        let kind = notification.kind;
        let res = match self.sink.ready().await {
            Ok(sink) => sink.call(vec![notification]).await,
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            warn!(?kind, error = %e, "Failed to deliver notification");
        }
    }
}
