// SPDX-License-Identifier: Apache-2.0

use crate::bounded_channel::{BoundedReceiver, bounded};
use crate::exporters::blackhole::BlackholeSink;
use crate::exporters::forwarder::{ForwardItem, ResultForwarder};
use crate::exporters::json_lines::JsonLinesExporter;
use crate::exporters::notifications::NotificationExporter;
use crate::init::args::{AgentRun, Exporter};
use crate::init::wait;
use crate::receivers::logfile::{
    AlwaysOpen, DirectoryScanner, LogfileReceiver, MonitorSource, Notification, PatternMatcher,
    RunWindow,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{BoxError, Service};
use tracing::{debug, error, info, warn};

/// Extra time granted to the exporters on top of the forwarder's flush timeout
const EXPORTERS_EXIT_GRACE: Duration = Duration::from_millis(500);

pub struct Agent {
    config: Box<AgentRun>,
    run_window: Arc<dyn RunWindow>,
    drain_requests: Option<BoundedReceiver<()>>,
}

impl Agent {
    pub fn new(config: Box<AgentRun>) -> Self {
        Self {
            config,
            run_window: Arc::new(AlwaysOpen),
            drain_requests: None,
        }
    }

    pub fn with_run_window(mut self, run_window: Arc<dyn RunWindow>) -> Self {
        self.run_window = run_window;
        self
    }

    /// Every message received triggers an immediate forwarder drain
    pub fn with_drain_requests(mut self, drain_requests: BoundedReceiver<()>) -> Self {
        self.drain_requests = Some(drain_requests);
        self
    }

    pub async fn run(self, agent_cancel: CancellationToken) -> Result<(), BoxError> {
        info!("Starting logmon.");

        match self.config.exporter {
            Exporter::JsonLines => {
                let exporter = match &self.config.json_lines_output {
                    Some(path) => JsonLinesExporter::to_file(path)
                        .map_err(|e| format!("failed to open {:?}: {}", path, e))?,
                    None => JsonLinesExporter::to_stdout(),
                };
                self.run_with(exporter.clone(), exporter, agent_cancel)
                    .await
            }
            Exporter::Blackhole => {
                let sink = BlackholeSink::new();
                self.run_with(sink.clone(), sink, agent_cancel).await
            }
        }
    }

    async fn run_with<S, N>(
        self,
        sink: S,
        notification_sink: N,
        agent_cancel: CancellationToken,
    ) -> Result<(), BoxError>
    where
        S: Service<Vec<ForwardItem>, Response = (), Error = BoxError> + Send + 'static,
        S::Future: Send,
        N: Service<Vec<Notification>, Response = (), Error = BoxError> + Send + 'static,
        N::Future: Send,
    {
        let config = self.config;

        let scan_config = config.logfile_receiver.build_config();
        scan_config.validate()?;
        let forwarder_config = config.forwarder.build_config();
        forwarder_config.validate()?;
        let shutdown_flush_timeout = forwarder_config.shutdown_flush_timeout;

        let mut receivers_task_set = JoinSet::new();
        let mut exporters_task_set = JoinSet::new();

        let receivers_cancel = CancellationToken::new();
        let exporters_cancel = CancellationToken::new();

        let forwarder = Arc::new(ResultForwarder::new(forwarder_config, sink));
        let forwarder_handle = forwarder.handle();

        let (notifications_tx, notifications_rx) =
            bounded::<Notification>(config.notification_queue_size);

        let matcher = PatternMatcher::new(scan_config.tail.max_line_length, self.run_window);
        let scanner = DirectoryScanner::new(
            scan_config.clone(),
            matcher,
            forwarder_handle.clone(),
            Box::new(notifications_tx),
        );
        let receiver = LogfileReceiver::new(
            scan_config,
            MonitorSource::File(config.monitors_file.clone()),
            scanner,
        )?;

        {
            let token = exporters_cancel.clone();
            exporters_task_set.spawn(async move {
                let res = forwarder.run(token).await;
                if let Err(ref e) = res {
                    error!(error = %e, "Result forwarder failed");
                }
                res
            });
        }
        {
            let token = exporters_cancel.clone();
            let mut exporter = NotificationExporter::new(notifications_rx, notification_sink);
            exporters_task_set.spawn(async move { exporter.start(token).await });
        }

        receiver
            .start(&mut receivers_task_set, &receivers_cancel)
            .await?;

        let mut drain_requests = self.drain_requests;
        let mut result = Ok(());
        loop {
            select! {
                _ = agent_cancel.cancelled() => {
                    debug!("Agent cancellation signaled.");
                    break;
                },
                Some(()) = next_drain_request(&mut drain_requests) => {
                    info!(queue_len = forwarder_handle.len(), "Drain requested");
                    forwarder_handle.request_drain();
                },
                e = wait::wait_for_any_task(&mut receivers_task_set) => {
                    match e {
                        Ok(()) => info!("Unexpected early exit of receiver."),
                        Err(e) => result = Err(e),
                    }
                    break;
                },
                e = wait::wait_for_any_task(&mut exporters_task_set) => {
                    match e {
                        Ok(()) => warn!("Unexpected early exit of task."),
                        Err(e) => result = Err(e),
                    }
                    break;
                },
            }
        }
        result?;

        // Step one, stop scanning so nothing new is queued.
        receivers_cancel.cancel();
        let res =
            wait::wait_for_tasks_with_timeout(&mut receivers_task_set, Duration::from_secs(1))
                .await;
        if let Err(e) = res {
            return Err(format!("timed out waiting for receiver exit: {}", e).into());
        }

        // Then let the forwarder flush what is left.
        exporters_cancel.cancel();
        let res = wait::wait_for_tasks_with_timeout(
            &mut exporters_task_set,
            shutdown_flush_timeout + EXPORTERS_EXIT_GRACE,
        )
        .await;
        if let Err(e) = res {
            return Err(format!("timed out waiting for exporters to exit: {}", e).into());
        }

        Ok(())
    }
}

async fn next_drain_request(rx: &mut Option<BoundedReceiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.next().await,
        None => std::future::pending().await,
    }
}
