// SPDX-License-Identifier: Apache-2.0

//! Drives the directory scanner on a fixed-delay schedule.
//!
//! Each tick moves the scanner onto the blocking pool, runs exactly one cycle
//! and takes it back before waiting for the next tick, so cycles never
//! overlap and the async runtime never blocks on file IO.

use std::path::PathBuf;
use std::time::{Instant, SystemTime};
use tokio::select;
use tokio::task::{JoinSet, spawn_blocking};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, error, info, warn};

use super::config::ScanConfig;
use super::error::{Error, Result};
use super::monitor::{MonitorSpec, load_monitors};
use super::scanner::DirectoryScanner;

/// Where the monitor set comes from
#[derive(Debug, Clone)]
pub enum MonitorSource {
    /// A fixed set supplied at startup
    Static(Vec<MonitorSpec>),
    /// A JSON document, reloaded whenever its modification time changes
    File(PathBuf),
}

struct MonitorsFile {
    path: PathBuf,
    modified: Option<SystemTime>,
    failing: bool,
}

impl MonitorsFile {
    /// Reload the monitor set into the scanner if the file changed. A file
    /// that cannot be read or parsed leaves the current set in place.
    fn refresh(&mut self, scanner: &mut DirectoryScanner) {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                if !self.failing {
                    warn!(path = ?self.path, error = %e, "Unable to check monitors file, keeping current monitors");
                    self.failing = true;
                }
                return;
            }
        };
        if self.modified == Some(modified) {
            return;
        }

        match load_monitors(&self.path) {
            Ok(specs) => {
                info!(path = ?self.path, monitors = specs.len(), "Reloaded monitors file");
                scanner.set_monitors(specs);
                self.modified = Some(modified);
                self.failing = false;
            }
            Err(e) => {
                if !self.failing {
                    warn!(error = %e, "Invalid monitors file, keeping current monitors");
                    self.failing = true;
                }
            }
        }
    }
}

struct ScanLoop {
    scanner: DirectoryScanner,
    monitors_file: Option<MonitorsFile>,
}

impl ScanLoop {
    fn cycle(mut self) -> Self {
        if let Some(file) = self.monitors_file.as_mut() {
            file.refresh(&mut self.scanner);
        }

        let start = Instant::now();
        let stats = self.scanner.run_cycle(start);
        debug!(
            tracked = stats.tracked,
            lines = stats.lines,
            forwarded = stats.forwarded,
            duration = ?start.elapsed(),
            "Scan cycle complete"
        );
        self
    }
}

pub struct LogfileReceiver {
    config: ScanConfig,
    scan_loop: ScanLoop,
}

impl LogfileReceiver {
    pub fn new(
        config: ScanConfig,
        source: MonitorSource,
        mut scanner: DirectoryScanner,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let monitors_file = match source {
            MonitorSource::Static(specs) => {
                scanner.set_monitors(specs);
                None
            }
            MonitorSource::File(path) => {
                let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
                scanner.set_monitors(load_monitors(&path)?);
                Some(MonitorsFile {
                    path,
                    modified,
                    failing: false,
                })
            }
        };

        info!(
            scan_interval = ?config.scan_interval,
            max_files = config.max_files,
            monitors = scanner.monitors().len(),
            "Logfile receiver initialized"
        );

        Ok(Self {
            config,
            scan_loop: ScanLoop {
                scanner,
                monitors_file,
            },
        })
    }

    pub async fn start(
        self,
        task_set: &mut JoinSet<std::result::Result<(), BoxError>>,
        receivers_cancel: &CancellationToken,
    ) -> std::result::Result<(), BoxError> {
        let cancel = receivers_cancel.clone();

        task_set.spawn(async move {
            let result = self.run(cancel).await;
            if let Err(ref e) = result {
                error!("Logfile receiver error: {}", e);
            }
            result
        });

        Ok(())
    }

    pub async fn run(self, cancel: CancellationToken) -> std::result::Result<(), BoxError> {
        let mut ticker = interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut scan_loop = self.scan_loop;
        info!("Logfile receiver starting");

        loop {
            select! {
                _ = ticker.tick() => {},
                _ = cancel.cancelled() => break,
            }

            scan_loop = spawn_blocking(move || scan_loop.cycle()).await?;
        }

        info!(
            tracked = scan_loop.scanner.tracked_files(),
            "Logfile receiver stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;
    use crate::exporters::forwarder::{ForwarderConfig, ForwarderHandle, ResultForwarder};
    use crate::exporters::forwarder::test_util::ScriptedSink;
    use crate::receivers::logfile::matcher::{AlwaysOpen, PatternMatcher};
    use crate::receivers::logfile::monitor::MatchRule;
    use crate::receivers::logfile::notification::Notification;
    use crate::bounded_channel::BoundedReceiver;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_config() -> ScanConfig {
        ScanConfig {
            scan_interval: Duration::from_millis(20),
            ..ScanConfig::default()
        }
    }

    fn scanner() -> (
        DirectoryScanner,
        ResultForwarder<ScriptedSink>,
        BoundedReceiver<Notification>,
    ) {
        let forwarder = ResultForwarder::new(
            ForwarderConfig::default()
                .with_eager_drain_every(None)
                .with_drain_interval(None),
            ScriptedSink::default(),
        );
        let (tx, rx) = bounded(16);
        let matcher = PatternMatcher::new(1024, Arc::new(AlwaysOpen));
        let scanner = DirectoryScanner::new(fast_config(), matcher, forwarder.handle(), Box::new(tx));
        (scanner, forwarder, rx)
    }

    fn append(path: &Path, data: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    async fn wait_for_len(handle: &ForwarderHandle, len: usize) {
        for _ in 0..300 {
            if handle.len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} queued items, found {}", len, handle.len());
    }

    #[tokio::test]
    async fn test_receiver_forwards_appended_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app-1.log");
        append(&path, "existing\n");

        let (scanner, forwarder, _rx) = scanner();
        let handle = forwarder.handle();
        let spec = MonitorSpec::new("mon", dir.path(), "app-.*\\.log")
            .with_rule(MatchRule::new(".*ERROR.*", 0));
        let receiver =
            LogfileReceiver::new(fast_config(), MonitorSource::Static(vec![spec]), scanner)
                .unwrap();

        let cancel = CancellationToken::new();
        let mut task_set = JoinSet::new();
        receiver.start(&mut task_set, &cancel).await.unwrap();

        // Let the first cycle pick the file up at its end
        tokio::time::sleep(Duration::from_millis(100)).await;
        append(&path, "INFO fine\nERROR broken\n");
        wait_for_len(&handle, 1).await;

        cancel.cancel();
        task_set.join_next().await.unwrap().unwrap().unwrap();
        assert_eq!(handle.len(), 1);
    }

    #[tokio::test]
    async fn test_monitors_file_is_reloaded() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).unwrap();
        let monitors = dir.path().join("monitors.json");
        let document = |pattern: &str| {
            format!(
                r#"{{"monitors": [{{"id": "mon", "directory": "{}", "filenamePattern": "{}", "rules": [{{"pattern": ".*", "order": 0}}]}}]}}"#,
                logs.display(),
                pattern
            )
        };
        fs::write(&monitors, document("none\\\\.log")).unwrap();

        let (scanner, forwarder, _rx) = scanner();
        let handle = forwarder.handle();
        let receiver =
            LogfileReceiver::new(fast_config(), MonitorSource::File(monitors.clone()), scanner)
                .unwrap();
        assert_eq!(receiver.scan_loop.scanner.monitors()[0].filename_pattern, "none\\.log");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receiver.run(cancel.clone()));

        append(&logs.join("app.log"), "before\n");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.len(), 0);

        // Make sure the modification time moves on coarse filesystems
        tokio::time::sleep(Duration::from_millis(1100)).await;
        fs::write(&monitors, document("app\\\\.log")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        append(&logs.join("app.log"), "after\n");
        wait_for_len(&handle, 1).await;

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (scanner, _forwarder, _rx) = scanner();
        let config = ScanConfig::default().with_max_files(0);
        let result = LogfileReceiver::new(config, MonitorSource::Static(vec![]), scanner);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
