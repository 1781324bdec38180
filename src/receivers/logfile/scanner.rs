// SPDX-License-Identifier: Apache-2.0

//! Reconciles monitor configuration with the set of tailed files.
//!
//! Each cycle lists the directories of all enabled monitors, creates tailers
//! for newly matched files, refreshes existing ones in place, retires files
//! that no longer match and then polls every tracked file once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use regex::Regex;

use super::config::ScanConfig;
use super::input::{FileTailer, TailerState};
use super::matcher::PatternMatcher;
use super::monitor::MonitorSpec;
use super::notification::NotificationSink;
use crate::exporters::forwarder::ForwarderHandle;

/// Registry key of a tracked file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TailerKey {
    pub monitor_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternKey {
    directory: PathBuf,
    filename_pattern: String,
}

impl PatternKey {
    fn of(spec: &MonitorSpec) -> Self {
        Self {
            directory: spec.directory.clone(),
            filename_pattern: spec.filename_pattern.clone(),
        }
    }
}

struct TrackedFile {
    tailer: FileTailer,
    state: TailerState,
}

/// Counts from one scan cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub tracked: usize,
    pub skipped_files: usize,
    pub lines: usize,
    pub forwarded: usize,
}

pub struct DirectoryScanner {
    config: ScanConfig,
    specs: Vec<MonitorSpec>,
    matcher: PatternMatcher,
    forwarder: ForwarderHandle,
    notifications: Box<dyn NotificationSink>,
    registry: BTreeMap<TailerKey, TrackedFile>,
    last_patterns: HashSet<PatternKey>,
    directory_present: HashMap<String, bool>,
}

impl DirectoryScanner {
    pub fn new(
        config: ScanConfig,
        matcher: PatternMatcher,
        forwarder: ForwarderHandle,
        notifications: Box<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            specs: Vec::new(),
            matcher,
            forwarder,
            notifications,
            registry: BTreeMap::new(),
            last_patterns: HashSet::new(),
            directory_present: HashMap::new(),
        }
    }

    /// Replace the complete monitor set. Directory presence is remembered
    /// for monitors that survive, and sampled now for new ones.
    pub fn set_monitors(&mut self, specs: Vec<MonitorSpec>) {
        self.matcher.load(&specs);

        let mut present = HashMap::with_capacity(specs.len());
        for spec in specs.iter() {
            let exists = match self.directory_present.get(&spec.id) {
                Some(exists) => *exists,
                None => spec.directory.is_dir(),
            };
            present.insert(spec.id.clone(), exists);
        }
        self.directory_present = present;

        info!(
            monitors = ?specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "Monitor configuration updated"
        );
        self.specs = specs;
    }

    pub fn monitors(&self) -> &[MonitorSpec] {
        &self.specs
    }

    pub fn tracked_files(&self) -> usize {
        self.registry.len()
    }

    pub fn tracked_keys(&self) -> impl Iterator<Item = &TailerKey> {
        self.registry.keys()
    }

    pub fn run_cycle(&mut self, now: Instant) -> CycleStats {
        let skipped_files = self.reconcile();
        let (lines, forwarded) = self.poll_all(now);

        CycleStats {
            tracked: self.registry.len(),
            skipped_files,
            lines,
            forwarded,
        }
    }

    fn reconcile(&mut self) -> usize {
        let mut observed: HashSet<PatternKey> = HashSet::new();
        let mut active: HashSet<TailerKey> = HashSet::new();
        let mut remaining = self.config.max_files;
        let mut skipped = 0;

        for spec in self.specs.iter().filter(|s| s.enabled) {
            let pattern_key = PatternKey::of(spec);
            // Files that show up under a pattern scanned in the previous cycle
            // are new, so they are read from the top. At startup or for a new
            // pattern, existing files are backlog and tailed from the end.
            let mut read_from_top =
                self.last_patterns.contains(&pattern_key) && !observed.contains(&pattern_key);
            observed.insert(pattern_key);

            let regex = match spec.filename_regex() {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(monitor_id = %spec.id, pattern = %spec.filename_pattern, error = %e, "Invalid filename pattern, skipping monitor");
                    continue;
                }
            };
            let encoding = match spec.resolve_encoding() {
                Ok(encoding) => encoding,
                Err(e) => {
                    warn!(monitor_id = %spec.id, error = %e, "Skipping monitor");
                    continue;
                }
            };

            let exists = spec.directory.is_dir();
            let was_present = self
                .directory_present
                .insert(spec.id.clone(), exists)
                .unwrap_or(exists);
            if !exists {
                debug!(monitor_id = %spec.id, directory = ?spec.directory, "Monitored directory does not exist");
                continue;
            }
            if !was_present {
                info!(monitor_id = %spec.id, directory = ?spec.directory, "Monitored directory appeared, reading its files from the start");
                read_from_top = true;
            }

            let files = match list_matching_files(&spec.directory, &regex) {
                Ok(files) => files,
                Err(e) => {
                    warn!(monitor_id = %spec.id, directory = ?spec.directory, error = %e, "Failed to list monitored directory");
                    continue;
                }
            };

            for path in files {
                if remaining == 0 {
                    debug!(path = ?path, "Not monitoring file, too many files");
                    skipped += 1;
                    continue;
                }
                remaining -= 1;

                let key = TailerKey {
                    monitor_id: spec.id.clone(),
                    path,
                };
                let tailer = FileTailer::new(
                    spec.id.clone(),
                    self.config.tail.clone(),
                    encoding,
                    spec.line_separator,
                );

                match self.registry.get_mut(&key) {
                    Some(tracked) => tracked.tailer = tailer,
                    None => {
                        info!(monitor_id = %spec.id, path = ?key.path, read_from_top, "Tracking log file");
                        let state = TailerState::new(key.path.clone(), read_from_top);
                        self.registry
                            .insert(key.clone(), TrackedFile { tailer, state });
                    }
                }
                active.insert(key);
            }
        }

        if skipped > 0 {
            warn!(
                max_files = self.config.max_files,
                skipped, "Too many log files, some are not monitored"
            );
        }

        self.registry.retain(|key, tracked| {
            let keep = active.contains(key);
            if !keep {
                info!(monitor_id = %key.monitor_id, path = ?key.path, "Releasing log file");
                tracked.state.close();
            }
            keep
        });

        self.last_patterns = observed;
        skipped
    }

    fn poll_all(&mut self, now: Instant) -> (usize, usize) {
        let mut lines = 0;
        let mut forwarded = 0;

        let registry = std::mem::take(&mut self.registry);
        for (key, TrackedFile { tailer, state }) in registry {
            let outcome = tailer.poll(state, now);

            for notification in outcome.notifications {
                self.notifications.notify(notification);
            }

            lines += outcome.lines.len();
            for line in outcome.lines.iter() {
                let item = match self
                    .matcher
                    .evaluate(&key.monitor_id, line, Some(&key.path), None)
                {
                    Some(item) => item,
                    None => continue,
                };
                if self.forwarder.enqueue(item).is_ok() {
                    forwarded += 1;
                }
            }

            self.registry.insert(
                key,
                TrackedFile {
                    tailer,
                    state: outcome.state,
                },
            );
        }

        (lines, forwarded)
    }
}

/// Absolute paths of regular files in `directory` whose name fully matches.
fn list_matching_files(directory: &Path, regex: &Regex) -> io::Result<Vec<PathBuf>> {
    let directory = path::absolute(directory)?;
    let mut files = Vec::new();

    for entry in fs::read_dir(&directory)? {
        let entry = entry?;
        let path = entry.path();
        // Follows symlinks
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if regex.is_match(&name.to_string_lossy()) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::{BoundedReceiver, bounded};
    use crate::exporters::forwarder::test_util::ScriptedSink;
    use crate::exporters::forwarder::{ForwarderConfig, ResultForwarder};
    use crate::receivers::logfile::matcher::AlwaysOpen;
    use crate::receivers::logfile::monitor::MatchRule;
    use crate::receivers::logfile::notification::Notification;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Harness {
        scanner: DirectoryScanner,
        forwarder: ResultForwarder<ScriptedSink>,
        sink: ScriptedSink,
        _notifications: BoundedReceiver<Notification>,
    }

    impl Harness {
        fn new(config: ScanConfig) -> Self {
            let sink = ScriptedSink::default();
            let forwarder = ResultForwarder::new(
                ForwarderConfig::default()
                    .with_eager_drain_every(None)
                    .with_drain_interval(None),
                sink.clone(),
            );
            let (tx, rx) = bounded(16);
            let matcher = PatternMatcher::new(1024, Arc::new(AlwaysOpen)).with_host("h");
            let scanner = DirectoryScanner::new(config, matcher, forwarder.handle(), Box::new(tx));
            Self {
                scanner,
                forwarder,
                sink,
                _notifications: rx,
            }
        }

        async fn cycle(&mut self) -> Vec<String> {
            let already = self.sink.delivered().len();
            self.scanner.run_cycle(Instant::now());
            self.forwarder.drain().await;
            self.sink.delivered()[already..]
                .iter()
                .map(|i| i.message.clone())
                .collect()
        }
    }

    fn spec(dir: &Path) -> MonitorSpec {
        MonitorSpec::new("mon", dir, "app-.*\\.log").with_rule(MatchRule::new(".*", 0))
    }

    fn append(path: &Path, data: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_startup_tails_existing_files_from_end() {
        let dir = TempDir::new().unwrap();
        append(&dir.path().join("app-1.log"), "backlog\n");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![spec(dir.path())]);

        assert!(h.cycle().await.is_empty());
        assert_eq!(h.scanner.tracked_files(), 1);

        append(&dir.path().join("app-1.log"), "fresh\n");
        assert_eq!(h.cycle().await, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_new_file_under_known_pattern_read_from_top() {
        let dir = TempDir::new().unwrap();
        append(&dir.path().join("app-1.log"), "backlog\n");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![spec(dir.path())]);
        h.cycle().await;

        append(&dir.path().join("app-2.log"), "first\nsecond\n");
        assert_eq!(
            h.cycle().await,
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(h.scanner.tracked_files(), 2);
    }

    #[tokio::test]
    async fn test_directory_appearing_later_is_read_from_top() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("later");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![spec(&dir)]);
        assert!(h.cycle().await.is_empty());
        assert_eq!(h.scanner.tracked_files(), 0);

        fs::create_dir(&dir).unwrap();
        append(&dir.join("app-1.log"), "initial content\n");
        assert_eq!(h.cycle().await, vec!["initial content".to_string()]);
    }

    #[tokio::test]
    async fn test_unmatched_and_removed_files_are_retired() {
        let dir = TempDir::new().unwrap();
        append(&dir.path().join("app-1.log"), "a\n");
        append(&dir.path().join("other.txt"), "b\n");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![spec(dir.path())]);
        h.cycle().await;
        assert_eq!(h.scanner.tracked_files(), 1);

        fs::remove_file(dir.path().join("app-1.log")).unwrap();
        h.cycle().await;
        assert_eq!(h.scanner.tracked_files(), 0);
    }

    #[tokio::test]
    async fn test_disabled_monitor_releases_files() {
        let dir = TempDir::new().unwrap();
        append(&dir.path().join("app-1.log"), "a\n");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![spec(dir.path())]);
        h.cycle().await;
        assert_eq!(h.scanner.tracked_files(), 1);

        h.scanner.set_monitors(vec![spec(dir.path()).disabled()]);
        h.cycle().await;
        assert_eq!(h.scanner.tracked_files(), 0);
    }

    #[tokio::test]
    async fn test_file_cap_across_monitors() {
        let dir = TempDir::new().unwrap();
        for n in 0..3 {
            append(&dir.path().join(format!("app-{}.log", n)), "x\n");
        }
        let other = MonitorSpec::new("other", dir.path(), "app-0\\.log");

        let mut h = Harness::new(ScanConfig::default().with_max_files(2));
        h.scanner.set_monitors(vec![spec(dir.path()), other]);

        let stats = h.scanner.run_cycle(Instant::now());
        assert_eq!(stats.tracked, 2);
        assert_eq!(stats.skipped_files, 2);
    }

    #[tokio::test]
    async fn test_reconfiguration_keeps_read_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app-1.log");
        append(&path, "old\n");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![spec(dir.path())]);
        h.cycle().await;
        append(&path, "one\n");
        assert_eq!(h.cycle().await, vec!["one".to_string()]);

        let updated = MonitorSpec::new("mon", dir.path(), "app-.*\\.log")
            .with_rule(MatchRule::new("t.*", 0));
        h.scanner.set_monitors(vec![updated]);
        append(&path, "one more\ntwo\n");
        assert_eq!(h.cycle().await, vec!["two".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_monitor_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        append(&dir.path().join("app-1.log"), "a\n");
        let broken = MonitorSpec::new("broken", dir.path(), "(");

        let mut h = Harness::new(ScanConfig::default());
        h.scanner.set_monitors(vec![broken, spec(dir.path())]);
        h.cycle().await;
        assert_eq!(h.scanner.tracked_files(), 1);
        assert_eq!(
            h.scanner.tracked_keys().next().unwrap().monitor_id,
            "mon".to_string()
        );
    }
}
