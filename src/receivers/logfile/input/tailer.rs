// SPDX-License-Identifier: Apache-2.0

//! Incremental tailing of a single file.
//!
//! All mutable per-file state lives in [`TailerState`], which the caller
//! hands to [`FileTailer::poll`] and stores again from the returned
//! [`PollOutcome`]. The tailer itself only carries configuration.

use encoding_rs::Encoding;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::decoder::{Assembled, LineAssembler};
use super::header::HeaderPrefix;
use crate::receivers::logfile::config::{LineSeparator, TailConfig};
use crate::receivers::logfile::notification::{Notification, NotificationKind};

/// Conditions already reported in the current episode. A flag is cleared
/// once the condition is observed to be over.
#[derive(Debug, Default, Clone, Copy)]
struct Reported {
    not_found: bool,
    permission_denied: bool,
    open_failed: bool,
    too_large: bool,
    read_failed: bool,
    carry_over_truncated: bool,
}

/// Read position and bookkeeping for one tracked file
#[derive(Debug)]
pub struct TailerState {
    path: PathBuf,
    handle: Option<File>,
    known_len: u64,
    unchanged_ticks: u32,
    last_header_check: Option<Instant>,
    carry_over: Vec<u8>,
    open_attempted: bool,
    opened_ever: bool,
    read_from_top: bool,
    reopen_from_top: bool,
    reported: Reported,
}

impl TailerState {
    /// `read_from_top` selects offset 0 for the first successful open,
    /// otherwise the file is picked up at its current end.
    pub fn new(path: impl Into<PathBuf>, read_from_top: bool) -> Self {
        Self {
            path: path.into(),
            handle: None,
            known_len: 0,
            unchanged_ticks: 0,
            last_header_check: None,
            carry_over: Vec::new(),
            open_attempted: false,
            opened_ever: false,
            read_from_top,
            reopen_from_top: false,
            reported: Reported::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn known_len(&self) -> u64 {
        self.known_len
    }

    pub fn carry_over_len(&self) -> usize {
        self.carry_over.len()
    }

    pub fn open_attempted(&self) -> bool {
        self.open_attempted
    }

    pub fn opened_ever(&self) -> bool {
        self.opened_ever
    }

    /// Release the file handle. Position bookkeeping is kept.
    pub fn close(&mut self) {
        self.handle = None;
    }

    fn handle_len(&self) -> io::Result<u64> {
        match &self.handle {
            Some(file) => Ok(file.metadata()?.len()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no open handle")),
        }
    }
}

/// Everything a poll produced
#[derive(Debug)]
pub struct PollOutcome {
    pub state: TailerState,
    pub lines: Vec<String>,
    pub notifications: Vec<Notification>,
}

#[derive(Default)]
struct Collected {
    lines: Vec<String>,
    notifications: Vec<Notification>,
}

/// Produces newly appended lines of one file, surviving truncation and
/// rotation.
#[derive(Debug, Clone)]
pub struct FileTailer {
    monitor_id: String,
    config: TailConfig,
    assembler: LineAssembler,
}

impl FileTailer {
    pub fn new(
        monitor_id: impl Into<String>,
        config: TailConfig,
        encoding: &'static Encoding,
        separator: LineSeparator,
    ) -> Self {
        let assembler = LineAssembler::new(encoding, separator, config.max_line_length);
        Self {
            monitor_id: monitor_id.into(),
            config,
            assembler,
        }
    }

    pub fn monitor_id(&self) -> &str {
        &self.monitor_id
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.assembler.encoding()
    }

    pub fn separator(&self) -> LineSeparator {
        self.assembler.separator()
    }

    pub fn poll(&self, mut state: TailerState, now: Instant) -> PollOutcome {
        let mut collected = Collected::default();
        self.step(&mut state, now, &mut collected);

        PollOutcome {
            state,
            lines: collected.lines,
            notifications: collected.notifications,
        }
    }

    fn step(&self, state: &mut TailerState, now: Instant, out: &mut Collected) {
        if state.handle.is_none() {
            let from_top =
                state.reopen_from_top || (state.read_from_top && !state.opened_ever);
            if !self.open(state, from_top, out) {
                return;
            }
        }

        let mut len = match state.handle_len() {
            Ok(len) => len,
            Err(e) => {
                self.read_failure(state, &e, out);
                return;
            }
        };

        if len == state.known_len {
            state.unchanged_ticks += 1;
            if state.unchanged_ticks < self.config.unchanged_ticks_before_rotation_check {
                return;
            }
            state.unchanged_ticks = 0;

            if !self.rotated(state, len, now) {
                return;
            }

            // The file may have grown between the two length reads.
            match state.handle_len() {
                Ok(current) if current == len => {
                    info!(path = ?state.path, "Log file changed, reading replacement from the start");
                    state.close();
                    state.carry_over.clear();
                    state.known_len = 0;
                    // Kept until an open succeeds, the replacement may not exist yet
                    state.reopen_from_top = true;
                    if !self.open(state, true, out) {
                        return;
                    }
                    len = match state.handle_len() {
                        Ok(len) => len,
                        Err(e) => {
                            self.read_failure(state, &e, out);
                            return;
                        }
                    };
                }
                Ok(current) => len = current,
                Err(e) => {
                    self.read_failure(state, &e, out);
                    return;
                }
            }
        }
        state.unchanged_ticks = 0;

        if len > state.known_len {
            self.extract(state, out);
        } else if len < state.known_len {
            info!(path = ?state.path, known_len = state.known_len, len, "Log file shrank, reading from the start");
            if let Some(file) = state.handle.as_mut() {
                if let Err(e) = file.seek(SeekFrom::Start(0)) {
                    self.read_failure(state, &e, out);
                    return;
                }
            }
            state.known_len = 0;
            state.carry_over.clear();
        }
    }

    /// Open the path, positioning at 0 or at the current end. Failures raise
    /// one notification per episode and leave the state unopened.
    fn open(&self, state: &mut TailerState, from_top: bool, out: &mut Collected) -> bool {
        debug!(path = ?state.path, from_top, "Opening log file");
        state.open_attempted = true;

        let mut file = match File::open(&state.path) {
            Ok(file) => file,
            Err(e) => {
                self.open_failure(state, &e, out);
                return false;
            }
        };

        let len = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.read_failure(state, &e, out);
                return false;
            }
        };

        if len > self.config.max_file_size {
            if !state.reported.too_large {
                info!(path = ?state.path, size = len, limit = self.config.max_file_size, "Log file exceeds the size limit");
                out.notifications.push(self.notification(
                    NotificationKind::FileTooLarge,
                    &state.path,
                    Some(format!("size {} bytes", len)),
                ));
                state.reported.too_large = true;
            }
        } else {
            state.reported.too_large = false;
        }

        let start = if from_top { 0 } else { len };
        if let Err(e) = file.seek(SeekFrom::Start(start)) {
            self.read_failure(state, &e, out);
            return false;
        }

        state.handle = Some(file);
        state.known_len = start;
        state.unchanged_ticks = 0;
        state.opened_ever = true;
        state.reopen_from_top = false;
        state.reported.not_found = false;
        state.reported.permission_denied = false;
        state.reported.open_failed = false;
        state.reported.read_failed = false;
        true
    }

    fn open_failure(&self, state: &mut TailerState, e: &io::Error, out: &mut Collected) {
        let (kind, reported) = match e.kind() {
            io::ErrorKind::NotFound => (
                NotificationKind::FileNotFound,
                &mut state.reported.not_found,
            ),
            io::ErrorKind::PermissionDenied => (
                NotificationKind::PermissionDenied,
                &mut state.reported.permission_denied,
            ),
            _ => (
                NotificationKind::ReadFailure,
                &mut state.reported.open_failed,
            ),
        };

        if *reported {
            debug!(path = ?state.path, error = %e, "Log file still cannot be opened");
            return;
        }
        *reported = true;

        match kind {
            NotificationKind::FileNotFound => {
                info!(path = ?state.path, "Log file not found")
            }
            _ => warn!(path = ?state.path, error = %e, "Unable to open log file"),
        }

        let detail = match kind {
            NotificationKind::FileNotFound => None,
            _ => Some(e.to_string()),
        };
        out.notifications
            .push(self.notification(kind, &state.path, detail));
    }

    /// A length or position failure on the open handle closes it.
    fn read_failure(&self, state: &mut TailerState, e: &io::Error, out: &mut Collected) {
        if !state.reported.read_failed {
            warn!(path = ?state.path, error = %e, "Failed to read log file, closing it");
            out.notifications.push(self.notification(
                NotificationKind::ReadFailure,
                &state.path,
                Some(e.to_string()),
            ));
            state.reported.read_failed = true;
        }
        state.close();
        state.carry_over.clear();
    }

    fn rotated(&self, state: &mut TailerState, len: u64, now: Instant) -> bool {
        // A missing path reads as an empty file.
        let path_len = fs::metadata(&state.path).map(|m| m.len()).unwrap_or(0);
        if path_len != len {
            debug!(path = ?state.path, handle_len = len, path_len, "Length differs from the file on disk");
            return true;
        }

        let interval = self.config.header_check_interval;
        if len == 0 || interval.is_zero() {
            return false;
        }
        if let Some(last) = state.last_header_check {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }

        let result = self.header_differs(state);
        state.last_header_check = Some(now);

        match result {
            Ok(differs) => {
                if differs {
                    debug!(path = ?state.path, "Header of the file on disk differs from the open handle");
                }
                differs
            }
            Err(e) => {
                error!(path = ?state.path, error = %e, "Failed to compare log file headers");
                false
            }
        }
    }

    fn header_differs(&self, state: &mut TailerState) -> io::Result<bool> {
        let size = self.config.header_check_size;
        let current = match state.handle.as_mut() {
            Some(file) => HeaderPrefix::read_preserving_position(file, size)?,
            None => return Ok(false),
        };
        let on_disk = HeaderPrefix::read_path(&state.path, size)?;
        Ok(current != on_disk)
    }

    fn extract(&self, state: &mut TailerState, out: &mut Collected) {
        let snapshot = state.carry_over.clone();
        let mut lines = Vec::new();

        match self.read_chunks(state, &mut lines) {
            Ok(position) => {
                state.known_len = position;
                out.lines.append(&mut lines);
            }
            Err(e) => {
                warn!(path = ?state.path, error = %e, known_len = state.known_len, "Read interrupted, resuming from last confirmed length");
                state.carry_over = snapshot;
                if let Some(file) = state.handle.as_mut() {
                    if let Err(e) = file.seek(SeekFrom::Start(state.known_len)) {
                        error!(path = ?state.path, error = %e, "Failed to rewind log file");
                    }
                }
            }
        }
    }

    /// Reads to end of file and returns the position reached.
    fn read_chunks(&self, state: &mut TailerState, lines: &mut Vec<String>) -> io::Result<u64> {
        let file = match state.handle.as_mut() {
            Some(file) => file,
            None => return Ok(state.known_len),
        };

        let mut buf = vec![0u8; self.config.read_chunk_size];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => return file.stream_position(),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            match self.assembler.push(&mut state.carry_over, &buf[..n]) {
                Assembled::Pending { truncated } => {
                    if truncated && !state.reported.carry_over_truncated {
                        info!(
                            path = ?state.path,
                            limit = self.config.max_line_length,
                            "Line exceeds the length limit, truncating"
                        );
                        state.reported.carry_over_truncated = true;
                    }
                }
                Assembled::Lines(mut decoded) => {
                    state.reported.carry_over_truncated = false;
                    lines.append(&mut decoded);
                }
                Assembled::Undecodable { bytes } => {
                    state.reported.carry_over_truncated = false;
                    error!(
                        path = ?state.path,
                        encoding = self.assembler.encoding().name(),
                        bytes,
                        "Unable to decode lines, skipping them"
                    );
                }
            }
        }
    }

    fn notification(
        &self,
        kind: NotificationKind,
        path: &Path,
        detail: Option<String>,
    ) -> Notification {
        Notification::new(kind, &self.monitor_id, path, detail)
    }
}
