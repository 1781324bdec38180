// SPDX-License-Identifier: Apache-2.0

//! Tunables for tailing and scanning log files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of bytes read from a file per chunk
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default number of unchanged polls before rotation detection runs
pub const DEFAULT_UNCHANGED_TICKS: u32 = 1;

/// Default minimum interval between header comparisons (seconds)
pub const DEFAULT_HEADER_CHECK_INTERVAL_SECS: u64 = 300;

/// Default number of leading bytes compared during the header check
pub const DEFAULT_HEADER_CHECK_SIZE: usize = 256;

/// Default file size above which a notification is raised on open (2 GiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2_147_483_648;

/// Default limit for a single line, applied to the carry-over buffer (bytes)
/// and to the emitted message (characters)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Default delay between scan cycles (seconds)
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 10;

/// Default cap on the number of files tracked across all monitors
pub const DEFAULT_MAX_FILES: usize = 500;

/// Byte that terminates a line in a monitored file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineSeparator {
    Cr,
    #[default]
    Lf,
}

impl LineSeparator {
    pub fn byte(self) -> u8 {
        match self {
            LineSeparator::Cr => b'\r',
            LineSeparator::Lf => b'\n',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineSeparator::Cr => "\r",
            LineSeparator::Lf => "\n",
        }
    }
}

impl fmt::Display for LineSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSeparator::Cr => write!(f, "CR"),
            LineSeparator::Lf => write!(f, "LF"),
        }
    }
}

impl FromStr for LineSeparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CR" => Ok(LineSeparator::Cr),
            "LF" => Ok(LineSeparator::Lf),
            _ => Err(format!("Unknown line separator: {}", s)),
        }
    }
}

/// Per-file tailing behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    /// Bytes read per chunk while extracting lines
    pub read_chunk_size: usize,
    /// Consecutive unchanged polls before rotation detection runs
    pub unchanged_ticks_before_rotation_check: u32,
    /// Minimum time between header comparisons, zero disables them
    pub header_check_interval: Duration,
    /// Number of leading bytes compared
    pub header_check_size: usize,
    /// Size above which a file-too-large notification is raised on open
    pub max_file_size: u64,
    /// Limit for the carry-over buffer and for emitted messages
    pub max_line_length: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            unchanged_ticks_before_rotation_check: DEFAULT_UNCHANGED_TICKS,
            header_check_interval: Duration::from_secs(DEFAULT_HEADER_CHECK_INTERVAL_SECS),
            header_check_size: DEFAULT_HEADER_CHECK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl TailConfig {
    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }

    pub fn with_header_check_interval(mut self, interval: Duration) -> Self {
        self.header_check_interval = interval;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.read_chunk_size == 0 {
            return Err("Read chunk size must be at least 1, got 0".to_string());
        }
        if self.header_check_size == 0 {
            return Err("Header check size must be at least 1, got 0".to_string());
        }
        if self.max_line_length == 0 {
            return Err("Max line length must be at least 1, got 0".to_string());
        }
        Ok(())
    }
}

/// Directory scanning behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Delay between the end of one cycle and the start of the next
    pub scan_interval: Duration,
    /// Maximum number of files processed per cycle across all monitors
    pub max_files: usize,
    pub tail: TailConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            max_files: DEFAULT_MAX_FILES,
            tail: TailConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_tail(mut self, tail: TailConfig) -> Self {
        self.tail = tail;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.scan_interval < Duration::from_millis(10) {
            return Err(format!(
                "Scan interval must be at least 10ms, got {:?}",
                self.scan_interval
            ));
        }
        if self.max_files == 0 {
            return Err("Max files must be at least 1, got 0".to_string());
        }
        self.tail.validate()
    }
}
