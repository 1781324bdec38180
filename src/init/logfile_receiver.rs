// SPDX-License-Identifier: Apache-2.0

use crate::init::parse;
use crate::receivers::logfile::{ScanConfig, TailConfig};
use clap::Args;
use std::time::Duration;

#[derive(Debug, Args, Clone, Default)]
pub struct LogfileReceiverArgs {
    /// Delay between scan cycles (default: 10s)
    #[arg(long, env = "LOGMON_SCAN_INTERVAL", value_parser = parse::parse_duration)]
    pub logfile_scan_interval: Option<Duration>,

    /// Maximum number of files tailed across all monitors (default: 500)
    #[arg(long, env = "LOGMON_MAX_FILES")]
    pub logfile_max_files: Option<usize>,

    /// Bytes read per chunk (default: 1024)
    #[arg(long, env = "LOGMON_READ_CHUNK_SIZE")]
    pub logfile_read_chunk_size: Option<usize>,

    /// Unchanged polls before rotation is checked (default: 1)
    #[arg(long, env = "LOGMON_UNCHANGED_TICKS")]
    pub logfile_unchanged_ticks: Option<u32>,

    /// Minimum time between header comparisons, 0s disables them (default: 5m)
    #[arg(long, env = "LOGMON_HEADER_CHECK_INTERVAL", value_parser = parse::parse_duration)]
    pub logfile_header_check_interval: Option<Duration>,

    /// Number of leading bytes compared for rotation (default: 256)
    #[arg(long, env = "LOGMON_HEADER_CHECK_SIZE")]
    pub logfile_header_check_size: Option<usize>,

    /// File size in bytes above which a notification is raised (default: 2 GiB)
    #[arg(long, env = "LOGMON_MAX_FILE_SIZE")]
    pub logfile_max_file_size: Option<u64>,

    /// Maximum line length kept and forwarded (default: 1024)
    #[arg(long, env = "LOGMON_MAX_LINE_LENGTH")]
    pub logfile_max_line_length: Option<usize>,
}

impl LogfileReceiverArgs {
    pub fn build_config(&self) -> ScanConfig {
        let mut tail = TailConfig::default();
        if let Some(size) = self.logfile_read_chunk_size {
            tail = tail.with_read_chunk_size(size);
        }
        if let Some(ticks) = self.logfile_unchanged_ticks {
            tail.unchanged_ticks_before_rotation_check = ticks;
        }
        if let Some(interval) = self.logfile_header_check_interval {
            tail = tail.with_header_check_interval(interval);
        }
        if let Some(size) = self.logfile_header_check_size {
            tail.header_check_size = size;
        }
        if let Some(size) = self.logfile_max_file_size {
            tail = tail.with_max_file_size(size);
        }
        if let Some(len) = self.logfile_max_line_length {
            tail = tail.with_max_line_length(len);
        }

        let mut config = ScanConfig::default().with_tail(tail);
        if let Some(interval) = self.logfile_scan_interval {
            config.scan_interval = interval;
        }
        if let Some(max_files) = self.logfile_max_files {
            config = config.with_max_files(max_files);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogfileReceiverArgs::default().build_config();
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = LogfileReceiverArgs {
            logfile_scan_interval: Some(Duration::from_secs(2)),
            logfile_max_files: Some(10),
            logfile_header_check_interval: Some(Duration::ZERO),
            logfile_max_line_length: Some(80),
            ..Default::default()
        };
        let config = args.build_config();
        assert_eq!(config.scan_interval, Duration::from_secs(2));
        assert_eq!(config.max_files, 10);
        assert!(config.tail.header_check_interval.is_zero());
        assert_eq!(config.tail.max_line_length, 80);
        assert_eq!(config.tail.read_chunk_size, 1024);
    }
}
