// SPDX-License-Identifier: Apache-2.0

//! Log file monitoring: directory scanning, incremental tailing and rule
//! matching for text log files.

pub mod config;
pub mod error;
pub mod input;
pub mod matcher;
pub mod monitor;
pub mod notification;
pub mod receiver;
pub mod scanner;

pub use config::{LineSeparator, ScanConfig, TailConfig};
pub use error::{Error, Result};
pub use matcher::{AlwaysOpen, PatternMatcher, RunWindow, format_line};
pub use monitor::{MatchRule, MonitorSpec, RuleAction, load_monitors};
pub use notification::{Notification, NotificationKind, NotificationSink, Priority};
pub use receiver::{LogfileReceiver, MonitorSource};
pub use scanner::{CycleStats, DirectoryScanner, TailerKey};
