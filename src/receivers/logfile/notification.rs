// SPDX-License-Identifier: Apache-2.0

//! One-time operational notifications raised while tailing files.
//!
//! These travel to the event sink on a separate path from matched lines.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::bounded_channel::{BoundedSender, SendError};
use crate::exporters::forwarder::now_millis;

/// Message id for informational notifications
pub const MESSAGE_ID_INFO: &str = "001";

/// Message id for warning notifications
pub const MESSAGE_ID_WARNING: &str = "002";

/// Application name reported on every notification
pub const APPLICATION: &str = "logfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    FileNotFound,
    PermissionDenied,
    FileTooLarge,
    ReadFailure,
}

impl NotificationKind {
    pub fn priority(self) -> Priority {
        match self {
            NotificationKind::FileNotFound | NotificationKind::FileTooLarge => Priority::Info,
            NotificationKind::PermissionDenied | NotificationKind::ReadFailure => {
                Priority::Warning
            }
        }
    }

    pub fn message_id(self) -> &'static str {
        match self.priority() {
            Priority::Info => MESSAGE_ID_INFO,
            Priority::Warning => MESSAGE_ID_WARNING,
        }
    }

    fn message(self) -> &'static str {
        match self {
            NotificationKind::FileNotFound => "Log file was not found",
            NotificationKind::PermissionDenied => "Permission denied while opening log file",
            NotificationKind::FileTooLarge => "Log file size exceeds the limit",
            NotificationKind::ReadFailure => "Failed to read log file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub message_id: &'static str,
    pub priority: Priority,
    pub application: String,
    pub message: String,
    pub message_org: String,
    pub monitor_id: String,
    pub path: PathBuf,
    pub generation_timestamp: i64,
}

impl Notification {
    /// `detail` is appended to the original message, typically the OS error
    /// or the offending file size.
    pub fn new(
        kind: NotificationKind,
        monitor_id: &str,
        path: &Path,
        detail: Option<String>,
    ) -> Self {
        let mut message_org = format!("Log file \"{}\"", path.display());
        if let Some(detail) = detail {
            message_org.push_str(", ");
            message_org.push_str(&detail);
        }

        Self {
            kind,
            message_id: kind.message_id(),
            priority: kind.priority(),
            application: APPLICATION.to_string(),
            message: kind.message().to_string(),
            message_org,
            monitor_id: monitor_id.to_string(),
            path: path.to_path_buf(),
            generation_timestamp: now_millis(),
        }
    }
}

/// Receives notifications raised during a scan cycle. Must not block.
pub trait NotificationSink: Send {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for BoundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        match self.try_send(notification) {
            Ok(()) => {}
            Err(SendError::Full) => {
                warn!("Notification channel is full, dropping notification")
            }
            Err(SendError::Disconnected) => {
                warn!("Notification channel is closed, dropping notification")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;

    #[test]
    fn test_categories() {
        let n = Notification::new(
            NotificationKind::FileTooLarge,
            "mon",
            Path::new("/var/log/big.log"),
            Some("size 3000000000 bytes".to_string()),
        );
        assert_eq!(n.message_id, "001");
        assert_eq!(n.priority, Priority::Info);
        assert_eq!(n.application, "logfile");
        assert_eq!(
            n.message_org,
            "Log file \"/var/log/big.log\", size 3000000000 bytes"
        );

        let n = Notification::new(
            NotificationKind::PermissionDenied,
            "mon",
            Path::new("/x"),
            None,
        );
        assert_eq!(n.message_id, "002");
        assert_eq!(n.priority, Priority::Warning);
        assert_eq!(n.message_org, "Log file \"/x\"");
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (tx, rx) = bounded(1);
        let n = Notification::new(NotificationKind::ReadFailure, "m", Path::new("/a"), None);
        tx.notify(n.clone());
        tx.notify(n.clone());
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv(), Some(n));
    }
}
