// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// One matched event destined for the remote collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardItem {
    /// Line after carriage returns were stripped and length was limited
    pub message: String,
    pub raw_line: String,
    /// Epoch milliseconds
    pub generation_timestamp: i64,
    pub host: String,
    pub monitor_id: String,
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let item = ForwardItem {
            message: "m".to_string(),
            raw_line: "m\r".to_string(),
            generation_timestamp: 1_700_000_000_000,
            host: "host-a".to_string(),
            monitor_id: "mon".to_string(),
            rule_id: "mon#1".to_string(),
            file_path: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["rawLine"], "m\r");
        assert_eq!(json["generationTimestamp"], 1_700_000_000_000i64);
        assert_eq!(json["monitorId"], "mon");
        assert_eq!(json["ruleId"], "mon#1");
        assert!(json.get("filePath").is_none());
    }

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }
}
