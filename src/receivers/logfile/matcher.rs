// SPDX-License-Identifier: Apache-2.0

//! Ordered rule evaluation for extracted lines.

use gethostname::gethostname;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::monitor::{MatchRule, MonitorSpec, RuleAction};
use crate::exporters::forwarder::{ForwardItem, now_millis};

/// Decides whether a monitor's run window is currently open. Calendar
/// evaluation lives outside this crate.
pub trait RunWindow: Send + Sync {
    fn is_open(&self, window_ref: &str) -> bool;
}

/// Run window that never closes
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOpen;

impl RunWindow for AlwaysOpen {
    fn is_open(&self, _window_ref: &str) -> bool {
        true
    }
}

struct CompiledRule {
    rule_id: String,
    // None when the pattern failed to compile
    regex: Option<Regex>,
    enabled: bool,
    action: RuleAction,
}

struct CompiledMonitor {
    enabled: bool,
    run_window_ref: Option<String>,
    rules: Vec<CompiledRule>,
}

/// Strip carriage returns, then cut to at most `limit` characters.
pub fn format_line(line: &str, limit: usize) -> String {
    let line = line.replace('\r', "");
    match line.char_indices().nth(limit) {
        Some((idx, _)) => {
            debug!(limit, "Line is too long, truncating message");
            line[..idx].to_string()
        }
        None => line,
    }
}

pub struct PatternMatcher {
    host: String,
    message_limit: usize,
    run_window: Arc<dyn RunWindow>,
    monitors: HashMap<String, CompiledMonitor>,
}

impl PatternMatcher {
    pub fn new(message_limit: usize, run_window: Arc<dyn RunWindow>) -> Self {
        Self {
            host: gethostname().to_string_lossy().into_owned(),
            message_limit,
            run_window,
            monitors: HashMap::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Replace all compiled monitors. Rules are ordered by their ordinal,
    /// patterns that fail to compile are reported once here and skipped
    /// during evaluation.
    pub fn load(&mut self, specs: &[MonitorSpec]) {
        self.monitors = specs
            .iter()
            .map(|spec| (spec.id.clone(), compile_monitor(spec)))
            .collect();
    }

    /// Evaluate one line for a monitor. Returns the item to forward when the
    /// first matching rule emits.
    pub fn evaluate(
        &self,
        monitor_id: &str,
        line: &str,
        file_path: Option<&Path>,
        timestamp: Option<i64>,
    ) -> Option<ForwardItem> {
        let monitor = match self.monitors.get(monitor_id) {
            Some(monitor) => monitor,
            None => {
                debug!(monitor_id, "No rules loaded for monitor");
                return None;
            }
        };

        if !monitor.enabled {
            return None;
        }
        if let Some(window) = &monitor.run_window_ref {
            if !self.run_window.is_open(window) {
                debug!(monitor_id, window = %window, "Run window closed, skipping line");
                return None;
            }
        }

        let message = format_line(line, self.message_limit);

        for rule in monitor.rules.iter().filter(|r| r.enabled) {
            let regex = match &rule.regex {
                Some(regex) => regex,
                None => continue,
            };
            if !regex.is_match(&message) {
                continue;
            }

            debug!(monitor_id, rule_id = %rule.rule_id, "Line matched rule");
            return match rule.action {
                RuleAction::Emit => Some(ForwardItem {
                    message,
                    raw_line: line.to_string(),
                    generation_timestamp: timestamp.unwrap_or_else(now_millis),
                    host: self.host.clone(),
                    monitor_id: monitor_id.to_string(),
                    rule_id: rule.rule_id.clone(),
                    file_path: file_path.map(Path::to_path_buf),
                }),
                RuleAction::Discard => None,
            };
        }

        None
    }
}

fn compile_monitor(spec: &MonitorSpec) -> CompiledMonitor {
    let mut rules: Vec<&MatchRule> = spec.rules.iter().collect();
    rules.sort_by_key(|r| r.order);

    let rules = rules
        .into_iter()
        .map(|rule| {
            let rule_id = rule.rule_id(&spec.id);
            let regex = match rule.compile() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(monitor_id = %spec.id, rule_id = %rule_id, error = %e, "Invalid rule pattern, skipping rule");
                    None
                }
            };
            CompiledRule {
                rule_id,
                regex,
                enabled: rule.enabled,
                action: rule.action,
            }
        })
        .collect();

    CompiledMonitor {
        enabled: spec.enabled,
        run_window_ref: spec.run_window_ref.clone(),
        rules,
    }
}
