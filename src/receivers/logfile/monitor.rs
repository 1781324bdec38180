// SPDX-License-Identifier: Apache-2.0

//! Monitoring configuration consumed by the scanner, tailers and matcher.

use encoding_rs::Encoding;
use figment::Figment;
use figment::providers::{Format, Json};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::config::LineSeparator;
use super::error::{Error, Result};

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_true() -> bool {
    true
}

/// What happens to a line once a rule matches it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Forward the line as a ForwardItem
    #[default]
    Emit,
    /// Consume the line silently, later rules are not evaluated
    Discard,
}

/// One ordered rule of a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRule {
    #[serde(default)]
    pub id: Option<String>,
    pub pattern: String,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub action: RuleAction,
}

impl MatchRule {
    pub fn new(pattern: impl Into<String>, order: i32) -> Self {
        Self {
            id: None,
            pattern: pattern.into(),
            case_sensitive: true,
            enabled: true,
            order,
            action: RuleAction::Emit,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    /// Identity reported on emitted items, derived from the owning monitor
    /// when the rule carries none.
    pub fn rule_id(&self, monitor_id: &str) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}#{}", monitor_id, self.order),
        }
    }

    /// Compiles the pattern for a full match where `.` also matches newlines.
    pub fn compile(&self) -> Result<Regex> {
        full_match_regex(&self.pattern, !self.case_sensitive)
    }
}

/// One monitoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSpec {
    pub id: String,
    pub directory: PathBuf,
    pub filename_pattern: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub line_separator: LineSeparator,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub run_window_ref: Option<String>,
    #[serde(default)]
    pub rules: Vec<MatchRule>,
}

impl MonitorSpec {
    pub fn new(
        id: impl Into<String>,
        directory: impl Into<PathBuf>,
        filename_pattern: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            directory: directory.into(),
            filename_pattern: filename_pattern.into(),
            encoding: default_encoding(),
            line_separator: LineSeparator::Lf,
            enabled: true,
            run_window_ref: None,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_line_separator(mut self, line_separator: LineSeparator) -> Self {
        self.line_separator = line_separator;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Filename regex, matched against the whole name without regard to case.
    pub fn filename_regex(&self) -> Result<Regex> {
        full_match_regex(&self.filename_pattern, true)
    }

    pub fn resolve_encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| Error::UnknownEncoding(self.encoding.clone()))
    }

    /// Checks everything a scan cycle would otherwise reject at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Config("Monitor id must not be empty".to_string()));
        }
        self.filename_regex()?;
        self.resolve_encoding()?;
        for rule in self.rules.iter() {
            rule.compile()?;
        }
        Ok(())
    }
}

fn full_match_regex(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
        .dot_matches_new_line(true)
        .case_insensitive(case_insensitive)
        .build()?;
    Ok(regex)
}

#[derive(Debug, Default, Deserialize)]
struct MonitorsDocument {
    #[serde(default)]
    monitors: Vec<MonitorSpec>,
}

/// Loads the complete set of monitors from a JSON document of the form
/// `{"monitors": [...]}`.
pub fn load_monitors(path: &Path) -> Result<Vec<MonitorSpec>> {
    if !path.is_file() {
        return Err(Error::MonitorsFile {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    let doc: MonitorsDocument = Figment::new()
        .merge(Json::file(path))
        .extract()
        .map_err(|e| Error::MonitorsFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(doc.monitors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_deserialize_defaults() {
        let spec: MonitorSpec = serde_json::from_str(
            r#"{
                "id": "mon-1",
                "directory": "/var/log/app",
                "filenamePattern": "app-.*\\.log",
                "rules": [{"pattern": ".*ERROR.*", "order": 2}]
            }"#,
        )
        .unwrap();

        assert_eq!(spec.encoding, "UTF-8");
        assert_eq!(spec.line_separator, LineSeparator::Lf);
        assert!(spec.enabled);
        assert!(spec.run_window_ref.is_none());
        let rule = &spec.rules[0];
        assert!(rule.case_sensitive);
        assert!(rule.enabled);
        assert_eq!(rule.action, RuleAction::Emit);
        assert_eq!(rule.rule_id("mon-1"), "mon-1#2");
    }

    #[test]
    fn test_deserialize_full_rule() {
        let rule: MatchRule = serde_json::from_str(
            r#"{"id": "r1", "pattern": "x", "caseSensitive": false, "enabled": false, "order": 1, "action": "discard"}"#,
        )
        .unwrap();
        assert_eq!(rule.rule_id("ignored"), "r1");
        assert!(!rule.case_sensitive);
        assert!(!rule.enabled);
        assert_eq!(rule.action, RuleAction::Discard);
    }

    #[test]
    fn test_filename_regex_full_match_ignores_case() {
        let spec = MonitorSpec::new("m", "/tmp", "app-.*\\.log");
        let re = spec.filename_regex().unwrap();
        assert!(re.is_match("app-1.log"));
        assert!(re.is_match("APP-1.LOG"));
        assert!(!re.is_match("app-1.log.gz"));
        assert!(!re.is_match("my-app-1.log"));
    }

    #[test]
    fn test_rule_regex_case_and_dotall() {
        let rule = MatchRule::new("start.*end", 0);
        let re = rule.compile().unwrap();
        assert!(re.is_match("start\nend"));
        assert!(!re.is_match("START end"));
        assert!(!re.is_match("start end trailing"));

        let re = rule.case_insensitive().compile().unwrap();
        assert!(re.is_match("START end"));
    }

    #[test]
    fn test_validate() {
        assert!(MonitorSpec::new("m", "/tmp", ".*").validate().is_ok());
        assert!(matches!(
            MonitorSpec::new("m", "/tmp", "(").validate(),
            Err(Error::Regex(_))
        ));
        assert!(matches!(
            MonitorSpec::new("m", "/tmp", ".*")
                .with_encoding("no-such-charset")
                .validate(),
            Err(Error::UnknownEncoding(_))
        ));
        assert!(
            MonitorSpec::new("m", "/tmp", ".*")
                .with_rule(MatchRule::new("[", 0))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_resolve_encoding_labels() {
        let spec = MonitorSpec::new("m", "/tmp", ".*").with_encoding("Shift_JIS");
        assert_eq!(spec.resolve_encoding().unwrap(), encoding_rs::SHIFT_JIS);
        let spec = MonitorSpec::new("m", "/tmp", ".*").with_encoding("utf8");
        assert_eq!(spec.resolve_encoding().unwrap(), encoding_rs::UTF_8);
    }

    #[test]
    fn test_load_monitors() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(
            file,
            r#"{{"monitors": [
                {{"id": "a", "directory": "/var/log", "filenamePattern": "syslog", "lineSeparator": "CR"}},
                {{"id": "b", "directory": "/var/log", "filenamePattern": "auth.log", "enabled": false}}
            ]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let monitors = load_monitors(file.path()).unwrap();
        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[0].line_separator, LineSeparator::Cr);
        assert!(!monitors[1].enabled);
    }

    #[test]
    fn test_load_monitors_missing_file() {
        let result = load_monitors(Path::new("/nonexistent/monitors.json"));
        assert!(matches!(result, Err(Error::MonitorsFile { .. })));
    }
}
