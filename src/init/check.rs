// SPDX-License-Identifier: Apache-2.0

use crate::receivers::logfile::{Result, load_monitors};
use std::collections::HashSet;
use std::path::Path;

/// Load a monitors file and describe every problem found in it. An empty
/// list means every monitor can be scanned and every rule compiles.
pub fn check_monitors(path: &Path) -> Result<Vec<String>> {
    let specs = load_monitors(path)?;

    let mut seen = HashSet::new();
    let mut problems = Vec::new();
    for spec in specs.iter() {
        if !seen.insert(spec.id.as_str()) {
            problems.push(format!("monitor {}: duplicate id", spec.id));
        }
        if let Err(e) = spec.validate() {
            problems.push(format!("monitor {}: {}", spec.id, e));
        }
    }

    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn monitors_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_monitors() {
        let file = monitors_file(
            r#"{"monitors": [{"id": "a", "directory": "/var/log", "filenamePattern": "app.*\\.log",
                "rules": [{"pattern": ".*ERROR.*", "order": 0}]}]}"#,
        );
        assert!(check_monitors(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_problems_reported() {
        let file = monitors_file(
            r#"{"monitors": [
                {"id": "a", "directory": "/var/log", "filenamePattern": "(", "rules": []},
                {"id": "a", "directory": "/var/log", "filenamePattern": ".*", "encoding": "klingon", "rules": []}
            ]}"#,
        );
        let problems = check_monitors(file.path()).unwrap();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("duplicate id")));
    }

    #[test]
    fn test_unreadable_file() {
        assert!(check_monitors(Path::new("/nonexistent/monitors.json")).is_err());
    }
}
