//! Loads custom rule files from a directory, one `RuleSpec` per `.toml` file.
//!
//! Merge-don't-replace: built-ins stay, custom rules are added on top.

use crate::error::ScanError;
use crate::rule_spec::RuleSpec;
use std::fs;
use std::path::Path;

pub fn load_custom_rules_dir(dir: &Path) -> Result<Vec<RuleSpec>, ScanError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut rules = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| ScanError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let contents = fs::read_to_string(&path).map_err(|e| ScanError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let spec: RuleSpec = toml::from_str(&contents).map_err(|e| ScanError::MalformedRule {
            path: path.display().to_string(),
            source: e,
        })?;
        rules.push(spec);
    }
    Ok(rules)
}
