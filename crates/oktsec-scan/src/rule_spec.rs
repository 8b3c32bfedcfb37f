use oktsec_types::Severity;
use serde::{Deserialize, Serialize};

/// A rule definition as loaded from a built-in table or a custom TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub category: String,
    pub pattern: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Summary returned by `ScanEngine::list_rules` for dashboard-style introspection.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub category: String,
}

/// Full detail returned by `ScanEngine::explain_rule`.
#[derive(Debug, Clone, Serialize)]
pub struct RuleDetail {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub category: String,
    pub pattern: String,
    pub description: Option<String>,
}
