use serde::{Deserialize, Serialize};

/// Finding severity, ordered least to most severe for `Ord` comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Per-rule enforcement action. Ordered so the most restrictive compares
/// greatest; `Ignore` sorts lowest since it never contributes to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleAction {
    Ignore,
    AllowAndFlag,
    Quarantine,
    Block,
}

/// A single match produced by a `ScanEngine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub name: String,
    pub severity: Severity,
    pub category: String,
    #[serde(rename = "match")]
    pub matched: String,
}

/// A per-rule policy override from config. `severity`, when set, replaces
/// the finding's own severity for verdict synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(rename = "id")]
    pub rule_id: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    pub action: RuleAction,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub template: Option<String>,
}

/// A rule that fired during evaluation, recorded on the audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub severity: Severity,
    pub category: String,
    pub action: RuleAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_highest() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn action_orders_block_most_restrictive() {
        assert!(RuleAction::Block > RuleAction::Quarantine);
        assert!(RuleAction::Quarantine > RuleAction::AllowAndFlag);
        assert!(RuleAction::AllowAndFlag > RuleAction::Ignore);
    }
}
