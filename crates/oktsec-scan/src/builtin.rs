use crate::rule_spec::RuleSpec;
use oktsec_types::Severity;

/// Built-in rule set shipped with every `RegexScanEngine`. Chosen to exercise
/// every severity so the verdict-synthesis default mapping has something to
/// hit in every bucket.
pub fn builtin_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec {
            id: "secret-aws-access-key".into(),
            name: "AWS access key".into(),
            severity: Severity::Critical,
            category: "secrets".into(),
            pattern: r"AKIA[0-9A-Z]{16}".into(),
            description: Some("Matches an AWS access key id literal.".into()),
        },
        RuleSpec {
            id: "secret-generic-api-key".into(),
            name: "Generic API key assignment".into(),
            severity: Severity::Critical,
            category: "secrets".into(),
            pattern: r#"(?i)api[_-]?key\s*[:=]\s*['"]?[A-Za-z0-9_\-]{16,}"#.into(),
            description: Some("Matches `api_key = \"...\"` style assignments.".into()),
        },
        RuleSpec {
            id: "prompt-injection-ignore-instructions".into(),
            name: "Prompt injection: ignore prior instructions".into(),
            severity: Severity::High,
            category: "prompt_injection".into(),
            pattern: r"(?i)ignore (all )?(the )?(previous|prior|above) instructions".into(),
            description: Some("Common jailbreak phrasing asking the model to disregard its system prompt.".into()),
        },
        RuleSpec {
            id: "prompt-injection-reveal-system-prompt".into(),
            name: "Prompt injection: reveal system prompt".into(),
            severity: Severity::High,
            category: "prompt_injection".into(),
            pattern: r"(?i)(reveal|print|show) (your|the) system prompt".into(),
            description: None,
        },
        RuleSpec {
            id: "shell-metacharacters".into(),
            name: "Shell metacharacter sequence".into(),
            severity: Severity::Medium,
            category: "shell_injection".into(),
            pattern: r"(\$\(|`[^`]+`|&&|\|\|| rm -rf )".into(),
            description: Some("Heuristic for command-injection-shaped content.".into()),
        },
        RuleSpec {
            id: "pii-ssn".into(),
            name: "US Social Security Number".into(),
            severity: Severity::Medium,
            category: "pii".into(),
            pattern: r"\b\d{3}-\d{2}-\d{4}\b".into(),
            description: None,
        },
        RuleSpec {
            id: "content-profanity-mild".into(),
            name: "Mild profanity".into(),
            severity: Severity::Low,
            category: "content_policy".into(),
            pattern: r"(?i)\b(damn|crap)\b".into(),
            description: None,
        },
    ]
}
