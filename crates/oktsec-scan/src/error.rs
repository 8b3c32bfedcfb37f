use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid regex in rule {rule_id:?}: {source}")]
    InvalidPattern {
        rule_id: String,
        #[source]
        source: regex::Error,
    },
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rule file {path}: {source}")]
    MalformedRule {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("duplicate rule id {0:?}")]
    DuplicateRuleId(String),
}
