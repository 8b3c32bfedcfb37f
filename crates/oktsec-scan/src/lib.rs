//! Content-scanning rule engine.

mod builtin;
mod engine;
mod error;
mod loader;
mod rule_spec;

pub use engine::{RegexScanEngine, ScanEngine};
pub use error::ScanError;
pub use loader::load_custom_rules_dir;
pub use rule_spec::{RuleDetail, RuleInfo, RuleSpec};
