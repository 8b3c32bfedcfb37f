use crate::audit::AuditStatus;
use crate::rule::{Finding, TriggeredRule};
use serde::{Deserialize, Serialize};

/// `Verdict::status` reuses the same four states as an audit row's status.
pub type VerdictStatus = AuditStatus;

/// Whether the pipeline's `block` outcome actually drops the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Enforce,
    /// Computes the same verdict but a `block` is recorded as delivered
    /// instead of blocked; quarantine still holds regardless of mode.
    Observe,
}

/// The reason code recorded on `Verdict::decision` / `AuditEntry::policy_decision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    AllowAndFlag,
    Quarantine,
    Block,
    RateLimited,
    SignatureRequired,
    SignatureInvalid,
    KeyMissing,
    KeyRevoked,
    AgentSuspended,
    RecipientSuspended,
    AclDenied,
    ScanError,
}

impl PolicyDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::AllowAndFlag => "allow_and_flag",
            PolicyDecision::Quarantine => "quarantine",
            PolicyDecision::Block => "block",
            PolicyDecision::RateLimited => "rate_limited",
            PolicyDecision::SignatureRequired => "signature_required",
            PolicyDecision::SignatureInvalid => "signature_invalid",
            PolicyDecision::KeyMissing => "key_missing",
            PolicyDecision::KeyRevoked => "key_revoked",
            PolicyDecision::AgentSuspended => "agent_suspended",
            PolicyDecision::RecipientSuspended => "recipient_suspended",
            PolicyDecision::AclDenied => "acl_denied",
            PolicyDecision::ScanError => "scan_error",
        }
    }
}

/// Result of evaluating one message through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub decision: PolicyDecision,
    pub findings: Vec<Finding>,
    pub rules_triggered: Vec<TriggeredRule>,
    pub latency_ms: i64,
    pub quarantine_id: Option<String>,
    /// 1 = verified, -1 = invalid, 0 = unsigned-and-optional.
    pub signature_verified: i8,
}
