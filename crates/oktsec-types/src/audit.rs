use crate::rule::TriggeredRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery outcome recorded on an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Delivered,
    Blocked,
    Quarantined,
    Rejected,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Delivered => "delivered",
            AuditStatus::Blocked => "blocked",
            AuditStatus::Quarantined => "quarantined",
            AuditStatus::Rejected => "rejected",
        }
    }
}

/// One row written exactly once per pipeline invocation that reaches a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub content_hash: String,
    /// 1 = verified, -1 = invalid signature, 0 = unsigned and signatures
    /// optional. Never left uninitialized.
    pub signature_verified: i8,
    pub pubkey_fingerprint: Option<String>,
    pub status: AuditStatus,
    pub rules_triggered: Vec<TriggeredRule>,
    pub policy_decision: String,
    pub latency_ms: i64,
}

/// A revoked public key: presence here fails verification even if the key
/// file is still on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedKey {
    pub fingerprint: String,
    pub agent_name: String,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}
