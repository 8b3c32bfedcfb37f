use crate::rule::TriggeredRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `pending -> approved | rejected | expired`; terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuarantineStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl QuarantineStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuarantineStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineStatus::Pending => "pending",
            QuarantineStatus::Approved => "approved",
            QuarantineStatus::Rejected => "rejected",
            QuarantineStatus::Expired => "expired",
        }
    }
}

/// A message held pending human (or programmatic) review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineItem {
    pub id: String,
    pub audit_entry_id: String,
    pub content: String,
    pub from: String,
    pub to: String,
    pub rules_triggered: Vec<TriggeredRule>,
    pub status: QuarantineStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
