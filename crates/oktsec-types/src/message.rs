use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound inter-agent message, prior to evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Base64 Ed25519 signature over the canonical payload, if present.
    #[serde(default)]
    pub signature: Option<String>,
}

impl Message {
    /// Canonical payload bytes signed/verified: no trailing newline, no
    /// normalization of `content`.
    pub fn canonical_payload(&self) -> Vec<u8> {
        format!(
            "{}\n{}\n{}\n{}",
            self.from,
            self.to,
            self.content,
            self.timestamp.to_rfc3339()
        )
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn canonical_payload_has_no_trailing_newline() {
        let msg = Message {
            from: "a".into(),
            to: "b".into(),
            content: "hello".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            signature: None,
        };
        let payload = msg.canonical_payload();
        assert!(!payload.ends_with(b"\n"));
        assert_eq!(payload.iter().filter(|&&b| b == b'\n').count(), 3);
    }
}
