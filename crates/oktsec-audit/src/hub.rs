use oktsec_types::AuditEntry;
use tokio::sync::broadcast;

const HUB_CAPACITY: usize = 1024;

/// In-process fan-out of new audit entries to subscribed channels (SSE, live
/// tail).
///
/// Publishing is non-blocking: a slow subscriber drops messages rather than
/// back-pressuring the writer. Hub delivery is best-effort — durability
/// lives on the database, not here.
pub struct Hub {
    tx: broadcast::Sender<AuditEntry>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Returns a new receiver. Dropping it unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.tx.subscribe()
    }

    /// Never blocks. If there are no subscribers this is a no-op; if a
    /// subscriber is too slow it silently lags and drops, per
    /// `tokio::sync::broadcast`'s semantics.
    pub fn publish(&self, entry: AuditEntry) {
        let _ = self.tx.send(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use oktsec_types::AuditStatus;

    fn sample_entry() -> AuditEntry {
        AuditEntry {
            id: "1".into(),
            timestamp: Utc::now(),
            from: "a".into(),
            to: "b".into(),
            content_hash: "hash".into(),
            signature_verified: 0,
            pubkey_fingerprint: None,
            status: AuditStatus::Delivered,
            rules_triggered: vec![],
            policy_decision: "allow".into(),
            latency_ms: 1,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_entry() {
        let hub = Hub::new();
        let mut rx = hub.subscribe();
        hub.publish(sample_entry());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, "1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_block() {
        let hub = Hub::new();
        hub.publish(sample_entry());
    }
}
