use chrono::Utc;
use oktsec_audit::AuditStore;
use oktsec_config::ConfigMutator;
use oktsec_webhook::{TemplateVars, WebhookNotifier};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background risk scorer. Runs every `check_interval` seconds, pulls the
/// last-24h severity-weighted risk aggregate per agent from the
/// `AuditStore`, fires an `agent_risk_elevated` webhook for agents over
/// threshold, and optionally auto-suspends them via `ConfigMutator`.
///
/// `tokio::time::interval` ticking inside an unconditional `loop`, one check
/// per tick, errors logged and the loop continues, cancellable via a
/// `CancellationToken`.
pub struct AnomalyLoop {
    audit: Arc<AuditStore>,
    config: Arc<dyn ConfigMutator>,
    webhook: Arc<WebhookNotifier>,
    check_interval: Duration,
    risk_threshold: f64,
    min_messages: u64,
    auto_suspend: bool,
}

impl AnomalyLoop {
    pub fn new(
        audit: Arc<AuditStore>,
        config: Arc<dyn ConfigMutator>,
        webhook: Arc<WebhookNotifier>,
        check_interval_secs: u64,
        risk_threshold: f64,
        min_messages: u64,
        auto_suspend: bool,
    ) -> Self {
        Self {
            audit,
            config,
            webhook,
            check_interval: Duration::from_secs(check_interval_secs.max(1)),
            risk_threshold,
            min_messages,
            auto_suspend,
        }
    }

    /// Consumes `self` and runs until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            risk_threshold = self.risk_threshold,
            "anomaly loop started"
        );
        let mut ticker = tokio::time::interval(self.check_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("anomaly loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    self.check_once();
                }
            }
        }
    }

    fn check_once(&self) {
        let risks = match self.audit.query_agent_risk() {
            Ok(risks) => risks,
            Err(e) => {
                warn!(error = %e, "anomaly loop: query_agent_risk failed");
                return;
            }
        };

        for risk in risks {
            if risk.total < self.min_messages as i64 || risk.risk_score < self.risk_threshold {
                continue;
            }

            info!(
                agent = %risk.agent,
                risk_score = risk.risk_score,
                total = risk.total,
                "agent risk elevated"
            );

            let vars = TemplateVars {
                rule_id: "agent-risk-elevated".to_string(),
                rule_name: "Agent Risk Elevated".to_string(),
                severity: "high".to_string(),
                from: risk.agent.clone(),
                to: String::new(),
                action: if self.auto_suspend { "suspend".to_string() } else { "flag".to_string() },
                time: Utc::now().to_rfc3339(),
            };
            self.webhook.fire_event("agent_risk_elevated", &vars);

            if self.auto_suspend {
                if let Err(e) = self.config.set_agent_suspended(&risk.agent, true) {
                    warn!(agent = %risk.agent, error = %e, "failed to auto-suspend agent");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oktsec_config::ConfigView;
    use oktsec_types::{AuditEntry, AuditStatus, Severity, TriggeredRule};
    use std::sync::Mutex;

    struct MockConfig {
        suspended: Mutex<Vec<String>>,
    }

    impl ConfigView for MockConfig {
        fn snapshot(&self) -> oktsec_config::Config {
            oktsec_config::Config::default()
        }
    }

    impl ConfigMutator for MockConfig {
        fn set_agent_suspended(&self, name: &str, _suspended: bool) -> Result<(), oktsec_config::ConfigError> {
            self.suspended.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn blocked_entry(from: &str) -> AuditEntry {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        AuditEntry {
            id: format!("audit-{id}"),
            timestamp: Utc::now(),
            from: from.to_string(),
            to: "agent-b".to_string(),
            content_hash: "hash".to_string(),
            signature_verified: 0,
            pubkey_fingerprint: None,
            status: AuditStatus::Blocked,
            rules_triggered: vec![TriggeredRule {
                rule_id: "secret-aws-access-key".into(),
                severity: Severity::Critical,
                category: "secret".into(),
                action: oktsec_types::RuleAction::Block,
            }],
            policy_decision: "block".to_string(),
            latency_ms: 1,
        }
    }

    #[tokio::test]
    async fn auto_suspends_agent_over_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AuditStore::open(dir.path().join("audit.db")).unwrap());
        for _ in 0..5 {
            store.log(blocked_entry("risky-agent")).await;
        }
        store.flush().await.unwrap();

        let config = Arc::new(MockConfig {
            suspended: Mutex::new(vec![]),
        });
        let webhook = Arc::new(WebhookNotifier::new(vec![]));
        let loop_ = AnomalyLoop::new(
            Arc::clone(&store),
            config.clone() as Arc<dyn ConfigMutator>,
            webhook,
            60,
            0.5,
            1,
            true,
        );
        loop_.check_once();

        assert_eq!(config.suspended.lock().unwrap().as_slice(), &["risky-agent".to_string()]);
    }
}
