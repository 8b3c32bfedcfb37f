use chrono::{Duration as ChronoDuration, Utc};
use oktsec_audit::{AuditStore, Hub, QuarantineQueue};
use oktsec_config::{AgentConfig, ConfigView};
use oktsec_identity::KeyStore;
use oktsec_ratelimit::RateLimiter;
use oktsec_scan::ScanEngine;
use oktsec_types::{
    AuditEntry, AuditStatus, EvalMode, Finding, Message, PolicyDecision, QuarantineItem,
    QuarantineStatus, RuleAction, Severity, TriggeredRule, Verdict,
};
use oktsec_webhook::{TemplateVars, WebhookNotifier};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

/// The ordered evaluation of one message. Stages run in a fixed order: rate
/// limit, identity, suspension, ACL, scan, blocked-content, verdict
/// synthesis, history escalation, apply.
pub struct PolicyPipeline {
    config: Arc<dyn ConfigView>,
    keystore: Arc<KeyStore>,
    rate_limiter: Arc<RateLimiter>,
    scan_engine: Arc<dyn ScanEngine>,
    audit: Arc<AuditStore>,
    quarantine: Arc<QuarantineQueue>,
    hub: Arc<Hub>,
    webhook: Arc<WebhookNotifier>,
}

impl PolicyPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<dyn ConfigView>,
        keystore: Arc<KeyStore>,
        rate_limiter: Arc<RateLimiter>,
        scan_engine: Arc<dyn ScanEngine>,
        audit: Arc<AuditStore>,
        quarantine: Arc<QuarantineQueue>,
        hub: Arc<Hub>,
        webhook: Arc<WebhookNotifier>,
    ) -> Self {
        Self {
            config,
            keystore,
            rate_limiter,
            scan_engine,
            audit,
            quarantine,
            hub,
            webhook,
        }
    }

    /// Entirely synchronous except for the audit-log enqueue (suspends only
    /// if the bounded write-behind channel is full) and the fire-and-forget
    /// webhook spawns. Never returns a `Result` — a failure anywhere
    /// downstream of the verdict itself is recorded, not raised.
    pub async fn evaluate(&self, message: &Message, mode: EvalMode) -> Verdict {
        let start = Instant::now();
        let config = self.config.snapshot();

        // 1. Rate limit — must run before any crypto work.
        if config.rate_limit.per_agent != 0 && !self.rate_limiter.check_and_record(&message.from) {
            return self
                .reject(message, PolicyDecision::RateLimited, 0, start)
                .await;
        }

        // 2. Identity.
        let identity = self.check_identity(message, config.identity.require_signature);
        if let Some(decision) = identity.reject {
            return self.reject(message, decision, identity.signature_verified, start).await;
        }

        // 3. Suspension.
        let sender_cfg = config.agents.get(&message.from).cloned();
        let recipient_cfg = config.agents.get(&message.to).cloned();
        if sender_cfg.as_ref().is_some_and(|a| a.suspended) {
            return self
                .reject(message, PolicyDecision::AgentSuspended, identity.signature_verified, start)
                .await;
        }
        if recipient_cfg.as_ref().is_some_and(|a| a.suspended) {
            return self
                .reject(message, PolicyDecision::RecipientSuspended, identity.signature_verified, start)
                .await;
        }

        // 4. ACL.
        if config.default_policy == "deny" && sender_cfg.is_none() {
            return self
                .reject(message, PolicyDecision::AclDenied, identity.signature_verified, start)
                .await;
        }
        if let Some(agent) = &sender_cfg {
            if !agent_can_message(agent, &message.to) {
                return self
                    .reject(message, PolicyDecision::AclDenied, identity.signature_verified, start)
                    .await;
            }
        }

        // 5. Scan.
        let findings = self.scan(message);
        let Some(findings) = findings else {
            return self
                .finish(
                    message,
                    Uuid::new_v4().to_string(),
                    PolicyDecision::ScanError,
                    AuditStatus::Delivered,
                    Vec::new(),
                    Vec::new(),
                    identity.signature_verified,
                    start,
                    None,
                )
                .await;
        };

        // Intersect against rule overrides: `ignore` filters the finding out.
        let overrides = &config.rules;
        let mut remaining: Vec<(Finding, Severity, RuleAction)> = Vec::new();
        for finding in findings {
            let over = overrides.iter().find(|o| o.rule_id == finding.rule_id);
            if let Some(over) = over {
                if over.action == RuleAction::Ignore {
                    continue;
                }
                let severity = over.severity.unwrap_or(finding.severity);
                remaining.push((finding, severity, over.action));
            } else {
                let severity = finding.severity;
                let action = default_action_for_severity(severity);
                remaining.push((finding, severity, action));
            }
        }

        // 6. Blocked content.
        let blocked_categories = sender_cfg
            .as_ref()
            .map(|a| a.blocked_content.clone())
            .unwrap_or_default();
        let forced_block = remaining
            .iter()
            .any(|(finding, _, _)| blocked_categories.iter().any(|c| c == &finding.category));

        // 7. Verdict synthesis: max severity, most-restrictive action.
        let mut action = remaining
            .iter()
            .map(|(_, _, a)| *a)
            .max()
            .unwrap_or(RuleAction::Ignore);
        if forced_block {
            action = RuleAction::Block;
        }

        let rules_triggered: Vec<TriggeredRule> = remaining
            .iter()
            .map(|(finding, severity, action)| TriggeredRule {
                rule_id: finding.rule_id.clone(),
                severity: *severity,
                category: finding.category.clone(),
                action: *action,
            })
            .collect();
        let raw_findings: Vec<Finding> = remaining.iter().map(|(f, _, _)| f.clone()).collect();

        let mut decision = if remaining.is_empty() {
            PolicyDecision::Allow
        } else {
            match action {
                RuleAction::Block => PolicyDecision::Block,
                RuleAction::Quarantine => PolicyDecision::Quarantine,
                RuleAction::AllowAndFlag | RuleAction::Ignore => PolicyDecision::AllowAndFlag,
            }
        };

        // 8. History escalation (covering-index-backed count).
        let since = Utc::now() - ChronoDuration::hours(1);
        if let Ok(blocked_recent) =
            self.audit.count_recent_status(&message.from, AuditStatus::Blocked, since)
        {
            if blocked_recent >= 5 && matches!(decision, PolicyDecision::Quarantine) {
                decision = PolicyDecision::Block;
            } else if blocked_recent >= 3 && matches!(decision, PolicyDecision::AllowAndFlag) {
                decision = PolicyDecision::Quarantine;
            }
        }

        // 9. Apply.
        let status = match decision {
            PolicyDecision::Block if mode == EvalMode::Observe => AuditStatus::Delivered,
            PolicyDecision::Block => AuditStatus::Blocked,
            PolicyDecision::Quarantine => AuditStatus::Quarantined,
            _ => AuditStatus::Delivered,
        };

        let audit_entry_id = Uuid::new_v4().to_string();
        let quarantine_id = if matches!(decision, PolicyDecision::Quarantine) {
            Some(
                self.create_quarantine_item(
                    message,
                    audit_entry_id.clone(),
                    &rules_triggered,
                    config.quarantine.expiry_hours,
                )
                .await,
            )
        } else {
            None
        };

        self.fire_rule_webhooks(message, &remaining);

        self.finish(
            message,
            audit_entry_id,
            decision,
            status,
            raw_findings,
            rules_triggered,
            identity.signature_verified,
            start,
            quarantine_id,
        )
        .await
    }

    fn check_identity(&self, message: &Message, require_signature: bool) -> IdentityOutcome {
        match &message.signature {
            Some(sig) => {
                let Some(pubkey) = self.keystore.get(&message.from) else {
                    return IdentityOutcome {
                        reject: if require_signature { Some(PolicyDecision::KeyMissing) } else { None },
                        signature_verified: if require_signature { -1 } else { 0 },
                    };
                };
                if let Some(fp) = self.keystore.fingerprint_of(&message.from) {
                    if self.keystore.is_revoked(&fp) {
                        return IdentityOutcome {
                            reject: Some(PolicyDecision::KeyRevoked),
                            signature_verified: -1,
                        };
                    }
                }
                match oktsec_identity::verify(&pubkey, &message.canonical_payload(), sig) {
                    Ok(()) => IdentityOutcome { reject: None, signature_verified: 1 },
                    Err(_) => IdentityOutcome {
                        reject: if require_signature { Some(PolicyDecision::SignatureInvalid) } else { None },
                        signature_verified: -1,
                    },
                }
            }
            None => {
                if require_signature {
                    IdentityOutcome { reject: Some(PolicyDecision::SignatureRequired), signature_verified: -1 }
                } else {
                    IdentityOutcome { reject: None, signature_verified: 0 }
                }
            }
        }
    }

    /// Wraps the (contractually infallible) `ScanEngine::scan` call in
    /// `catch_unwind` so a scan-engine panic delivers the message with
    /// `policy_decision = scan_error` rather than crashing the pipeline.
    fn scan(&self, message: &Message) -> Option<Vec<Finding>> {
        let engine = Arc::clone(&self.scan_engine);
        let content = message.content.clone();
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| engine.scan(&content, None)))
            .map_err(|_| warn!(from = %message.from, "scan engine panicked; delivering with scan_error"))
            .ok()
    }

    async fn create_quarantine_item(
        &self,
        message: &Message,
        audit_entry_id: String,
        rules_triggered: &[TriggeredRule],
        expiry_hours: u32,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let item = QuarantineItem {
            id: id.clone(),
            audit_entry_id,
            content: message.content.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            rules_triggered: rules_triggered.to_vec(),
            status: QuarantineStatus::Pending,
            created_at: now,
            expires_at: now + ChronoDuration::hours(expiry_hours as i64),
            reviewed_by: None,
            reviewed_at: None,
        };
        if let Err(e) = self.quarantine.enqueue(&item) {
            warn!(error = %e, "failed to enqueue quarantine item");
        }
        id
    }

    fn fire_rule_webhooks(&self, message: &Message, remaining: &[(Finding, Severity, RuleAction)]) {
        let config = self.config.snapshot();
        for (finding, severity, action) in remaining {
            let Some(over) = config.rules.iter().find(|o| o.rule_id == finding.rule_id) else {
                continue;
            };
            if over.notify.is_empty() {
                continue;
            }
            let vars = TemplateVars {
                rule_id: finding.rule_id.clone(),
                rule_name: finding.name.clone(),
                severity: severity_str(*severity).to_string(),
                from: message.from.clone(),
                to: message.to.clone(),
                action: action_str(*action).to_string(),
                time: Utc::now().to_rfc3339(),
            };
            self.webhook.fire_direct(&over.notify, over.template.as_deref(), &vars);
        }
    }

    async fn reject(&self, message: &Message, decision: PolicyDecision, signature_verified: i8, start: Instant) -> Verdict {
        self.finish(
            message,
            Uuid::new_v4().to_string(),
            decision,
            AuditStatus::Rejected,
            Vec::new(),
            Vec::new(),
            signature_verified,
            start,
            None,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        message: &Message,
        audit_entry_id: String,
        decision: PolicyDecision,
        status: AuditStatus,
        findings: Vec<Finding>,
        rules_triggered: Vec<TriggeredRule>,
        signature_verified: i8,
        start: Instant,
        quarantine_id: Option<String>,
    ) -> Verdict {
        let latency_ms = start.elapsed().as_millis() as i64;
        let pubkey_fingerprint = self.keystore.fingerprint_of(&message.from);
        let content_hash = oktsec_identity::fingerprint(message.content.as_bytes());

        let entry = AuditEntry {
            id: audit_entry_id,
            timestamp: Utc::now(),
            from: message.from.clone(),
            to: message.to.clone(),
            content_hash,
            signature_verified,
            pubkey_fingerprint,
            status,
            rules_triggered: rules_triggered.clone(),
            policy_decision: decision.as_str().to_string(),
            latency_ms,
        };

        self.hub.publish(entry.clone());
        self.audit.log(entry).await;

        if let Some(event) = event_for_status(status) {
            let top = rules_triggered.first();
            let vars = TemplateVars {
                rule_id: top.map(|r| r.rule_id.clone()).unwrap_or_else(|| "n/a".to_string()),
                rule_name: top.map(|r| r.rule_id.clone()).unwrap_or_else(|| "n/a".to_string()),
                severity: top.map(|r| severity_str(r.severity).to_string()).unwrap_or_else(|| "n/a".to_string()),
                from: message.from.clone(),
                to: message.to.clone(),
                action: decision.as_str().to_string(),
                time: Utc::now().to_rfc3339(),
            };
            self.webhook.fire_event(event, &vars);
        }

        Verdict {
            status,
            decision,
            findings,
            rules_triggered,
            latency_ms,
            quarantine_id,
            signature_verified,
        }
    }
}

struct IdentityOutcome {
    reject: Option<PolicyDecision>,
    signature_verified: i8,
}

fn agent_can_message(agent: &AgentConfig, target: &str) -> bool {
    agent.can_message.iter().any(|t| t == "*" || t == target)
}

fn default_action_for_severity(severity: Severity) -> RuleAction {
    match severity {
        Severity::Critical => RuleAction::Block,
        Severity::High => RuleAction::Quarantine,
        Severity::Medium | Severity::Low => RuleAction::AllowAndFlag,
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn action_str(a: RuleAction) -> &'static str {
    match a {
        RuleAction::Ignore => "ignore",
        RuleAction::AllowAndFlag => "allow-and-flag",
        RuleAction::Quarantine => "quarantine",
        RuleAction::Block => "block",
    }
}

fn event_for_status(status: AuditStatus) -> Option<&'static str> {
    match status {
        AuditStatus::Blocked => Some("blocked"),
        AuditStatus::Quarantined => Some("quarantined"),
        AuditStatus::Rejected => Some("rejected"),
        AuditStatus::Delivered => None,
    }
}
