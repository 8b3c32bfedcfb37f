mod template;

pub use template::{render_template, TemplateVars};

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

const DEFAULT_TEMPLATE: &str =
    "[{{SEVERITY}}] rule {{RULE}} triggered by {{FROM}} -> {{TO}} ({{ACTION}}) at {{TIME}}";

/// A globally configured webhook endpoint, subscribed to a subset of event
/// kinds.
#[derive(Debug, Clone)]
pub struct WebhookEndpoint {
    pub url: String,
    pub events: Vec<String>,
}

impl WebhookEndpoint {
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

/// Fires template-rendered JSON payloads at webhook endpoints. Two call
/// paths:
///
/// - `fire_event`: the global `webhooks[]` list, event-category routed
///   (`blocked`, `quarantined`, `rejected`, `agent_risk_elevated`).
/// - `fire_direct`: the explicit URLs a `RuleOverride.notify` names,
///   rendered with that rule's own template if it set one.
///
/// A shared `reqwest::Client`, fire-and-forget `tokio::spawn` per delivery.
/// A failed POST is retried twice with a linear backoff before being
/// dropped.
pub struct WebhookNotifier {
    client: Client,
    endpoints: Vec<WebhookEndpoint>,
}

impl WebhookNotifier {
    pub fn new(endpoints: Vec<WebhookEndpoint>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build webhook reqwest client; using default");
                Client::new()
            });
        Self { client, endpoints }
    }

    /// Fires (non-blocking) to every endpoint in the global `webhooks[]`
    /// list subscribed to `event`.
    pub fn fire_event(self: &Arc<Self>, event: &str, vars: &TemplateVars) {
        for endpoint in &self.endpoints {
            if !endpoint.subscribes_to(event) {
                continue;
            }
            let this = Arc::clone(self);
            let url = endpoint.url.clone();
            let event = event.to_string();
            let vars = vars.clone();
            tokio::spawn(async move {
                this.send_with_retry(&url, &event, DEFAULT_TEMPLATE, &vars)
                    .await;
            });
        }
    }

    /// Fires (non-blocking) directly at `urls` (a `RuleOverride.notify`
    /// list), using `template` if the rule set one, else the default.
    pub fn fire_direct(self: &Arc<Self>, urls: &[String], template: Option<&str>, vars: &TemplateVars) {
        let template = template.unwrap_or(DEFAULT_TEMPLATE).to_string();
        for url in urls {
            let this = Arc::clone(self);
            let url = url.clone();
            let template = template.clone();
            let vars = vars.clone();
            tokio::spawn(async move {
                this.send_with_retry(&url, "rule_triggered", &template, &vars)
                    .await;
            });
        }
    }

    /// The rendered template *is* the HTTP body. `Content-Type:
    /// application/json` if it parses as JSON, else `text/plain`. `event` is
    /// passed through only for logging; it is not attached to the body.
    async fn send_with_retry(&self, url: &str, event: &str, template: &str, vars: &TemplateVars) {
        let body = render_template(template, vars);
        let content_type = if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
            "application/json"
        } else {
            "text/plain"
        };

        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    info!(url, event, attempt, "webhook delivered");
                    return;
                }
                Ok(resp) => {
                    warn!(url, event, status = %resp.status(), attempt, "webhook returned non-success status");
                }
                Err(e) => {
                    warn!(url, event, error = %e, attempt, "webhook POST failed");
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
        }
        error!(url, event, "webhook dropped after {} attempts", MAX_ATTEMPTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vars() -> TemplateVars {
        TemplateVars {
            rule_id: "secret-aws-access-key".into(),
            rule_name: "AWS Access Key".into(),
            severity: "critical".into(),
            from: "agent-a".into(),
            to: "agent-b".into(),
            action: "block".into(),
            time: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn endpoint_subscribes_to_matches_event_list() {
        let endpoint = WebhookEndpoint {
            url: "https://example.com".into(),
            events: vec!["blocked".into(), "rejected".into()],
        };
        assert!(endpoint.subscribes_to("blocked"));
        assert!(!endpoint.subscribes_to("quarantined"));
    }

    #[test]
    fn fire_event_skips_unsubscribed_endpoints() {
        let notifier = Arc::new(WebhookNotifier::new(vec![WebhookEndpoint {
            url: "https://example.invalid".into(),
            events: vec!["agent_risk_elevated".into()],
        }]));
        notifier.fire_event("blocked", &sample_vars());
    }

    #[test]
    fn default_template_renders_all_placeholders() {
        let rendered = render_template(DEFAULT_TEMPLATE, &sample_vars());
        assert!(rendered.contains("CRITICAL"));
        assert!(rendered.contains("secret-aws-access-key"));
        assert!(rendered.contains("agent-a"));
        assert!(rendered.contains("agent-b"));
        assert!(rendered.contains("block"));
        assert!(rendered.contains("2026-01-01T00:00:00Z"));
    }
}
