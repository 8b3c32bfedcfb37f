use crate::error::ConfigError;
use crate::model::{Config, McpTransport};
use std::collections::HashSet;

/// Runs every validation rule against the parsed config. Collects all
/// violations rather than failing on the first, so a caller sees the whole
/// list at once; nothing is mutated either way.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut violations = Vec::new();

    check_port(config.server.port, "server.port", &mut violations);
    if config.gateway.enabled {
        check_port(config.gateway.port, "gateway.port", &mut violations);
    }

    if config.identity.require_signature && config.identity.keys_dir.is_none() {
        violations.push("identity.keys_dir is required when identity.require_signature is true".to_string());
    }

    if !matches!(config.default_policy.as_str(), "" | "allow" | "deny") {
        violations.push(format!(
            "default_policy must be one of \"\", \"allow\", \"deny\" (got {:?})",
            config.default_policy
        ));
    }

    for (name, agent) in &config.agents {
        if agent.can_message.iter().any(|target| target == name) {
            violations.push(format!("agent {name:?} lists itself in can_message"));
        }
    }

    let mut seen_rule_ids = HashSet::new();
    for rule in &config.rules {
        if !seen_rule_ids.insert(rule.rule_id.clone()) {
            violations.push(format!("duplicate rule override for rule id {:?}", rule.rule_id));
        }
    }

    if config.gateway.enabled && config.mcp_servers.is_empty() {
        violations.push("gateway.enabled requires at least one mcp_servers entry".to_string());
    }

    for (name, server) in &config.mcp_servers {
        match server.transport {
            McpTransport::Stdio => {
                if server.command.is_none() {
                    violations.push(format!("mcp_servers.{name}: stdio transport requires command"));
                }
            }
            McpTransport::Http => {
                if server.url.is_none() {
                    violations.push(format!("mcp_servers.{name}: http transport requires url"));
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(violations.join("; ")))
    }
}

fn check_port(port: u16, field: &str, violations: &mut Vec<String>) {
    if port == 0 {
        violations.push(format!("{field} must be in 1..65535 (got 0)"));
    }
}

/// Zero-value `expiry_hours` defaults to 24. Applied after parse, before
/// validation, so validation never has to special-case it.
pub fn normalize(config: &mut Config) {
    if config.quarantine.expiry_hours == 0 {
        config.quarantine.expiry_hours = 24;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentConfig, McpServerConfig};

    #[test]
    fn rejects_self_messaging_agent() {
        let mut config = Config::default();
        config.agents.insert(
            "alice".to_string(),
            AgentConfig {
                can_message: vec!["alice".to_string()],
                blocked_content: vec![],
                allowed_tools: None,
                suspended: false,
                description: None,
                created_by: None,
                created_at: None,
                location: None,
                tags: vec![],
            },
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn gateway_enabled_without_servers_is_rejected() {
        let mut config = Config::default();
        config.gateway.enabled = true;
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn stdio_transport_without_command_is_rejected() {
        let mut config = Config::default();
        config.gateway.enabled = true;
        config.mcp_servers.insert(
            "tools".to_string(),
            McpServerConfig {
                transport: McpTransport::Stdio,
                command: None,
                args: vec![],
                env: Default::default(),
                url: None,
                headers: Default::default(),
            },
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn normalize_defaults_zero_expiry_hours_to_24() {
        let mut config = Config::default();
        config.quarantine.expiry_hours = 0;
        normalize(&mut config);
        assert_eq!(config.quarantine.expiry_hours, 24);
    }

    #[test]
    fn valid_minimal_config_passes() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }
}
