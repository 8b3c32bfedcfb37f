use oktsec_types::RuleOverride;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_version() -> String {
    "1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_expiry_hours() -> u32 {
    24
}

fn default_endpoint_path() -> String {
    "/mcp".to_string()
}

/// Root configuration document, as loaded from the YAML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    /// One of `""`, `"allow"`, `"deny"`.
    #[serde(default)]
    pub default_policy: String,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    #[serde(default)]
    pub rules: Vec<RuleOverride>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub custom_rules_dir: Option<String>,
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub forward_proxy: ForwardProxyConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            identity: IdentityConfig::default(),
            default_policy: String::new(),
            agents: HashMap::new(),
            rules: Vec::new(),
            webhooks: Vec::new(),
            custom_rules_dir: None,
            quarantine: QuarantineConfig::default(),
            rate_limit: RateLimitConfig::default(),
            anomaly: AnomalyConfig::default(),
            forward_proxy: ForwardProxyConfig::default(),
            gateway: GatewayConfig::default(),
            mcp_servers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server_port() -> u16 {
    8443
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_bind(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub keys_dir: Option<String>,
    #[serde(default)]
    pub require_signature: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub can_message: Vec<String>,
    #[serde(default)]
    pub blocked_content: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Subset of `blocked`, `quarantined`, `rejected`, `agent_risk_elevated`.
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u32,
    #[serde(default)]
    pub retention_days: u32,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiry_hours: default_expiry_hours(),
            retention_days: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub per_agent: usize,
    #[serde(default)]
    pub window: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default)]
    pub check_interval: u64,
    #[serde(default)]
    pub risk_threshold: f64,
    #[serde(default)]
    pub min_messages: u64,
    #[serde(default)]
    pub auto_suspend: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    #[serde(default)]
    pub scan_requests: bool,
    #[serde(default)]
    pub scan_responses: bool,
    #[serde(default)]
    pub max_body_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    #[serde(default)]
    pub scan_responses: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_server_port(),
            bind: default_bind(),
            endpoint_path: default_endpoint_path(),
            scan_responses: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub transport: McpTransport,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}
