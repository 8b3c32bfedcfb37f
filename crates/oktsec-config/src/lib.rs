mod error;
mod model;
mod store;
mod validate;

pub use error::ConfigError;
pub use model::{
    AgentConfig, AnomalyConfig, Config, ForwardProxyConfig, GatewayConfig, IdentityConfig,
    McpServerConfig, McpTransport, QuarantineConfig, RateLimitConfig, ServerConfig, WebhookConfig,
};
pub use store::{ConfigMutator, ConfigStore, ConfigView};
pub use validate::{normalize, validate};
