use crate::error::TypesError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Wildcard marker accepted in `Agent::can_message`.
pub const WILDCARD: &str = "*";

/// A validated agent name: starts alphanumeric, then `[A-Za-z0-9_-]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for AgentName {
    type Error = TypesError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut chars = value.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !value.is_empty() && valid_start && valid_rest {
            Ok(Self(value.to_string()))
        } else {
            Err(TypesError::InvalidAgentName(value.to_string()))
        }
    }
}

impl TryFrom<String> for AgentName {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AgentName::try_from(value.as_str())
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}

/// A registered communication endpoint, governed by ACL and policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: AgentName,
    /// Target names this agent may message. `"*"` means any.
    #[serde(default)]
    pub can_message: HashSet<String>,
    /// Rule-category tags that force a `blocked` verdict for this sender.
    #[serde(default)]
    pub blocked_content: HashSet<String>,
    /// Tool names this agent may invoke. Empty means all tools are allowed.
    #[serde(default)]
    pub allowed_tools: HashSet<String>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Agent {
    pub fn new(name: AgentName) -> Self {
        Self {
            name,
            can_message: HashSet::new(),
            blocked_content: HashSet::new(),
            allowed_tools: HashSet::new(),
            suspended: false,
            description: None,
            created_by: None,
            created_at: None,
            location: None,
            tags: Vec::new(),
        }
    }

    /// An agent may never list itself in `can_message`.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.can_message.contains(self.name.as_str()) {
            return Err(TypesError::SelfMessage(self.name.as_str().to_string()));
        }
        Ok(())
    }

    /// Whether this agent may send to `target`, per `can_message`.
    pub fn can_message(&self, target: &str) -> bool {
        self.can_message.contains(WILDCARD) || self.can_message.contains(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_hyphen_underscore() {
        assert!(AgentName::try_from("agent-1_b").is_ok());
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert!(AgentName::try_from("-agent").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(AgentName::try_from("").is_err());
    }

    #[test]
    fn self_message_is_invalid() {
        let mut a = Agent::new(AgentName::try_from("a").unwrap());
        a.can_message.insert("a".to_string());
        assert_eq!(
            a.validate(),
            Err(TypesError::SelfMessage("a".to_string()))
        );
    }

    #[test]
    fn wildcard_allows_any_target() {
        let mut a = Agent::new(AgentName::try_from("a").unwrap());
        a.can_message.insert(WILDCARD.to_string());
        assert!(a.can_message("anything"));
    }
}
