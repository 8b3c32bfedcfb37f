use thiserror::Error;

/// Validation errors raised while constructing a type in this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("agent name {0:?} is invalid: must start alphanumeric and contain only letters, digits, '-' or '_'")]
    InvalidAgentName(String),

    #[error("agent {0:?} lists itself in can_message")]
    SelfMessage(String),
}
