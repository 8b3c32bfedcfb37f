use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("writer channel closed")]
    WriterClosed,
    #[error("quarantine item {0:?} not found")]
    NotFound(String),
    #[error("quarantine item {0:?} is already in a terminal state ({1})")]
    AlreadyTerminal(String, &'static str),
}
