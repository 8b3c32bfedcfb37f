use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed PEM in {0}")]
    MalformedPem(String),
    #[error("unexpected PEM block type {found:?}, expected {expected:?}")]
    WrongBlockType { found: String, expected: String },
    #[error("key bytes have length {0}, expected 32")]
    WrongKeyLength(usize),
    #[error("private key file {0} has overly permissive mode (must be <= 0600)")]
    InsecurePrivateKeyMode(String),
    #[error("{0} is a symlink, refusing to load")]
    RefusedSymlink(String),
    #[error("{0} exceeds the 64 KiB key file size cap")]
    FileTooLarge(String),
    #[error("invalid base64 signature")]
    InvalidSignatureEncoding,
    #[error("signature verification failed")]
    SignatureMismatch,
    #[error("no public key on file for agent {0:?}")]
    UnknownAgent(String),
}
