//! Ed25519 identity: keystore, signing, verification, fingerprinting.

mod error;
mod fingerprint;
mod keystore;
mod loader;
mod pem_codec;
mod signer;

pub use error::IdentityError;
pub use fingerprint::fingerprint;
pub use keystore::KeyStore;
pub use loader::{load_private_key, load_public_keys, LoadedKeys};
pub use pem_codec::{PRIVATE_TAG, PUBLIC_TAG};
pub use signer::{verify, Signer};
