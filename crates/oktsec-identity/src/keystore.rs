use crate::error::IdentityError;
use crate::fingerprint::fingerprint;
use crate::loader::{self, LoadedKeys};
use ed25519_dalek::VerifyingKey;
use oktsec_types::RevokedKey;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;

struct Inner {
    public_keys: HashMap<String, VerifyingKey>,
    revoked: HashSet<String>,
    revoked_entries: Vec<RevokedKey>,
}

/// In-memory map of agent-name -> verifier public key, with atomic reload.
/// Lifetime is the process: construct once at startup and pass by `Arc`
/// into the pipeline.
pub struct KeyStore {
    keys_dir: PathBuf,
    inner: RwLock<Inner>,
}

impl KeyStore {
    /// Loads all public keys and the revoked-key set from `keys_dir`.
    pub fn load(keys_dir: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let keys_dir = keys_dir.into();
        let loaded = loader::load_public_keys(&keys_dir)?;
        info!(count = loaded.public_keys.len(), "keystore loaded");
        Ok(Self {
            keys_dir,
            inner: RwLock::new(Inner {
                public_keys: loaded.public_keys,
                revoked: loaded.revoked,
                revoked_entries: loaded.revoked_entries,
            }),
        })
    }

    /// Re-scans `keys_dir` and atomically swaps the internal map.
    pub fn reload(&self) -> Result<(), IdentityError> {
        let LoadedKeys {
            public_keys,
            revoked,
            revoked_entries,
        } = loader::load_public_keys(&self.keys_dir)?;
        let mut guard = self.inner.write().expect("keystore lock poisoned");
        guard.public_keys = public_keys;
        guard.revoked = revoked;
        guard.revoked_entries = revoked_entries;
        Ok(())
    }

    pub fn get(&self, agent_name: &str) -> Option<VerifyingKey> {
        self.inner
            .read()
            .expect("keystore lock poisoned")
            .public_keys
            .get(agent_name)
            .copied()
    }

    pub fn fingerprint_of(&self, agent_name: &str) -> Option<String> {
        self.get(agent_name).map(|k| fingerprint(k.as_bytes()))
    }

    /// True if `fp` is in the revoked set, regardless of whether a key file
    /// with that fingerprint still exists on disk.
    pub fn is_revoked(&self, fp: &str) -> bool {
        self.inner
            .read()
            .expect("keystore lock poisoned")
            .revoked
            .contains(fp)
    }

    pub fn revoked_entries(&self) -> Vec<RevokedKey> {
        self.inner
            .read()
            .expect("keystore lock poisoned")
            .revoked_entries
            .clone()
    }

    /// Loads `agent_name`'s signing key for outbound signing/tests.
    pub fn load_signer(&self, agent_name: &str) -> Result<crate::Signer, IdentityError> {
        let signing_key = loader::load_private_key(&self.keys_dir, agent_name)?;
        Ok(crate::Signer::new(signing_key))
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }
}
