//! Loads public/private key PEM files from a `keys_dir`.
//!
//! The loader ignores subdirectories (other than the top-level `revoked/`),
//! symlinks, and files over 64 KiB.

use crate::error::IdentityError;
use crate::fingerprint::fingerprint;
use crate::pem_codec::{self, PRIVATE_TAG, PUBLIC_TAG};
use chrono::Utc;
use ed25519_dalek::{SigningKey, VerifyingKey};
use oktsec_types::RevokedKey;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const MAX_KEY_FILE_BYTES: u64 = 64 * 1024;

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn read_checked(path: &Path) -> Result<Option<String>, IdentityError> {
    if is_symlink(path) {
        return Err(IdentityError::RefusedSymlink(path.display().to_string()));
    }
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(IdentityError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    if meta.len() > MAX_KEY_FILE_BYTES {
        return Err(IdentityError::FileTooLarge(path.display().to_string()));
    }
    let contents = fs::read_to_string(path).map_err(|e| IdentityError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(contents))
}

/// Public keys loaded by agent name, plus the set of revoked fingerprints.
pub struct LoadedKeys {
    pub public_keys: HashMap<String, VerifyingKey>,
    pub revoked: HashSet<String>,
    pub revoked_entries: Vec<RevokedKey>,
}

/// Scans `keys_dir` for `<name>.pub` files and `keys_dir/revoked/` for revoked
/// public keys. Subdirectories, symlinks, and files over 64 KiB are skipped,
/// except the one designated `revoked/` subdirectory.
pub fn load_public_keys(keys_dir: &Path) -> Result<LoadedKeys, IdentityError> {
    if is_symlink(keys_dir) {
        return Err(IdentityError::RefusedSymlink(keys_dir.display().to_string()));
    }
    let mut public_keys = HashMap::new();
    for entry in read_dir_files_only(keys_dir)? {
        let Some(name) = pub_key_agent_name(&entry) else {
            continue;
        };
        if let Some(contents) = read_checked(&entry)? {
            let raw = pem_codec::decode(PUBLIC_TAG, &contents)?;
            let key = VerifyingKey::from_bytes(&raw)
                .map_err(|_| IdentityError::WrongKeyLength(raw.len()))?;
            public_keys.insert(name, key);
        }
    }

    let mut revoked = HashSet::new();
    let mut revoked_entries = Vec::new();
    let revoked_dir = keys_dir.join("revoked");
    if revoked_dir.is_dir() && !is_symlink(&revoked_dir) {
        for entry in read_dir_files_only(&revoked_dir)? {
            let Some(name) = pub_key_agent_name(&entry) else {
                continue;
            };
            if let Some(contents) = read_checked(&entry)? {
                let raw = pem_codec::decode(PUBLIC_TAG, &contents)?;
                let fp = fingerprint(&raw);
                revoked.insert(fp.clone());
                revoked_entries.push(RevokedKey {
                    fingerprint: fp,
                    agent_name: name,
                    reason: "revoked".to_string(),
                    revoked_at: Utc::now(),
                });
            }
        }
    }

    Ok(LoadedKeys {
        public_keys,
        revoked,
        revoked_entries,
    })
}

/// Loads one agent's private signing key from `<keys_dir>/<name>.key`.
/// Refuses to read a file whose mode is more permissive than 0600.
pub fn load_private_key(keys_dir: &Path, agent_name: &str) -> Result<SigningKey, IdentityError> {
    let path = keys_dir.join(format!("{agent_name}.key"));
    if is_symlink(&path) {
        return Err(IdentityError::RefusedSymlink(path.display().to_string()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(&path).map_err(|e| IdentityError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mode = meta.permissions().mode() & 0o777;
        if mode > 0o600 {
            return Err(IdentityError::InsecurePrivateKeyMode(path.display().to_string()));
        }
    }
    let contents = fs::read_to_string(&path).map_err(|e| IdentityError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw = pem_codec::decode(PRIVATE_TAG, &contents)?;
    Ok(SigningKey::from_bytes(&raw))
}

fn read_dir_files_only(dir: &Path) -> Result<Vec<std::path::PathBuf>, IdentityError> {
    let entries = fs::read_dir(dir).map_err(|e| IdentityError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IdentityError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if is_symlink(&path) {
            continue;
        }
        if path.is_dir() {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}

fn pub_key_agent_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("pub") {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pem_codec::encode;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn write_keypair(dir: &Path, name: &str) -> VerifyingKey {
        let signing = SigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        fs::write(
            dir.join(format!("{name}.pub")),
            encode(PUBLIC_TAG, verifying.as_bytes()),
        )
        .unwrap();
        fs::write(
            dir.join(format!("{name}.key")),
            encode(PRIVATE_TAG, signing.as_bytes()),
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(
                dir.join(format!("{name}.key")),
                fs::Permissions::from_mode(0o600),
            )
            .unwrap();
        }
        verifying
    }

    #[test]
    fn loads_public_and_revoked_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("revoked")).unwrap();
        let alice = write_keypair(dir.path(), "alice");
        let bob_revoked = write_keypair(dir.path().join("revoked").as_path(), "bob");

        let loaded = load_public_keys(dir.path()).unwrap();
        assert_eq!(loaded.public_keys.get("alice"), Some(&alice));
        assert_eq!(loaded.revoked.len(), 1);
        assert!(loaded.revoked.contains(&fingerprint(bob_revoked.as_bytes())));
    }

    #[test]
    fn loads_private_key_with_safe_mode() {
        let dir = tempfile::tempdir().unwrap();
        let verifying = write_keypair(dir.path(), "alice");
        let signing = load_private_key(dir.path(), "alice").unwrap();
        assert_eq!(signing.verifying_key(), verifying);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_world_readable_private_key() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        write_keypair(dir.path(), "alice");
        fs::set_permissions(dir.path().join("alice.key"), fs::Permissions::from_mode(0o644))
            .unwrap();
        assert!(load_private_key(dir.path(), "alice").is_err());
    }
}
