use crate::error::ConfigError;
use crate::model::Config;
use crate::validate::{normalize, validate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Read access to the current configuration. Policy/anomaly code depends on
/// this trait, not the concrete store, so tests can substitute a fixed
/// snapshot.
pub trait ConfigView: Send + Sync {
    fn snapshot(&self) -> Config;
}

/// Exclusive mutation, persisted to YAML while holding the lock.
pub trait ConfigMutator: ConfigView {
    fn set_agent_suspended(&self, name: &str, suspended: bool) -> Result<(), ConfigError>;
}

/// Owns the on-disk YAML config and a reader-writer lock over the parsed
/// form. `reload` atomically swaps the internal value under the write lock.
pub struct ConfigStore {
    path: PathBuf,
    inner: RwLock<Config>,
}

impl ConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = serde_yaml::from_str(&raw)?;
        normalize(&mut config);
        validate(&config)?;
        Ok(Self {
            path,
            inner: RwLock::new(config),
        })
    }

    pub fn from_config(path: impl Into<PathBuf>, mut config: Config) -> Result<Self, ConfigError> {
        normalize(&mut config);
        validate(&config)?;
        Ok(Self {
            path: path.into(),
            inner: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `f` under the exclusive lock, re-validates, persists to YAML,
    /// and only then releases the lock. On validation failure the in-memory
    /// config is rolled back to its pre-mutation value; nothing is written.
    pub fn mutate<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Config),
    {
        let mut guard = self.inner.write().expect("config lock poisoned");
        let before = guard.clone();
        f(&mut guard);
        normalize(&mut guard);
        if let Err(e) = validate(&guard) {
            *guard = before;
            return Err(e);
        }
        self.persist(&guard)?;
        debug!(path = %self.path.display(), "config mutated and persisted");
        Ok(())
    }

    fn persist(&self, config: &Config) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(config)?;
        fs::write(&self.path, yaml).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn reload(&self) -> Result<(), ConfigError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut config: Config = serde_yaml::from_str(&raw)?;
        normalize(&mut config);
        validate(&config)?;
        *self.inner.write().expect("config lock poisoned") = config;
        info!(path = %self.path.display(), "config reloaded");
        Ok(())
    }
}

impl ConfigView for ConfigStore {
    fn snapshot(&self) -> Config {
        self.inner.read().expect("config lock poisoned").clone()
    }
}

impl ConfigMutator for ConfigStore {
    /// Used by the anomaly loop's `auto_suspend`: flips an agent's
    /// `suspended` flag and persists.
    fn set_agent_suspended(&self, name: &str, suspended: bool) -> Result<(), ConfigError> {
        self.mutate(|config| {
            if let Some(agent) = config.agents.get_mut(name) {
                agent.suspended = suspended;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentConfig;

    fn write_minimal_config(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("oktsec.yaml");
        fs::write(&path, "version: \"1\"\n").unwrap();
        path
    }

    #[test]
    fn load_parses_defaults_from_minimal_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(dir.path());
        let store = ConfigStore::load(&path).unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.quarantine.expiry_hours, 24);
    }

    #[test]
    fn mutate_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(dir.path());
        let store = ConfigStore::load(&path).unwrap();
        store
            .mutate(|c| {
                c.agents.insert(
                    "alice".to_string(),
                    AgentConfig {
                        can_message: vec!["bob".to_string()],
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
            })
            .unwrap();
        let reloaded = ConfigStore::load(&path).unwrap();
        assert!(reloaded.snapshot().agents.contains_key("alice"));
    }

    #[test]
    fn mutate_rolls_back_on_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(dir.path());
        let store = ConfigStore::load(&path).unwrap();
        let result = store.mutate(|c| {
            c.agents.insert(
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
        });
        assert!(result.is_err());
        assert!(!store.snapshot().agents.contains_key("alice"));
    }

    #[test]
    fn set_agent_suspended_flips_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(dir.path());
        let store = ConfigStore::load(&path).unwrap();
        store
            .mutate(|c| {
                c.agents.insert(
                    "alice".to_string(),
                    AgentConfig {
                        can_message: vec![],
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
            })
            .unwrap();
        store.set_agent_suspended("alice", true).unwrap();
        assert!(store.snapshot().agents.get("alice").unwrap().suspended);
    }
}
