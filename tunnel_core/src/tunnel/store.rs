//! Persistence for tunnel configurations and manager state.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::conf::{ConfigParseError, ConfigSnapshot, GlobalExclusions};

const CONFIG_EXTENSION: &str = "conf";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration for {0} not found")]
    NotFound(String),

    #[error("configuration for {0} already exists")]
    AlreadyExists(String),

    #[error("invalid configuration for {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: ConfigParseError,
    },

    #[error("state file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Named tunnel configurations.
pub trait ConfigStore: Send + Sync {
    fn create(&self, name: &str, config: &ConfigSnapshot) -> StoreResult<ConfigSnapshot>;
    fn delete(&self, name: &str) -> StoreResult<()>;
    fn enumerate(&self) -> StoreResult<BTreeSet<String>>;
    fn load(&self, name: &str) -> StoreResult<ConfigSnapshot>;
    fn rename(&self, name: &str, replacement: &str) -> StoreResult<()>;
    fn save(&self, name: &str, config: &ConfigSnapshot) -> StoreResult<ConfigSnapshot>;
}

/// Stores each configuration as `<dir>/<name>.conf`.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
    exclusions: GlobalExclusions,
}

impl FileConfigStore {
    pub fn new(dir: impl Into<PathBuf>, exclusions: GlobalExclusions) -> Self {
        FileConfigStore {
            dir: dir.into(),
            exclusions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{CONFIG_EXTENSION}"))
    }

    fn write(&self, name: &str, config: &ConfigSnapshot, create: bool) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(name);
        if create && path.exists() {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        if !create && !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        debug!(tunnel = %name, file = %path.display(), "Writing configuration");
        fs::write(&path, config.to_wg_quick_string()).map_err(|source| StoreError::Io { path, source })
    }
}

fn not_found_or_io(name: &str, path: PathBuf, source: io::Error) -> StoreError {
    if source.kind() == ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io { path, source }
    }
}

impl ConfigStore for FileConfigStore {
    fn create(&self, name: &str, config: &ConfigSnapshot) -> StoreResult<ConfigSnapshot> {
        self.write(name, config, true)?;
        Ok(config.clone())
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let path = self.path_for(name);
        fs::remove_file(&path).map_err(|source| not_found_or_io(name, path, source))
    }

    fn enumerate(&self) -> StoreResult<BTreeSet<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CONFIG_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.insert(stem.to_string());
            }
        }
        Ok(names)
    }

    fn load(&self, name: &str) -> StoreResult<ConfigSnapshot> {
        let path = self.path_for(name);
        let text = fs::read_to_string(&path).map_err(|source| not_found_or_io(name, path, source))?;
        ConfigSnapshot::parse_with_exclusions(&text, &self.exclusions).map_err(|source| {
            StoreError::Parse {
                name: name.to_string(),
                source,
            }
        })
    }

    fn rename(&self, name: &str, replacement: &str) -> StoreResult<()> {
        let from = self.path_for(name);
        let to = self.path_for(replacement);
        if to.exists() {
            return Err(StoreError::AlreadyExists(replacement.to_string()));
        }
        fs::rename(&from, &to).map_err(|source| not_found_or_io(name, from, source))
    }

    fn save(&self, name: &str, config: &ConfigSnapshot) -> StoreResult<ConfigSnapshot> {
        self.write(name, config, false)?;
        Ok(config.clone())
    }
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: Mutex<BTreeMap<String, ConfigSnapshot>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn configs(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, ConfigSnapshot>> {
        self.configs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn create(&self, name: &str, config: &ConfigSnapshot) -> StoreResult<ConfigSnapshot> {
        let mut configs = self.configs();
        if configs.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        configs.insert(name.to_string(), config.clone());
        Ok(config.clone())
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.configs()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn enumerate(&self) -> StoreResult<BTreeSet<String>> {
        Ok(self.configs().keys().cloned().collect())
    }

    fn load(&self, name: &str) -> StoreResult<ConfigSnapshot> {
        self.configs()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn rename(&self, name: &str, replacement: &str) -> StoreResult<()> {
        let mut configs = self.configs();
        if configs.contains_key(replacement) {
            return Err(StoreError::AlreadyExists(replacement.to_string()));
        }
        let config = configs
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        configs.insert(replacement.to_string(), config);
        Ok(())
    }

    fn save(&self, name: &str, config: &ConfigSnapshot) -> StoreResult<ConfigSnapshot> {
        let mut configs = self.configs();
        match configs.get_mut(name) {
            Some(existing) => {
                *existing = config.clone();
                Ok(config.clone())
            }
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

/// What the manager remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Tunnels that were up when state was last saved
    pub running_tunnels: BTreeSet<String>,
    /// Most recently brought-up tunnel
    pub last_used_tunnel: Option<String>,
}

/// Storage for [`PersistedState`].
pub trait StateStore: Send + Sync {
    fn load(&self) -> StoreResult<PersistedState>;
    fn save(&self, state: &PersistedState) -> StoreResult<()>;
}

/// Keeps state in a JSON file. A missing file reads as empty state.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> StoreResult<PersistedState> {
        let contents = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PersistedState::default()),
            Err(source) => {
                error!(file = %self.path.display(), "failed to read state file: {source}");
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(serde_json::from_slice(&contents)?)
    }

    fn save(&self, state: &PersistedState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = serde_json::to_vec_pretty(state)?;
        fs::write(&self.path, serialized).map_err(|source| {
            error!(file = %self.path.display(), "failed to write state file: {source}");
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// In-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<PersistedState>,
}

impl MemoryStateStore {
    pub fn new(state: PersistedState) -> Self {
        MemoryStateStore {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> StoreResult<PersistedState> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, state: &PersistedState) -> StoreResult<()> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        Ok(())
    }
}
