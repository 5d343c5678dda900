//! Settings for tunnelctl and the tunnel manager.
//!
//! Settings are read from a TOML file, then overridden by `TUNNELCTL_*`
//! environment variables. Every field has a default, so an empty file is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::conf::GlobalExclusions;
use crate::tunnel::{BackendSettings, ManagerSettings};

const APP_DIR: &str = "tunnelctl";
const ENV_PREFIX: &str = "TUNNELCTL_";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    /// Error parsing TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Error serializing configuration to TOML
    #[error("Failed to serialize config to TOML: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Locations of the helper executables and how to gain privileges.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// wg executable (default: "wg")
    #[serde(default = "default_wg")]
    pub wg: String,

    /// wg-quick executable (default: "wg-quick")
    #[serde(default = "default_wg_quick")]
    pub wg_quick: String,

    /// File whose presence shows the kernel module is loaded
    #[serde(default = "default_module_version_file")]
    pub module_version_file: String,

    /// Prefix for privileged commands, e.g. `["sudo", "-n"]`. Empty runs them directly.
    #[serde(default)]
    pub privilege_command: Vec<String>,
}

fn default_wg() -> String {
    "wg".to_string()
}

fn default_wg_quick() -> String {
    "wg-quick".to_string()
}

fn default_module_version_file() -> String {
    "/sys/module/wireguard/version".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            wg: default_wg(),
            wg_quick: default_wg_quick(),
            module_version_file: default_module_version_file(),
            privilege_command: Vec::new(),
        }
    }
}

/// Where tunnel configurations and manager state live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory of `<name>.conf` files
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// JSON file with the running set and last used tunnel
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Parent directory for transient configuration files (default: system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn app_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(config_dir) => config_dir.join(APP_DIR),
        None => PathBuf::from(APP_DIR),
    }
}

fn default_config_dir() -> PathBuf {
    app_dir().join("tunnels")
}

fn default_state_file() -> PathBuf {
    app_dir().join("state.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            config_dir: default_config_dir(),
            state_file: default_state_file(),
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BehaviorConfig {
    /// Bring previously running tunnels back up on restore (default: false)
    #[serde(default)]
    pub restore_on_boot: bool,

    /// Applications excluded from every tunnel
    #[serde(default)]
    pub global_exclusions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Also write logs to a daily rolling file (default: false)
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Emit JSON instead of text (default: false)
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_dir() -> PathBuf {
    app_dir().join("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_to_file: false,
            log_dir: default_log_dir(),
            json_format: false,
        }
    }
}

/// Main settings structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Log level (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: default_log_level(),
            tools: ToolsConfig::default(),
            storage: StorageConfig::default(),
            behavior: BehaviorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Settings {
    /// Load settings from a TOML file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.validate()?;

        // Environment takes precedence over the file.
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(_)) => {
                let mut settings = Settings::default();
                settings.apply_env_overrides(|key| std::env::var(key).ok());
                settings.validate()?;
                Ok(settings)
            }
            other => other,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(invalid(
                "log_level",
                "must be one of trace, debug, info, warn, error",
            ));
        }

        let tools = [
            ("tools.wg", &self.tools.wg),
            ("tools.wg_quick", &self.tools.wg_quick),
            ("tools.module_version_file", &self.tools.module_version_file),
        ];
        for (key, value) in tools {
            if value.trim().is_empty() {
                return Err(invalid(key, "cannot be empty"));
            }
        }
        if self
            .tools
            .privilege_command
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return Err(invalid(
                "tools.privilege_command",
                "entries cannot be empty",
            ));
        }

        if self.storage.config_dir.as_os_str().is_empty() {
            return Err(invalid("storage.config_dir", "cannot be empty"));
        }
        if self.storage.state_file.as_os_str().is_empty() {
            return Err(invalid("storage.state_file", "cannot be empty"));
        }

        Ok(())
    }

    /// Apply overrides (prefix: TUNNELCTL_) read through `lookup`.
    ///
    /// Keys: TUNNELCTL_LOG_LEVEL, TUNNELCTL_WG, TUNNELCTL_WG_QUICK,
    /// TUNNELCTL_MODULE_VERSION_FILE, TUNNELCTL_PRIVILEGE_COMMAND (space separated),
    /// TUNNELCTL_CONFIG_DIR, TUNNELCTL_STATE_FILE, TUNNELCTL_TEMP_DIR,
    /// TUNNELCTL_RESTORE_ON_BOOT, TUNNELCTL_GLOBAL_EXCLUSIONS (comma separated),
    /// TUNNELCTL_LOG_TO_FILE, TUNNELCTL_LOG_DIR, TUNNELCTL_LOG_JSON
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_bool(s: &str) -> Option<bool> {
            match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Some(true),
                "false" | "0" | "no" | "n" => Some(false),
                _ => None,
            }
        }
        fn split_csv(s: &str) -> Vec<String> {
            s.split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        }
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }

        if let Some(v) = var("WG") {
            self.tools.wg = v;
        }
        if let Some(v) = var("WG_QUICK") {
            self.tools.wg_quick = v;
        }
        if let Some(v) = var("MODULE_VERSION_FILE") {
            self.tools.module_version_file = v;
        }
        if let Some(v) = var("PRIVILEGE_COMMAND") {
            self.tools.privilege_command = v.split_whitespace().map(str::to_string).collect();
        }

        if let Some(v) = var("CONFIG_DIR") {
            self.storage.config_dir = PathBuf::from(v);
        }
        if let Some(v) = var("STATE_FILE") {
            self.storage.state_file = PathBuf::from(v);
        }
        if let Some(v) = var("TEMP_DIR") {
            self.storage.temp_dir = Some(PathBuf::from(v));
        }

        if let Some(b) = var("RESTORE_ON_BOOT").as_deref().and_then(parse_bool) {
            self.behavior.restore_on_boot = b;
        }
        if let Some(v) = var("GLOBAL_EXCLUSIONS") {
            self.behavior.global_exclusions = split_csv(&v);
        }

        if let Some(b) = var("LOG_TO_FILE").as_deref().and_then(parse_bool) {
            self.logging.log_to_file = b;
        }
        if let Some(v) = var("LOG_DIR") {
            self.logging.log_dir = PathBuf::from(v);
        }
        if let Some(b) = var("LOG_JSON").as_deref().and_then(parse_bool) {
            self.logging.json_format = b;
        }
    }

    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        app_dir().join("config.toml")
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            wg: self.tools.wg.clone(),
            wg_quick: self.tools.wg_quick.clone(),
            module_version_file: self.tools.module_version_file.clone(),
            temp_dir: self.storage.temp_dir.clone(),
        }
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            restore_on_boot: self.behavior.restore_on_boot,
        }
    }

    pub fn global_exclusions(&self) -> GlobalExclusions {
        GlobalExclusions::new(self.behavior.global_exclusions.iter().cloned())
    }
}

/// Holds the active settings together with the file they came from.
#[derive(Debug)]
pub struct SettingsManager {
    settings: Settings,
    path: PathBuf,
}

impl SettingsManager {
    /// Defaults bound to the default path.
    pub fn new() -> Self {
        SettingsManager {
            settings: Settings::default(),
            path: Settings::default_path(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load(&path)?;
        Ok(SettingsManager { settings, path })
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load_or_default(&path)?;
        Ok(SettingsManager { settings, path })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Re-read the file the settings came from.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::load(&self.path)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        self.settings.save(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}
