//! Configuration for the relay, notify server and watchers.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file (`.devrelay/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DEVRELAY_` and use double
//! underscores to separate nested levels:
//! - `DEVRELAY_RELAY__PORT=6000` sets `relay.port`
//! - `DEVRELAY_NOTIFY_SERVER__ENABLED=true` sets `notify_server.enabled`
//! - `DEVRELAY_WATCH__DEBOUNCE_MS=500` sets `watch.debounce_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding the settings file, relative to the workspace root.
pub const CONFIG_DIR: &str = ".devrelay";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DEVRELAY_";

/// Errors from loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file already exists at {0}. Use --force to overwrite")]
    AlreadyExists(PathBuf),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .devrelay is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ports that stale dev processes may still hold: owner -> port
    #[serde(default)]
    pub ports: IndexMap<String, u16>,

    /// Websocket relay settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// UDP subject listener and job table
    #[serde(default)]
    pub notify_server: NotifyServerConfig,

    /// Files pushed to browsers on change
    #[serde(default)]
    pub hot_reload: HotReloadConfig,

    /// Glob rules that start tasks on change
    #[serde(default)]
    pub watch: WatchConfig,

    /// External task runner invocation
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every module
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides: target -> level
    #[serde(default)]
    pub modules: IndexMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind host for the websocket listener
    #[serde(default = "default_relay_host")]
    pub host: String,

    #[serde(default = "default_relay_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyServerConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    #[serde(default = "default_notify_address")]
    pub address: String,

    #[serde(default = "default_notify_port")]
    pub port: u16,

    /// Quiet period before a pending batch is released
    #[serde(default = "default_notify_debounce_ms")]
    pub debounce_ms: u64,

    /// Subject pattern (regex, case-insensitive) -> job names
    #[serde(default)]
    pub jobs: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HotReloadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Files or directories whose changes are pushed through the relay
    #[serde(default = "default_hot_reload_paths")]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// How long a file must be stable before its tasks run
    #[serde(default = "default_watch_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub rules: Vec<WatchRuleConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WatchRuleConfig {
    /// Glob patterns relative to the workspace root
    pub patterns: Vec<String>,

    /// Tasks started when a matching file settles
    pub tasks: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunnerConfig {
    /// Program invoked with the job names appended
    #[serde(default = "default_runner_program")]
    pub program: String,

    /// Arguments placed before the job names
    #[serde(default)]
    pub args: Vec<String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_relay_host() -> String {
    "0.0.0.0".to_string()
}
fn default_relay_port() -> u16 {
    crate::relay::DEFAULT_PORT
}
fn default_notify_address() -> String {
    "127.0.0.1".to_string()
}
fn default_notify_port() -> u16 {
    5889
}
fn default_notify_debounce_ms() -> u64 {
    1000
}
fn default_hot_reload_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("build/static")]
}
fn default_watch_debounce_ms() -> u64 {
    300
}
fn default_runner_program() -> String {
    "gulp".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            logging: LoggingConfig::default(),
            ports: IndexMap::new(),
            relay: RelayConfig::default(),
            notify_server: NotifyServerConfig::default(),
            hot_reload: HotReloadConfig::default(),
            watch: WatchConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: IndexMap::new(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_relay_host(),
            port: default_relay_port(),
        }
    }
}

impl Default for NotifyServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_notify_address(),
            port: default_notify_port(),
            debounce_ms: default_notify_debounce_ms(),
            jobs: IndexMap::new(),
        }
    }
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: default_hot_reload_paths(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: default_watch_debounce_ms(),
            rules: Vec::new(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_runner_program(),
            args: Vec::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        let mut settings = Self::load_from(config_path)?;
        if settings.workspace_root.is_none() {
            settings.workspace_root = Self::workspace_root();
        }
        Ok(settings)
    }

    /// Load configuration from a specific file, still honoring env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nesting, single underscore stays in the field name
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// Find the settings file by walking up from the current directory.
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .devrelay is located).
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Workspace root from settings, falling back to the current directory.
    pub fn root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Create a default settings file under `dir`.
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists(config_path));
        }

        let mut settings = Settings::default();
        settings.workspace_root = Some(dir.to_path_buf());
        settings
            .ports
            .insert("relay".to_string(), settings.relay.port);

        settings.save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.relay.enabled);
        assert_eq!(settings.relay.port, 5888);
        assert!(!settings.notify_server.enabled);
        assert_eq!(settings.notify_server.debounce_ms, 1000);
        assert!(settings.notify_server.jobs.is_empty());
        assert_eq!(settings.hot_reload.paths, vec![PathBuf::from("build/static")]);
        assert_eq!(settings.runner.program, "gulp");
        assert!(settings.ports.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
[ports]
server = 3001
relay = 5888

[notify_server]
enabled = true
port = 7000

[notify_server.jobs]
"\\.less$" = ["less"]
"app/.*\\.jsx?$" = ["app_build", "ima_build"]

[[watch.rules]]
patterns = ["app/**/*.js"]
tasks = ["app_build"]

[runner]
program = "npx"
args = ["gulp", "--continue"]
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.ports.get("server"), Some(&3001));
        assert_eq!(
            settings.ports.keys().collect::<Vec<_>>(),
            vec!["server", "relay"]
        );
        assert!(settings.notify_server.enabled);
        assert_eq!(settings.notify_server.port, 7000);
        assert_eq!(settings.notify_server.jobs.len(), 2);
        assert_eq!(
            settings.notify_server.jobs["app/.*\\.jsx?$"],
            vec!["app_build", "ima_build"]
        );
        assert_eq!(
            settings.watch.rules,
            vec![WatchRuleConfig {
                patterns: vec!["app/**/*.js".to_string()],
                tasks: vec!["app_build".to_string()],
            }]
        );
        assert_eq!(settings.runner.program, "npx");
        assert_eq!(settings.runner.args, vec!["gulp", "--continue"]);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        fs::write(&config_path, "[hot_reload]\nenabled = false\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert!(!settings.hot_reload.enabled);
        assert_eq!(settings.hot_reload.paths, vec![PathBuf::from("build/static")]);
        assert!(settings.relay.enabled);
        assert_eq!(settings.watch.debounce_ms, 300);
    }

    #[test]
    fn test_init_config_file_round_trips() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.ends_with(".devrelay/settings.toml"));

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.ports.get("relay"), Some(&5888));
        assert_eq!(loaded.workspace_root.as_deref(), Some(temp_dir.path()));
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        Settings::init_config_file(temp_dir.path(), false).unwrap();

        let err = Settings::init_config_file(temp_dir.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));

        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }
}
