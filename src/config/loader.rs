//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::DataBits;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "OVERLAPPED_SERIAL";

/// Config file name in the current directory
const CONFIG_FILE_NAME: &str = "overlapped-serial.toml";

/// Config file name inside the platform config directory
const APP_CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "OVERLAPPED_SERIAL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `OVERLAPPED_SERIAL_CONFIG` environment variable (explicit path)
    /// 2. `./overlapped-serial.toml` (current directory)
    /// 3. `config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides are still applied; one that fails to parse is
    /// skipped.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(err) = apply_env_overrides(&mut config) {
            tracing::warn!(error = %err, "ignoring invalid environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            self.config = load_from_file(path)?;
            apply_env_overrides(&mut self.config)?;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Get the default config directory for creating new config files.
///
/// `%APPDATA%\overlapped-serial\config` on Windows,
/// `~/.config/overlapped-serial` on Linux.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "overlapped-serial").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(APP_CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Value of `OVERLAPPED_SERIAL_<key>`, falling back to a legacy variable.
fn env_override(key: &str, legacy: Option<&str>) -> Option<(String, String)> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    if let Ok(val) = std::env::var(&var) {
        return Some((var, val));
    }
    let legacy = legacy?;
    std::env::var(legacy).ok().map(|val| (legacy.to_string(), val))
}

fn parse_env<T: FromStr>(var: &str, val: &str, message: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("{}: {:?}", message, val)))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `OVERLAPPED_SERIAL_<SECTION>_<KEY>`
/// For example:
/// - `OVERLAPPED_SERIAL_SERIAL_DEFAULT_BAUD=115200`
/// - `OVERLAPPED_SERIAL_SERIAL_PARITY=even`
/// - `OVERLAPPED_SERIAL_TESTING_PORT=COM15`
///
/// The hardware test variables `TEST_PORT`, `TEST_PEER_PORT`, `TEST_BAUD`,
/// `TEST_TIMEOUT` and `LOOPBACK_ENABLED` are honoured as well.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((var, val)) = env_override("SERIAL_DEFAULT_BAUD", None) {
        config.serial.default_baud = parse_env(&var, &val, "Invalid baud rate")?;
    }
    if let Some((var, val)) = env_override("SERIAL_DATA_BITS", None) {
        let bits: u8 = parse_env(&var, &val, "Invalid data bits")?;
        config.serial.data_bits =
            DataBits::try_from(bits).map_err(|e| ConfigError::env_parse(&var, e.to_string()))?;
    }
    if let Some((var, val)) = env_override("SERIAL_PARITY", None) {
        config.serial.parity = parse_env(&var, &val, "Invalid parity")?;
    }
    if let Some((var, val)) = env_override("SERIAL_STOP_BITS", None) {
        config.serial.stop_bits = parse_env(&var, &val, "Invalid stop bits")?;
    }
    if let Some((var, val)) = env_override("SERIAL_READ_TIMEOUT_MS", None) {
        config.serial.read_timeout_ms = parse_env(&var, &val, "Invalid timeout")?;
    }

    // Testing overrides (also support legacy TEST_PORT etc.)
    if let Some((_, val)) = env_override("TESTING_PORT", Some("TEST_PORT")) {
        config.testing.port = Some(val);
    }
    if let Some((_, val)) = env_override("TESTING_PEER_PORT", Some("TEST_PEER_PORT")) {
        config.testing.peer_port = Some(val);
    }
    if let Some((var, val)) = env_override("TESTING_BAUD", Some("TEST_BAUD")) {
        config.testing.baud = parse_env(&var, &val, "Invalid baud rate")?;
    }
    if let Some((var, val)) = env_override("TESTING_TIMEOUT_MS", Some("TEST_TIMEOUT")) {
        config.testing.timeout_ms = parse_env(&var, &val, "Invalid timeout")?;
    }
    if let Some((_, val)) = env_override("TESTING_LOOPBACK_ENABLED", Some("LOOPBACK_ENABLED")) {
        config.testing.loopback_enabled = val.to_lowercase() == "true" || val == "1";
    }

    // Logging overrides
    if let Some((_, val)) = env_override("LOGGING_LEVEL", None) {
        config.logging.level = val;
    }
    if let Some((var, val)) = env_override("LOGGING_FORMAT", None) {
        config.logging.format = match val.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(ConfigError::env_parse(
                    var,
                    "Expected one of: json, pretty, compact",
                ))
            }
        };
    }

    Ok(())
}
