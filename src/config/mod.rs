//! Configuration module for overlapped-serial.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `OVERLAPPED_SERIAL_CONFIG` environment variable (explicit path)
//! 2. `./overlapped-serial.toml` (current directory)
//! 3. `config.toml` in the platform config directory
//!    (`%APPDATA%\overlapped-serial\config` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any configuration value can be overridden via environment variables.
//! The pattern is: `OVERLAPPED_SERIAL_<SECTION>_<KEY>`
//!
//! Examples:
//! - `OVERLAPPED_SERIAL_SERIAL_DEFAULT_BAUD=115200`
//! - `OVERLAPPED_SERIAL_SERIAL_READ_TIMEOUT_MS=0`
//! - `OVERLAPPED_SERIAL_TESTING_PORT=COM15`
//! - `OVERLAPPED_SERIAL_LOGGING_FORMAT=json`
//!
//! Legacy environment variables are also supported:
//! - `TEST_PORT`, `TEST_PEER_PORT`, `TEST_BAUD`, `TEST_TIMEOUT`, `LOOPBACK_ENABLED`
//!
//! # Example
//!
//! ```rust,no_run
//! use overlapped_serial::config::ConfigLoader;
//!
//! // Load configuration with automatic resolution
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default line: {}", config.serial.settings()?);
//!
//! // Or load with defaults only
//! let loader = ConfigLoader::with_defaults();
//! # Ok::<(), overlapped_serial::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, TestingConfig};
