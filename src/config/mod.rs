//! Configuration management for envboot

pub mod schema;

pub use schema::Config;

use crate::error::{EnvbootError, EnvbootResult};
use semver::{Version, VersionReq};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local config file name
pub const LOCAL_CONFIG_NAME: &str = "envboot.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("envboot")
            .join("config.toml")
    }

    /// Walk up from `start` looking for a project-local `envboot.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> EnvbootResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load and validate configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> EnvbootResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| EnvbootError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| EnvbootError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        validate(&config).map_err(|reason| EnvbootError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write `config` as TOML, creating the parent directory
    pub async fn save(&self, config: &Config) -> EnvbootResult<()> {
        let path = &self.config_path;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| EnvbootError::ConfigDirCreate {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(path, content)
            .await
            .map_err(|e| EnvbootError::io(format!("writing config to {}", path.display()), e))?;

        info!("Wrote config {}", path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Check an interpreter version string.
///
/// Accepts full versions (`3.6.0`) and partial ones (`3.6`), which the
/// environment manager resolves to the newest matching patch release.
pub fn check_interpreter_version(version: &str) -> EnvbootResult<()> {
    if Version::parse(version).is_ok() {
        return Ok(());
    }
    VersionReq::parse(version)
        .map(|_| ())
        .map_err(|e| EnvbootError::InterpreterVersion {
            version: version.to_string(),
            reason: e.to_string(),
        })
}

fn validate(config: &Config) -> Result<(), String> {
    if config.environment.name.trim().is_empty() {
        return Err("environment.name must not be empty".to_string());
    }
    if config.environment.name.contains('/') {
        return Err("environment.name must not contain '/'".to_string());
    }
    check_interpreter_version(&config.environment.python).map_err(|e| e.to_string())?;
    if config.tests.command.is_empty() {
        return Err("tests.command must not be empty".to_string());
    }
    if config.tests.timeout_secs == 0 {
        return Err("tests.timeout_secs must be greater than zero".to_string());
    }
    if config.general.log_format != "text" && config.general.log_format != "json" {
        return Err(format!(
            "general.log_format must be \"text\" or \"json\", got \"{}\"",
            config.general.log_format
        ));
    }
    Ok(())
}
