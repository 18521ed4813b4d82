//! Configuration schema for envboot
//!
//! Configuration is read from `envboot.toml` in the project, or from
//! `~/.config/envboot/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Persistent cache settings
    pub cache: CacheConfig,

    /// Target environment
    pub environment: EnvironmentConfig,

    /// Virtual display settings
    pub display: DisplayConfig,

    /// Test runner settings
    pub tests: TestsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append run events to the ledger in the cache directory
    pub run_ledger: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            run_ledger: true,
        }
    }
}

/// Persistent cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the base distribution and named environments
    pub dir: PathBuf,

    /// Where the distribution installer script is fetched from
    pub installer_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("miniconda"),
            installer_url: "https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-x86_64.sh"
                .to_string(),
        }
    }
}

/// Declared target environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Named environment to create or reuse
    pub name: String,

    /// Interpreter version for the environment
    pub python: String,

    /// Packages installed through the environment manager
    pub core_packages: Vec<String>,

    /// Packages installed through pip, in order
    pub pip_packages: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: "circleenv".to_string(),
            python: "3.6.0".to_string(),
            core_packages: vec!["numpy".to_string(), "scipy".to_string(), "pip".to_string()],
            pip_packages: vec!["pytest".to_string()],
        }
    }
}

/// Virtual display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// X display number
    pub number: u32,

    /// Screen geometry (WxHxDEPTH)
    pub geometry: String,

    /// PID file used for lifecycle control (default: /tmp/custom_xvfb_<number>.pid)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,

    /// Display server executable
    pub program: String,

    /// Extra flags passed after the screen geometry
    pub flags: Vec<String>,

    /// How long to watch for an early exit after spawning
    pub startup_grace_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            number: 99,
            geometry: "1400x900x24".to_string(),
            pid_file: None,
            program: "Xvfb".to_string(),
            flags: vec![
                "-ac".to_string(),
                "+extension".to_string(),
                "GLX".to_string(),
                "+render".to_string(),
                "-noreset".to_string(),
            ],
            startup_grace_ms: 200,
        }
    }
}

impl DisplayConfig {
    /// Configured PID file, or one named after the display number
    pub fn pid_file(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/tmp/custom_xvfb_{}.pid", self.number)))
    }
}

/// Test runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    /// Test command, run inside the named environment
    pub command: Vec<String>,

    /// Wall-clock limit for the whole suite
    pub timeout_secs: u64,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            command: vec!["pytest".to_string()],
            timeout_secs: 1500,
        }
    }
}
