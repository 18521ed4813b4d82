//! Error types for envboot
//!
//! All modules use `EnvbootResult<T>` as their return type.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for envboot operations
pub type EnvbootResult<T> = Result<T, EnvbootError>;

/// All errors that can occur in envboot
#[derive(Error, Debug)]
pub enum EnvbootError {
    // Bootstrap errors
    #[error("Failed to download distribution installer from {url}: {reason}")]
    InstallerDownload { url: String, reason: String },

    #[error("Base distribution install into {path} failed: {reason}")]
    DistributionInstall { path: PathBuf, reason: String },

    #[error("Failed to create environment {name} (python {python}): {reason}")]
    EnvironmentCreate {
        name: String,
        python: String,
        reason: String,
    },

    // Package errors
    #[error("{layer} package install into {env} failed: {reason}")]
    PackageInstall {
        layer: PackageLayer,
        env: String,
        reason: String,
    },

    #[error("Plan step {step} failed")]
    StepFailed {
        step: String,
        #[source]
        source: Box<EnvbootError>,
    },

    // Display errors
    #[error("Display server :{display} failed to start: {reason}")]
    DisplayStart { display: u32, reason: String },

    #[error("Failed to stop display server (pid {pid}): {reason}")]
    DisplayStop { pid: i32, reason: String },

    #[error("Invalid PID file {path}: {reason}")]
    PidFileInvalid { path: PathBuf, reason: String },

    // Test errors
    #[error("Test suite failed with exit code {code}{}", .summary.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
    TestsFailed { code: i32, summary: Option<String> },

    #[error("Test suite killed by signal {signal}{}", .summary.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
    TestsSignaled { signal: i32, summary: Option<String> },

    #[error("Test suite timed out after {}s", .after.as_secs())]
    TestTimeout { after: Duration },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid interpreter version {version}: {reason}")]
    InterpreterVersion { version: String, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Configuration file already exists: {0}")]
    ConfigExists(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which installer layer a package failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLayer {
    /// Packages resolved by the environment manager
    Core,
    /// Packages installed by pip, including VCS references
    Pip,
    /// The working tree installed in editable mode
    UnderTest,
}

impl fmt::Display for PackageLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Pip => write!(f, "pip-layer"),
            Self::UnderTest => write!(f, "under-test"),
        }
    }
}

/// Coarse failure category reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Bootstrap,
    Package,
    Display,
    TestFailure,
    TestTimeout,
    Config,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bootstrap => "bootstrap",
            Self::Package => "package",
            Self::Display => "display",
            Self::TestFailure => "test-failure",
            Self::TestTimeout => "test-timeout",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

impl EnvbootError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Classify the error. Step failures report the category of their cause.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StepFailed { source, .. } => source.category(),
            Self::InstallerDownload { .. }
            | Self::DistributionInstall { .. }
            | Self::EnvironmentCreate { .. } => ErrorCategory::Bootstrap,
            Self::PackageInstall { .. } => ErrorCategory::Package,
            Self::DisplayStart { .. } | Self::DisplayStop { .. } | Self::PidFileInvalid { .. } => {
                ErrorCategory::Display
            }
            Self::TestsFailed { .. } | Self::TestsSignaled { .. } => ErrorCategory::TestFailure,
            Self::TestTimeout { .. } => ErrorCategory::TestTimeout,
            Self::ConfigInvalid { .. }
            | Self::InterpreterVersion { .. }
            | Self::ConfigDirCreate { .. }
            | Self::ConfigNotFound(_)
            | Self::ConfigExists(_)
            | Self::TomlSerialize(_) => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StepFailed { source, .. } => source.hint(),
            Self::InstallerDownload { .. } => Some("Check network access or set cache.installer_url"),
            Self::PackageInstall { .. } => {
                Some("The environment is left as-is; the next run re-installs packages")
            }
            Self::DisplayStart { .. } => Some("Is Xvfb installed? Set display.program to override"),
            Self::TestTimeout { .. } => Some("Raise tests.timeout_secs or pass --timeout"),
            Self::ConfigNotFound(_) => Some("Run: envboot config init"),
            Self::ConfigExists(_) => Some("Use --force to overwrite"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EnvbootError::EnvironmentCreate {
            name: "circleenv".to_string(),
            python: "3.6.0".to_string(),
            reason: "solver failed".to_string(),
        };
        assert!(err.to_string().contains("circleenv"));
        assert!(err.to_string().contains("3.6.0"));
    }

    #[test]
    fn step_failure_reports_cause_category() {
        let err = EnvbootError::StepFailed {
            step: "install-pip-packages".to_string(),
            source: Box::new(EnvbootError::PackageInstall {
                layer: PackageLayer::Pip,
                env: "circleenv".to_string(),
                reason: "no matching distribution".to_string(),
            }),
        };
        assert_eq!(err.category(), ErrorCategory::Package);
        assert!(err.to_string().contains("install-pip-packages"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn timeout_is_distinct_from_failure() {
        let timeout = EnvbootError::TestTimeout {
            after: Duration::from_secs(1500),
        };
        let failed = EnvbootError::TestsFailed {
            code: 1,
            summary: Some("3 passed, 1 failed".to_string()),
        };
        assert_eq!(timeout.category(), ErrorCategory::TestTimeout);
        assert_eq!(failed.category(), ErrorCategory::TestFailure);
        assert_eq!(timeout.to_string(), "Test suite timed out after 1500s");
        assert!(failed.to_string().contains("(3 passed, 1 failed)"));
    }

    #[test]
    fn crashed_suite_is_a_test_failure() {
        let err = EnvbootError::TestsSignaled {
            signal: 11,
            summary: None,
        };
        assert_eq!(err.category(), ErrorCategory::TestFailure);
        assert_eq!(err.to_string(), "Test suite killed by signal 11");
    }

    #[test]
    fn package_layer_display() {
        assert_eq!(PackageLayer::Pip.to_string(), "pip-layer");
        assert_eq!(PackageLayer::Core.to_string(), "core");
    }
}
