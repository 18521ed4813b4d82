//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// CI environment indicators, checked in addition to `CI`
const CI_VARS: &[&str] = &[
    "CIRCLECI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TF_BUILD",
];

/// UI context that determines output behavior
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal() && !Self::in_ci(),
        }
    }

    /// Create a non-interactive context (for testing or explicit CI mode)
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Check if we should use fancy output (spinners, colors)
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    /// Whether a CI runner is driving this process
    pub fn in_ci() -> bool {
        std::env::var_os("CI").is_some() || CI_VARS.iter().any(|v| std::env::var_os(v).is_some())
    }
}
