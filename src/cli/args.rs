//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// envboot - cached CI environment bootstrap and headless test runner
///
/// Probes a long-lived cache directory, creates only what is missing,
/// always re-installs packages and the package under test, then runs the
/// test suite under a virtual display with a hard timeout.
#[derive(Parser, Debug)]
#[command(name = "envboot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ENVBOOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides cache.dir)
    #[arg(long, global = true, env = "ENVBOOT_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Working tree of the package under test (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what a bootstrap would do, without doing it
    Plan(PlanArgs),

    /// Create or update the cached environment
    Bootstrap,

    /// Run the test suite under a virtual display
    Test(TestArgs),

    /// Bootstrap, then run the test suite
    Run(TestArgs),

    /// Show the probed cache state
    Cache(FormatArgs),

    /// Manage the virtual display server
    Display(DisplayArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments shared by commands that only pick an output format
#[derive(Parser, Debug)]
pub struct FormatArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the test and run commands
#[derive(Parser, Debug)]
pub struct TestArgs {
    /// Test timeout in seconds (default: tests.timeout_secs)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Do not start a virtual display
    #[arg(long)]
    pub no_display: bool,
}

/// Arguments for the display command
#[derive(Parser, Debug)]
pub struct DisplayArgs {
    /// Subcommand for display
    #[command(subcommand)]
    pub action: DisplayAction,
}

/// Display subcommands
#[derive(Subcommand, Debug)]
pub enum DisplayAction {
    /// Start the display server in the background
    Start,

    /// Stop the display server recorded in the PID file
    Stop,

    /// Show whether the display server is running
    Status,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default envboot.toml into the project directory
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for plan and cache commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_plan() {
        let cli = Cli::parse_from(["envboot", "plan", "--format", "json"]);
        match cli.command {
            Commands::Plan(args) => assert!(matches!(args.format, OutputFormat::Json)),
            _ => panic!("expected Plan command"),
        }
    }

    #[test]
    fn cli_parses_run_with_timeout() {
        let cli = Cli::parse_from(["envboot", "run", "--timeout", "60", "--no-display"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.timeout, Some(60));
                assert!(args.no_display);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_rejects_zero_timeout() {
        assert!(Cli::try_parse_from(["envboot", "test", "--timeout", "0"]).is_err());
    }

    #[test]
    fn cli_parses_display_stop() {
        let cli = Cli::parse_from(["envboot", "display", "stop"]);
        match cli.command {
            Commands::Display(args) => assert!(matches!(args.action, DisplayAction::Stop)),
            _ => panic!("expected Display command"),
        }
    }

    #[test]
    fn cli_global_cache_dir() {
        let cli = Cli::parse_from(["envboot", "bootstrap", "--cache-dir", "/opt/miniconda"]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/opt/miniconda")));
        assert!(matches!(cli.command, Commands::Bootstrap));
    }

    #[test]
    fn cli_parses_config_init_force() {
        let cli = Cli::parse_from(["envboot", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Init { force }),
            }) => assert!(force),
            _ => panic!("expected Config Init command"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["envboot", "cache"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["envboot", "-vv", "cache"]);
        assert_eq!(cli.verbose, 2);
    }
}
