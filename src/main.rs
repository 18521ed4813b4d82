//! envboot - cached CI environment bootstrap
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use envboot::cli::args::{ConfigAction, ConfigArgs};
use envboot::cli::commands::{self, CommandContext};
use envboot::cli::{Cli, Commands};
use envboot::config::{Config, ConfigManager};
use envboot::error::{EnvbootError, EnvbootResult, ErrorCategory};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let category = e.category();
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let EnvbootError::StepFailed { source, .. } = &e {
                eprintln!("  {} {}", style("Caused by:").dim(), source);
            }
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if category != ErrorCategory::Internal {
                eprintln!("{} {}", style("Category:").dim(), category);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> EnvbootResult<()> {
    let cli = Cli::parse();

    let project_dir = match cli.project {
        Some(ref path) => path.clone(),
        None => std::env::current_dir()
            .map_err(|e| EnvbootError::io("getting current directory", e))?,
    };
    let project_dir = project_dir.canonicalize().map_err(|e| {
        EnvbootError::io(format!("resolving project {}", project_dir.display()), e)
    })?;

    // Init writes a config and must work even when the current one is broken
    if let Commands::Config(ConfigArgs {
        action: Some(ConfigAction::Init { force }),
    }) = cli.command
    {
        init_logging(cli.verbose, &Config::default());
        return commands::config::init_config(&project_dir, force).await;
    }

    let manager = match cli.config {
        Some(ref path) if !path.is_file() => return Err(EnvbootError::ConfigNotFound(path.clone())),
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => match ConfigManager::find_local_config(&project_dir) {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new(),
        },
    };
    let config = manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", manager.path().display());

    let cache_dir: PathBuf = cli
        .cache_dir
        .clone()
        .unwrap_or_else(|| config.cache.dir.clone());
    debug!("Cache directory {}", cache_dir.display());

    let ctx = CommandContext {
        config,
        config_path: manager.path().to_path_buf(),
        cache_dir,
        project_dir,
    };

    match cli.command {
        Commands::Plan(args) => commands::plan(args, &ctx).await,
        Commands::Bootstrap => commands::bootstrap(&ctx).await,
        Commands::Test(args) => commands::test(args, &ctx).await,
        Commands::Run(args) => commands::run(args, &ctx).await,
        Commands::Cache(args) => commands::cache(args, &ctx).await,
        Commands::Display(args) => commands::display(args, &ctx).await,
        Commands::Config(args) => commands::config(args, &ctx).await,
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` wins when
/// no `-v` is given.
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("envboot=warn")),
        1 => EnvFilter::new("envboot=info"),
        _ => EnvFilter::new("envboot=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
