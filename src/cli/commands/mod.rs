//! CLI command implementations

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod display;
pub mod plan;
pub mod suite;

pub use bootstrap::execute as bootstrap;
pub use cache::execute as cache;
pub use config::execute as config;
pub use display::execute as display;
pub use plan::execute as plan;
pub use suite::{execute as test, run};

use crate::config::Config;
use crate::ledger::RunLedger;
use crate::pipeline::Pipeline;
use crate::toolchain::{CondaToolchain, Toolchain};
use std::path::PathBuf;

/// Resolved inputs shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    /// File the configuration was read from, or would be read from
    pub config_path: PathBuf,
    pub cache_dir: PathBuf,
    pub project_dir: PathBuf,
}

impl CommandContext {
    pub fn toolchain(&self) -> CondaToolchain {
        CondaToolchain::new(&self.cache_dir, &self.config.cache.installer_url)
    }

    pub fn pipeline<'a>(&'a self, toolchain: &'a dyn Toolchain, ledger: RunLedger) -> Pipeline<'a> {
        Pipeline::new(
            &self.config,
            &self.cache_dir,
            &self.project_dir,
            toolchain,
            ledger,
        )
    }

    /// Ledger for a run that changes the cache
    pub fn ledger(&self) -> RunLedger {
        RunLedger::new(&self.config, &self.cache_dir)
    }
}
