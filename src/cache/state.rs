//! Cache state snapshot
//!
//! Observed facts about the cache directory, derived from disk on every run
//! and never carried over from a previous one.

use crate::error::{EnvbootError, EnvbootResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Relative path whose presence marks an installed base distribution
pub const BASE_MARKER: &str = "bin/conda";

/// Directory holding named environments
pub const ENVS_DIR: &str = "envs";

/// Metadata directory every completed environment carries
const ENV_META_DIR: &str = "conda-meta";

/// Observed state of the persistent cache directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
    /// Whether the base distribution is installed
    pub base_distribution_present: bool,
    /// Names of fully created environments
    pub named_environments: BTreeSet<String>,
}

impl CacheState {
    /// Create a snapshot from already-known facts
    pub fn new<I, S>(base_distribution_present: bool, named_environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base_distribution_present,
            named_environments: named_environments.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether an environment with this name exists
    pub fn has_environment(&self, name: &str) -> bool {
        self.named_environments.contains(name)
    }

    /// Probe the cache directory.
    ///
    /// A missing directory is an empty cache. Environment directories without
    /// `conda-meta` are half-created and are not reported.
    pub fn probe(cache_dir: &Path) -> EnvbootResult<Self> {
        let base_distribution_present = cache_dir.join(BASE_MARKER).is_file();
        let named_environments = list_environments(&cache_dir.join(ENVS_DIR))?;

        debug!(
            "Probed cache {}: base={}, environments={:?}",
            cache_dir.display(),
            base_distribution_present,
            named_environments
        );

        Ok(Self {
            base_distribution_present,
            named_environments,
        })
    }
}

fn list_environments(envs_dir: &Path) -> EnvbootResult<BTreeSet<String>> {
    let entries = match fs::read_dir(envs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => {
            return Err(EnvbootError::io(
                format!("reading environments directory {}", envs_dir.display()),
                e,
            ))
        }
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| EnvbootError::io("reading environment entry", e))?;
        let path = entry.path();
        if !path.join(ENV_META_DIR).is_dir() {
            debug!("Ignoring incomplete environment at {}", path.display());
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.insert(name.to_string());
        }
    }

    Ok(names)
}
