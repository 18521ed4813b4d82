//! Persistent cache directory inspection
//!
//! The cache directory is reused across CI runs to avoid repeating the
//! expensive base distribution install. Its contents are only partially
//! known at the start of a run, so every run probes it fresh.
//!
//! # Layout
//!
//! | Path | Meaning |
//! |------|---------|
//! | `bin/conda` | Base distribution installed |
//! | `envs/<name>/conda-meta/` | Named environment created |
//! | `envboot-runs.log` | Run ledger (JSON lines) |

pub mod state;

pub use state::{CacheState, BASE_MARKER, ENVS_DIR};
