//! Toolchain adapters for environment bootstrap
//!
//! The planner decides what to do; a `Toolchain` knows how. `CondaToolchain`
//! drives a Miniconda-style distribution through its command-line tools.

mod conda;

pub use conda::CondaToolchain;

use crate::error::{EnvbootError, EnvbootResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::warn;

/// External collaborators the plan executor drives
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Fetch and install the base distribution into `prefix`
    async fn install_distribution(&self, prefix: &Path) -> EnvbootResult<()>;

    /// Create an isolated environment with the given interpreter
    async fn create_environment(&self, name: &str, interpreter_version: &str)
        -> EnvbootResult<()>;

    /// Install packages through the environment manager's resolver
    async fn install_core_packages(&self, env: &str, packages: &[String]) -> EnvbootResult<()>;

    /// Install packages with pip, in order; any failure fails the whole call
    async fn install_pip_packages(&self, env: &str, packages: &[String]) -> EnvbootResult<()>;

    /// Register a working tree so imports resolve to the live source
    async fn install_editable(&self, env: &str, tree: &Path) -> EnvbootResult<()>;

    /// Build a command that runs `argv` inside `env`
    fn env_command(&self, env: &str, argv: &[String]) -> Command;

    /// Human-readable toolchain name for display
    fn name(&self) -> &'static str;
}

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of command output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// Stream two output pipes line by line, calling `on_line` for each line.
///
/// Lines are split on `\n` and decoded lossily, so a stray non-UTF-8 byte
/// never stops a pipe from being drained. Returns once both pipes hit EOF.
pub(crate) async fn stream_output<O, E>(
    stdout: O,
    stderr: E,
    on_line: &(dyn Fn(&str) + Send + Sync),
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut stdout_buf), if !stdout_done => {
                stdout_done = take_line(read, &mut stdout_buf, "stdout", on_line);
            }
            read = stderr.read_until(b'\n', &mut stderr_buf), if !stderr_done => {
                stderr_done = take_line(read, &mut stderr_buf, "stderr", on_line);
            }
        }
    }
}

/// Emit the buffered line; returns true at EOF
fn take_line(
    read: std::io::Result<usize>,
    buf: &mut Vec<u8>,
    pipe: &str,
    on_line: &(dyn Fn(&str) + Send + Sync),
) -> bool {
    match read {
        Ok(0) => {
            if !buf.is_empty() {
                emit(buf, on_line);
            }
            true
        }
        Ok(_) => {
            if buf.ends_with(b"\n") {
                emit(buf, on_line);
            }
            false
        }
        Err(e) => {
            warn!("Reading child {} failed: {}", pipe, e);
            false
        }
    }
}

fn emit(buf: &mut Vec<u8>, on_line: &(dyn Fn(&str) + Send + Sync)) {
    let line = String::from_utf8_lossy(buf).into_owned();
    on_line(line.trim_end_matches(['\n', '\r']));
    buf.clear();
}

/// Take the piped stdout and stderr handles from a spawned child
pub(crate) fn take_pipes(
    child: &mut Child,
) -> EnvbootResult<(tokio::process::ChildStdout, tokio::process::ChildStderr)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EnvbootError::Internal("child stdout not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| EnvbootError::Internal("child stderr not piped".to_string()))?;
    Ok((stdout, stderr))
}
