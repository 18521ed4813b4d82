//! Test suite execution under a wall-clock timeout
//!
//! The suite is one blocking operation. When the timeout fires the whole
//! process group is killed; there is no graceful early abort. A timeout is
//! reported separately from a failing suite.

use crate::error::{EnvbootError, EnvbootResult};
use crate::toolchain::{stream_output, take_pipes};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Counts parsed from a pytest-style summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
    pub errors: u32,
    pub skipped: u32,
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.passed, "passed"),
            (self.failed, "failed"),
            (self.errors, "errors"),
            (self.skipped, "skipped"),
        ]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{} {}", n, label))
        .collect();

        if parts.is_empty() {
            write!(f, "no tests ran")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Result of one test suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum TestOutcome {
    Passed {
        summary: Option<TestSummary>,
        elapsed: Duration,
    },
    Failed {
        exit_code: i32,
        summary: Option<TestSummary>,
        elapsed: Duration,
    },
    /// Killed by a signal, e.g. a segfault in a GL test
    Signaled {
        signal: i32,
        summary: Option<TestSummary>,
        elapsed: Duration,
    },
    TimedOut {
        after: Duration,
    },
}

impl TestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// Turn failures into their error category
    pub fn into_result(self) -> EnvbootResult<Option<TestSummary>> {
        match self {
            Self::Passed { summary, .. } => Ok(summary),
            Self::Failed {
                exit_code, summary, ..
            } => Err(EnvbootError::TestsFailed {
                code: exit_code,
                summary: summary.map(|s| s.to_string()),
            }),
            Self::Signaled {
                signal, summary, ..
            } => Err(EnvbootError::TestsSignaled {
                signal,
                summary: summary.map(|s| s.to_string()),
            }),
            Self::TimedOut { after } => Err(EnvbootError::TestTimeout { after }),
        }
    }
}

/// How long output may keep flowing after the test command exits
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs the configured test command
#[derive(Debug, Clone)]
pub struct TestRunner {
    timeout: Duration,
}

impl TestRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `cmd` in `workdir` with `DISPLAY` set, streaming each output line
    /// to `on_output`.
    pub async fn run(
        &self,
        mut cmd: Command,
        workdir: &Path,
        display: Option<&str>,
        on_output: &(dyn Fn(&str) + Send + Sync),
    ) -> EnvbootResult<TestOutcome> {
        cmd.current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(display) = display {
            cmd.env("DISPLAY", display);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Running tests: {:?} (timeout {}s)", cmd, self.timeout.as_secs());
        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| EnvbootError::command_failed("test command", e))?;
        let pid = child.id();
        let (stdout, stderr) = take_pipes(&mut child)?;

        let lines = Mutex::new(Vec::new());
        let collect = |line: &str| {
            on_output(line);
            if let Ok(mut lines) = lines.lock() {
                lines.push(line.to_string());
            }
        };
        let drain = stream_output(stdout, stderr, &collect);
        tokio::pin!(drain);
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut drained = false;
        let status = loop {
            tokio::select! {
                _ = &mut drain, if !drained => drained = true,
                status = child.wait() => {
                    break status.map_err(|e| EnvbootError::io("waiting for test command", e))?;
                }
                _ = &mut deadline => {
                    warn!("Test suite exceeded {}s, killing", self.timeout.as_secs());
                    if let Some(pid) = pid {
                        kill_group(pid);
                    }
                    if let Err(e) = child.kill().await {
                        debug!("Test process already gone: {}", e);
                    }
                    return Ok(TestOutcome::TimedOut {
                        after: self.timeout,
                    });
                }
            }
        };

        // Leftover background processes may hold the pipes open
        if !drained && tokio::time::timeout(DRAIN_GRACE, &mut drain).await.is_err() {
            warn!("Test command exited but its output pipes are still open, killing leftovers");
            if let Some(pid) = pid {
                kill_group(pid);
            }
            if tokio::time::timeout(DRAIN_GRACE, &mut drain).await.is_err() {
                warn!("Giving up on test output after the command exited");
            }
        }

        let lines = lines
            .lock()
            .map(|mut lines| std::mem::take(&mut *lines))
            .unwrap_or_default();
        let elapsed = started.elapsed();
        let summary = find_summary(&lines);
        info!(
            "Test suite finished in {:.1}s: {}",
            elapsed.as_secs_f64(),
            summary.map(|s| s.to_string()).unwrap_or_else(|| status.to_string())
        );

        if status.success() {
            return Ok(TestOutcome::Passed { summary, elapsed });
        }

        if let Some(exit_code) = status.code() {
            return Ok(TestOutcome::Failed {
                exit_code,
                summary,
                elapsed,
            });
        }

        Ok(TestOutcome::Signaled {
            signal: exit_signal(&status),
            summary,
            elapsed,
        })
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or_default()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> i32 {
    0
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    // The child leads its own group; take the whole tree down with it
    let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "Killing process group {} failed: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

/// Find the last summary line in the output
pub fn find_summary(lines: &[String]) -> Option<TestSummary> {
    lines.iter().rev().find_map(|line| parse_summary(line))
}

/// Parse a pytest summary line such as
/// `==== 3 passed, 1 failed, 2 skipped in 4.21s ====`
pub fn parse_summary(line: &str) -> Option<TestSummary> {
    let trimmed = line.trim().trim_matches('=').trim();
    let (counts, duration) = trimmed.rsplit_once(" in ")?;
    let duration = duration.split_whitespace().next()?;
    duration.strip_suffix('s')?.parse::<f64>().ok()?;

    let mut summary = TestSummary::default();
    let mut recognized = false;

    for part in counts.split(", ") {
        let (n, word) = part.trim().split_once(' ')?;
        let n: u32 = n.parse().ok()?;
        match word {
            "passed" => summary.passed = n,
            "failed" => summary.failed = n,
            "error" | "errors" => summary.errors = n,
            "skipped" => summary.skipped = n,
            "xfailed" | "xpassed" | "warning" | "warnings" | "deselected" | "rerun" => {}
            _ => return None,
        }
        recognized = true;
    }

    recognized.then_some(summary)
}
