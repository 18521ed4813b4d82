//! Virtual display lifecycle
//!
//! GUI-touching tests need an X display. A headless framebuffer server is
//! started in the background before tests run and stopped afterwards,
//! whatever the test outcome.
//!
//! # Lifecycle
//!
//! | State | Meaning |
//! |-------|---------|
//! | Unacquired | Nothing started yet |
//! | Starting | Process spawned, watching for an early exit |
//! | Running | Process survived the startup grace window |
//! | Released | Terminated and PID file removed |
//!
//! The server runs in its own process group and is not tied to the
//! lifetime of envboot: if envboot is killed, the server keeps running and
//! the PID file is what `envboot display stop` uses to reap it.

pub mod pidfile;

use crate::config::schema::DisplayConfig;
use crate::error::{EnvbootError, EnvbootResult};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lifecycle state of a display resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Unacquired,
    Starting,
    Running,
    Released,
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unacquired => write!(f, "unacquired"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Released => write!(f, "released"),
        }
    }
}

/// A background display server identified by display number and PID file
#[derive(Debug, Clone, Serialize)]
pub struct DisplayResource {
    number: u32,
    pid_file: PathBuf,
    geometry: String,
    pid: Option<i32>,
    state: DisplayState,
}

impl DisplayResource {
    /// Describe a display that has not been started
    pub fn new(number: u32, pid_file: impl Into<PathBuf>, geometry: impl Into<String>) -> Self {
        Self {
            number,
            pid_file: pid_file.into(),
            geometry: geometry.into(),
            pid: None,
            state: DisplayState::Unacquired,
        }
    }

    /// Adopt a server recorded in a PID file, e.g. one orphaned by a killed run.
    ///
    /// Returns `None` when there is no PID file.
    pub async fn from_pid_file(number: u32, pid_file: &Path) -> EnvbootResult<Option<Self>> {
        let Some(pid) = pidfile::read(pid_file).await? else {
            return Ok(None);
        };

        Ok(Some(Self {
            number,
            pid_file: pid_file.to_path_buf(),
            geometry: String::new(),
            pid: Some(pid),
            state: DisplayState::Running,
        }))
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn geometry(&self) -> &str {
        &self.geometry
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// Value for the `DISPLAY` environment variable
    pub fn display_env(&self) -> String {
        format!(":{}", self.number)
    }

    /// Stop the server using the recorded PID file.
    ///
    /// Idempotent: releasing twice, or releasing a server that already
    /// exited, succeeds without doing anything.
    pub async fn release(&mut self) -> EnvbootResult<()> {
        if self.state == DisplayState::Released {
            debug!("Display {} already released", self.display_env());
            return Ok(());
        }

        let recorded = pidfile::read(&self.pid_file).await?;
        let pid = match (self.pid, recorded) {
            (Some(ours), Some(theirs)) if ours != theirs => {
                warn!(
                    "PID file {} names pid {} but display {} was started as pid {}; stopping pid {}",
                    self.pid_file.display(),
                    theirs,
                    self.display_env(),
                    ours,
                    ours
                );
                Some(ours)
            }
            (ours, recorded) => ours.or(recorded),
        };

        match pid {
            Some(pid) => {
                if pidfile::terminate(pid)? {
                    info!("Stopped display server {} (pid {})", self.display_env(), pid);
                } else {
                    debug!("Display server pid {} already exited", pid);
                }
            }
            None => debug!("No PID recorded for display {}", self.display_env()),
        }

        pidfile::remove(&self.pid_file).await?;
        self.state = DisplayState::Released;
        Ok(())
    }
}

/// Starts display servers
#[derive(Debug, Clone)]
pub struct DisplayServer {
    program: String,
    flags: Vec<String>,
    startup_grace: Duration,
}

impl DisplayServer {
    pub fn new(program: impl Into<String>, flags: Vec<String>, startup_grace: Duration) -> Self {
        Self {
            program: program.into(),
            flags,
            startup_grace,
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.flags.clone(),
            Duration::from_millis(config.startup_grace_ms),
        )
    }

    /// Server arguments: `:<n> -screen 0 <geometry> <flags...>`
    pub fn args(&self, number: u32, geometry: &str) -> Vec<String> {
        let mut args = vec![
            format!(":{}", number),
            "-screen".to_string(),
            "0".to_string(),
            geometry.to_string(),
        ];
        args.extend(self.flags.iter().cloned());
        args
    }

    /// Start a server on `:number` and record its PID in `pid_file`.
    ///
    /// Blocks only for the startup grace window; an exit inside that window
    /// is a start failure. There is no readiness probe beyond that and no
    /// retry.
    pub async fn acquire(
        &self,
        number: u32,
        pid_file: &Path,
        geometry: &str,
    ) -> EnvbootResult<DisplayResource> {
        let mut resource = DisplayResource::new(number, pid_file, geometry);
        let start_error = |reason: String| EnvbootError::DisplayStart {
            display: number,
            reason,
        };

        if let Some(existing) = pidfile::read(pid_file).await? {
            if pidfile::is_alive(existing) {
                return Err(start_error(format!(
                    "already running as pid {} (see {})",
                    existing,
                    pid_file.display()
                )));
            }
            debug!("Removing stale PID file for pid {}", existing);
            pidfile::remove(pid_file).await?;
        }

        resource.state = DisplayState::Starting;
        if let Some(parent) = pid_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EnvbootError::io(format!("creating {}", parent.display()), e))?;
        }
        let log_path = log_path(pid_file);
        let log = std::fs::File::create(&log_path)
            .map_err(|e| EnvbootError::io(format!("creating {}", log_path.display()), e))?;

        let args = self.args(number, geometry);
        debug!("Starting display server: {} {:?}", self.program, args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log));
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| start_error(format!("spawning {}: {}", self.program, e)))?;
        let pid = child
            .id()
            .ok_or_else(|| start_error("process exited before reporting a pid".to_string()))?
            as i32;

        pidfile::write(pid_file, pid).await?;
        resource.pid = Some(pid);

        tokio::time::sleep(self.startup_grace).await;

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                pidfile::remove(pid_file).await?;
                let output = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
                return Err(start_error(format!(
                    "exited during startup ({}){}",
                    status,
                    if output.trim().is_empty() {
                        String::new()
                    } else {
                        format!(": {}", output.trim())
                    }
                )));
            }
            Err(e) => warn!("Could not poll display server pid {}: {}", pid, e),
        }

        resource.state = DisplayState::Running;
        info!("Display {} running (pid {})", resource.display_env(), pid);
        Ok(resource)
    }
}

/// Server output goes next to the PID file
fn log_path(pid_file: &Path) -> PathBuf {
    let mut name = pid_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".log");
    pid_file.with_file_name(name)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn server(program: String) -> DisplayServer {
        DisplayServer::new(program, vec!["-ac".to_string()], Duration::from_millis(300))
    }

    #[test]
    fn args_match_xvfb_layout() {
        let server = DisplayServer::from_config(&DisplayConfig::default());
        let args = server.args(99, "1400x900x24");
        assert_eq!(
            args,
            vec![
                ":99", "-screen", "0", "1400x900x24", "-ac", "+extension", "GLX", "+render",
                "-noreset"
            ]
        );
    }

    #[test]
    fn log_path_next_to_pid_file() {
        assert_eq!(
            log_path(Path::new("/tmp/custom_xvfb_99.pid")),
            PathBuf::from("/tmp/custom_xvfb_99.pid.log")
        );
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "fake-xvfb", "exec sleep 30");
        let pid_file = dir.path().join("xvfb.pid");

        let mut display = server(program)
            .acquire(99, &pid_file, "1400x900x24")
            .await
            .unwrap();

        assert_eq!(display.state(), DisplayState::Running);
        assert_eq!(display.display_env(), ":99");
        let pid = display.pid().unwrap();
        assert_eq!(pidfile::read(&pid_file).await.unwrap(), Some(pid));

        display.release().await.unwrap();
        assert_eq!(display.state(), DisplayState::Released);
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn release_ignores_rewritten_pid_file() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "fake-xvfb", "exec sleep 30");
        let pid_file = dir.path().join("xvfb.pid");

        let mut display = server(program).acquire(95, &pid_file, "640x480x24").await.unwrap();

        // Someone else's process now owns the recorded pid
        let mut bystander = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let bystander_pid = bystander.id() as i32;
        pidfile::write(&pid_file, bystander_pid).await.unwrap();

        display.release().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let untouched = bystander.try_wait().unwrap().is_none();
        bystander.kill().unwrap();
        bystander.wait().unwrap();
        assert!(untouched);
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn release_twice_is_noop() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "fake-xvfb", "exec sleep 30");
        let pid_file = dir.path().join("xvfb.pid");

        let mut display = server(program).acquire(98, &pid_file, "640x480x24").await.unwrap();

        display.release().await.unwrap();
        display.release().await.unwrap();
        assert_eq!(display.state(), DisplayState::Released);
    }

    #[tokio::test]
    async fn release_unacquired_is_ok() {
        let dir = TempDir::new().unwrap();
        let mut display = DisplayResource::new(97, dir.path().join("none.pid"), "640x480x24");

        display.release().await.unwrap();
        assert_eq!(display.state(), DisplayState::Released);
    }

    #[tokio::test]
    async fn early_exit_is_start_failure() {
        let dir = TempDir::new().unwrap();
        let program = script(
            dir.path(),
            "broken-xvfb",
            "echo 'Fatal server error: no screens' >&2; exit 1",
        );
        let pid_file = dir.path().join("xvfb.pid");

        let err = server(program)
            .acquire(99, &pid_file, "1400x900x24")
            .await
            .unwrap_err();

        assert!(matches!(err, EnvbootError::DisplayStart { display: 99, .. }));
        assert!(err.to_string().contains("no screens"));
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn missing_program_is_start_failure() {
        let dir = TempDir::new().unwrap();
        let err = server(dir.path().join("no-such-xvfb").display().to_string())
            .acquire(99, &dir.path().join("xvfb.pid"), "1400x900x24")
            .await
            .unwrap_err();

        assert!(matches!(err, EnvbootError::DisplayStart { .. }));
    }

    #[tokio::test]
    async fn refuses_second_server_on_live_pid() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("xvfb.pid");
        pidfile::write(&pid_file, std::process::id() as i32).await.unwrap();

        let program = script(dir.path(), "fake-xvfb", "exec sleep 30");
        let err = server(program)
            .acquire(99, &pid_file, "1400x900x24")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("already running"));
    }

    #[tokio::test]
    async fn orphan_reaped_from_pid_file() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "fake-xvfb", "exec sleep 30");
        let pid_file = dir.path().join("xvfb.pid");

        // Simulate a run that was killed without releasing
        let display = server(program).acquire(96, &pid_file, "640x480x24").await.unwrap();
        drop(display);

        let mut adopted = DisplayResource::from_pid_file(96, &pid_file)
            .await
            .unwrap()
            .unwrap();
        adopted.release().await.unwrap();

        assert!(!pid_file.exists());
        assert!(DisplayResource::from_pid_file(96, &pid_file)
            .await
            .unwrap()
            .is_none());
    }
}
