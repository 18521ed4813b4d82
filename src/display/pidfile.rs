//! PID file handling and process signalling

use crate::error::{EnvbootError, EnvbootResult};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Read a PID file. Returns `None` if the file does not exist.
pub async fn read(path: &Path) -> EnvbootResult<Option<i32>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(EnvbootError::io(
                format!("reading PID file {}", path.display()),
                e,
            ))
        }
    };

    let pid: i32 = content
        .trim()
        .parse()
        .map_err(|_| EnvbootError::PidFileInvalid {
            path: path.to_path_buf(),
            reason: format!("not a process id: {:?}", content.trim()),
        })?;

    if pid <= 0 {
        return Err(EnvbootError::PidFileInvalid {
            path: path.to_path_buf(),
            reason: format!("not a process id: {}", pid),
        });
    }

    Ok(Some(pid))
}

/// Write `pid` to `path`, creating parent directories
pub async fn write(path: &Path, pid: i32) -> EnvbootResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| EnvbootError::io(format!("creating {}", parent.display()), e))?;
    }
    fs::write(path, format!("{}\n", pid))
        .await
        .map_err(|e| EnvbootError::io(format!("writing PID file {}", path.display()), e))
}

/// Remove a PID file; a missing file is fine
pub async fn remove(path: &Path) -> EnvbootResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EnvbootError::io(
            format!("removing PID file {}", path.display()),
            e,
        )),
    }
}

/// Whether a process with this id exists
#[cfg(unix)]
pub fn is_alive(pid: i32) -> bool {
    // Signal 0 performs the permission and existence checks only
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_alive(_pid: i32) -> bool {
    false
}

/// Send SIGTERM. Returns `Ok(false)` if the process was already gone.
#[cfg(unix)]
pub fn terminate(pid: i32) -> EnvbootResult<bool> {
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(EnvbootError::DisplayStop {
            pid,
            reason: err.to_string(),
        })
    }
}

#[cfg(not(unix))]
pub fn terminate(pid: i32) -> EnvbootResult<bool> {
    Err(EnvbootError::DisplayStop {
        pid,
        reason: "signals are not supported on this platform".to_string(),
    })
}
