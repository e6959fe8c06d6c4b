//! Process-level mutual exclusion via a pid lock file.
//!
//! A second invocation while one tick is active observes the live pid
//! and bails out; a lock left behind by a killed process is detected
//! as stale (the recorded pid no longer exists) and replaced. Release
//! is scoped: dropping the guard removes the lock file on every
//! normal and error exit path.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{BenchError, BenchResult};

/// Held for the duration of one orchestration pass.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock, replacing a stale one if its pid is dead.
    ///
    /// Returns [`BenchError::AlreadyRunning`] when the recorded pid is
    /// alive; callers treat that as a benign skip, not a fault.
    pub fn acquire(path: impl Into<PathBuf>) -> BenchResult<Self> {
        let path = path.into();

        match fs::read_to_string(&path) {
            Ok(content) => match content.trim().parse::<u32>() {
                Ok(pid) if pid_alive(pid) => {
                    return Err(BenchError::AlreadyRunning { pid });
                }
                Ok(pid) => {
                    debug!(pid, path = %path.display(), "removing stale lock");
                    remove_lock(&path)?;
                }
                Err(_) => {
                    warn!(path = %path.display(), "lock file held no pid, removing");
                    remove_lock(&path)?;
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(BenchError::io(
                    format!("reading lock file {}", path.display()),
                    err,
                ))
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BenchError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&path, std::process::id().to_string())
            .map_err(|e| BenchError::io(format!("writing lock file {}", path.display()), e))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove lock file");
        }
    }
}

fn remove_lock(path: &Path) -> BenchResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(BenchError::io(
            format!("removing stale lock {}", path.display()),
            err,
        )),
    }
}

/// Liveness probe: signal 0 reaches the process without touching it.
/// EPERM still means the pid exists.
#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // Non-unix hosts are not a deployment target; treat every recorded
    // pid as stale so a crashed run never wedges the scheduler.
    false
}
