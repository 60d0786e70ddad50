//! Single-instance lease enforcement.
//!
//! The lease is a single-line PID file. A holder is considered live only if
//! the recorded process still exists. A stale lease left behind by a crash
//! is reclaimed on the next acquire instead of blocking restarts forever.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("scheduler already running (pid {pid})")]
    AlreadyRunning { pid: u32 },
    #[error("lease io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive process lease. Released explicitly on clean shutdown; `Drop`
/// removes the file as a backstop.
#[derive(Debug)]
pub struct ProcessGuard {
    path: PathBuf,
    held: bool,
}

impl ProcessGuard {
    /// Acquire the lease, reclaiming it if the recorded holder is dead.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, GuardError> {
        let path = path.into();

        if let Some(holder) = read_lease(&path) {
            if pid_alive(holder) {
                return Err(GuardError::AlreadyRunning { pid: holder });
            }
            warn!(
                pid = holder,
                lease = %path.display(),
                "reclaiming stale lease from dead process {}",
                holder
            );
            fs::remove_file(&path)?;
        } else if path.exists() {
            // Unparsable contents count as stale.
            warn!(lease = %path.display(), "removing unreadable lease file");
            fs::remove_file(&path)?;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let pid = std::process::id();
        fs::write(&path, format!("{pid}\n"))?;
        info!(pid, lease = %path.display(), "lease acquired");

        Ok(Self { path, held: true })
    }

    /// Remove the lease on clean shutdown.
    pub fn release(mut self) -> Result<(), GuardError> {
        self.remove_file()?;
        self.held = false;
        Ok(())
    }

    fn remove_file(&self) -> Result<(), GuardError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.held {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn read_lease(path: &Path) -> Option<u32> {
    let raw = fs::read_to_string(path).ok()?;
    raw.trim().parse().ok()
}

/// Liveness probe. `/proc/<pid>` existence rather than a signal probe keeps
/// this permission-free; Linux only.
fn pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}
