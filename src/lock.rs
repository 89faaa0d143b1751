//! Cross-process exclusive access to the framebuffer.
//!
//! Ownership is a marker file holding the owner's PID in decimal. A marker
//! whose PID no longer names a running process is stale and is replaced.
//! [`LockToken`] is the guard: the marker is removed when it is released or
//! dropped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LockError;

/// Marker used when none is configured.
pub const DEFAULT_LOCK_PATH: &str = "/var/lock/fbrender.lock";

/// A lock marker location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceLock {
    path: PathBuf,
}

impl Default for DeviceLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_PATH)
    }
}

impl DeviceLock {
    /// Lock using the marker file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock for the current process.
    ///
    /// Fails with [`LockError::DeviceBusy`] if a live process holds it,
    /// including when another process publishes its marker between the stale
    /// check and our own. An empty marker is treated as held by an unknown
    /// owner and reported with PID 0.
    ///
    /// The marker is written to a temporary file next to `path` and then
    /// linked into place without replacing anything, so it is never visible
    /// without its PID.
    pub fn acquire(&self) -> Result<LockToken, LockError> {
        let path = &self.path;

        match read_owner(path) {
            Ok(Some(pid)) if is_process_alive(pid) => return Err(LockError::DeviceBusy(pid)),
            Ok(Some(pid)) => {
                log::info!("removing stale lock from PID {pid}");
                remove_marker(path)?;
            }
            Ok(None) => {}
            Err(Unreadable::Empty) => return Err(LockError::DeviceBusy(0)),
            Err(Unreadable::Garbage(content)) => {
                log::warn!("removing lock file {} with invalid PID {content:?}", path.display());
                remove_marker(path)?;
            }
            Err(Unreadable::Io(source)) => {
                return Err(LockError::Io {
                    path: path.clone(),
                    source,
                });
            }
        }

        publish(path, std::process::id())?;

        log::info!("acquired exclusive framebuffer access ({})", path.display());
        Ok(LockToken {
            path: path.clone(),
            released: false,
        })
    }
}

/// Proof of holding the device lock. Releases the lock on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct LockToken {
    path: PathBuf,
    released: bool,
}

impl LockToken {
    /// Marker file this token owns.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`LockToken::release`] has already run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the marker. Later calls do nothing.
    pub fn release(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        remove_marker(&self.path)?;
        self.released = true;
        log::info!("released framebuffer lock");
        Ok(())
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("{e}");
        }
    }
}

/// Take the lock at `path`.
pub fn acquire(path: impl Into<PathBuf>) -> Result<LockToken, LockError> {
    DeviceLock::new(path).acquire()
}

/// Release `token` now rather than at end of scope.
pub fn release(mut token: LockToken) -> Result<(), LockError> {
    token.release()
}

/// Write `pid` to a temporary file beside `path`, then link it into place
/// unless `path` already exists.
fn publish(path: &Path, pid: u32) -> Result<(), LockError> {
    let io_err = |source| LockError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(".fbrender-lock")
        .tempfile_in(dir)
        .map_err(io_err)?;
    write!(staged, "{pid}")
        .and_then(|()| staged.as_file().sync_all())
        .map_err(io_err)?;

    match staged.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            let winner = read_owner(path).ok().flatten().unwrap_or(0);
            Err(LockError::DeviceBusy(winner))
        }
        Err(e) => Err(io_err(e.error)),
    }
}

enum Unreadable {
    Empty,
    Garbage(String),
    Io(io::Error),
}

/// `Ok(None)` when there is no marker.
fn read_owner(path: &Path) -> Result<Option<u32>, Unreadable> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Unreadable::Io(e)),
    };
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Unreadable::Empty);
    }
    match trimmed.parse::<u32>() {
        Ok(pid) if pid > 0 => Ok(Some(pid)),
        _ => Err(Unreadable::Garbage(trimmed.to_owned())),
    }
}

fn remove_marker(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether `pid` names a running process.
///
/// `kill(pid, 0)` checks existence without signalling. `EPERM` means the process
/// exists under another user.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission checks.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
