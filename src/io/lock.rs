//! Per-file advisory locks for the cache and session files.
//!
//! Two `np` processes may finish at the same time (a listing revalidating
//! while a `tags rm` refreshes). Every write or removal of a state file
//! happens inside [`with_lock`], keyed by the file it touches.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not lock {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{target} is being written by another np process")]
    Busy { target: PathBuf },
}

/// Exclusive hold on one state file, released on drop.
///
/// The lock is taken on a sibling `.<name>.lock` file, never on the data
/// file itself, because the data file is replaced by rename. The sibling
/// is left in place: unlinking it would let a waiter lock a dead inode.
pub struct StateLock {
    _file: File,
}

impl StateLock {
    pub fn hold(target: &Path) -> Result<Self, LockError> {
        Self::hold_for(target, WAIT)
    }

    pub fn hold_for(target: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = lock_path(target);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        let deadline = Instant::now() + wait;
        loop {
            match try_exclusive(&file) {
                Ok(()) => return Ok(StateLock { _file: file }),
                Err(e) if e.kind() != io::ErrorKind::WouldBlock => return Err(io_err(e)),
                Err(_) if Instant::now() >= deadline => {
                    return Err(LockError::Busy {
                        target: target.to_path_buf(),
                    });
                }
                Err(_) => std::thread::sleep(POLL),
            }
        }
    }
}

/// `dir/name` locks through `dir/.name.lock`
pub fn lock_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.lock", name))
}

/// Run `write` while holding the lock for `target`
pub fn with_lock<T, E>(target: &Path, write: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<LockError>,
{
    let _held = StateLock::hold(target)?;
    write()
}

#[cfg(unix)]
fn try_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor is owned by `file` and open for the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    // EWOULDBLOCK maps to ErrorKind::WouldBlock
    if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

#[cfg(not(unix))]
fn try_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_file_sits_next_to_its_target() {
        assert_eq!(
            lock_path(Path::new("/tmp/notepad/ada.json")),
            PathBuf::from("/tmp/notepad/.ada.json.lock")
        );
    }

    #[cfg(unix)]
    #[test]
    fn same_file_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("session.json");
        let _held = StateLock::hold(&target).unwrap();
        let second = StateLock::hold_for(&target, Duration::from_millis(50));
        assert!(matches!(second, Err(LockError::Busy { target: t }) if t == target));
    }

    #[test]
    fn different_files_lock_independently() {
        let tmp = TempDir::new().unwrap();
        let _session = StateLock::hold(&tmp.path().join("session.json")).unwrap();
        assert!(StateLock::hold_for(&tmp.path().join("ada.json"), Duration::ZERO).is_ok());
    }

    #[test]
    fn lock_is_released_when_the_write_fails() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("ada.json");
        let failed: Result<(), LockError> = with_lock(&target, || {
            Err(LockError::Busy {
                target: target.clone(),
            })
        });
        assert!(failed.is_err());
        assert!(StateLock::hold_for(&target, Duration::ZERO).is_ok());
    }
}
