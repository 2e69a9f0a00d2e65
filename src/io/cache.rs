use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::io::lock::{LockError, with_lock};
use crate::model::{Note, Tag};

/// Error type for cache writes. Reads never fail: a bad cache is a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("could not write cache {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not encode cache: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// The cached blob: everything the stores hold, plus when it was saved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBlob {
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A flat, time-boxed cache file for one account
#[derive(Debug, Clone)]
pub struct Cache {
    path: PathBuf,
    ttl: Duration,
}

impl Cache {
    pub fn new(dir: &Path, account_key: &str, ttl: Duration) -> Self {
        Cache {
            path: dir.join(format!("{}.json", account_key)),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the blob if it was saved less than `ttl` before `now`.
    pub fn load_fresh(&self, now: DateTime<Utc>) -> Option<CacheBlob> {
        let blob = self.load()?;
        let age = now.signed_duration_since(blob.saved_at);
        if age < self.ttl && age >= Duration::zero() {
            debug!(age_secs = age.num_seconds(), "cache hit");
            Some(blob)
        } else {
            debug!(age_secs = age.num_seconds(), "cache stale");
            None
        }
    }

    /// Load the blob regardless of age
    pub fn load(&self) -> Option<CacheBlob> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt cache");
                None
            }
        }
    }

    pub fn save(&self, notes: &[Note], tags: &[Tag], now: DateTime<Utc>) -> Result<(), CacheError> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;

        let blob = CacheBlob {
            saved_at: now,
            notes: notes.to_vec(),
            tags: tags.to_vec(),
        };
        let content = serde_json::to_vec(&blob)?;
        with_lock(&self.path, || {
            atomic_write(&self.path, &content).map_err(|e| self.write_error(e))
        })
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        if !self.path.exists() {
            return Ok(());
        }
        with_lock(&self.path, || match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.write_error(e)),
        })
    }

    fn write_error(&self, source: io::Error) -> CacheError {
        CacheError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, second).unwrap()
    }

    fn cache(dir: &TempDir) -> Cache {
        Cache::new(dir.path(), "ada_example_com", Duration::minutes(5))
    }

    #[test]
    fn fresh_within_window() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.save(&[], &[Tag::new(1, "home")], at(0, 0)).unwrap();

        let blob = cache.load_fresh(at(4, 59)).unwrap();
        assert_eq!(blob.tags, vec![Tag::new(1, "home")]);
    }

    #[test]
    fn stale_at_window_boundary() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.save(&[], &[], at(0, 0)).unwrap();

        assert!(cache.load_fresh(at(5, 0)).is_none());
        // stale data is still readable when asked for explicitly
        assert!(cache.load().is_some());
    }

    #[test]
    fn future_timestamp_is_not_fresh() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.save(&[], &[], at(10, 0)).unwrap();
        assert!(cache.load_fresh(at(0, 0)).is_none());
    }

    #[test]
    fn missing_or_corrupt_cache_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        assert!(cache.load().is_none());

        fs::write(cache.path(), "[[[").unwrap();
        assert!(cache.load_fresh(at(0, 0)).is_none());
    }

    #[test]
    fn clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.save(&[], &[], at(0, 0)).unwrap();
        cache.clear().unwrap();
        assert!(!cache.path().exists());
        cache.clear().unwrap();
    }

    #[test]
    fn accounts_do_not_share_files() {
        let dir = TempDir::new().unwrap();
        let a = Cache::new(dir.path(), "a", Duration::minutes(5));
        let b = Cache::new(dir.path(), "b", Duration::minutes(5));
        a.save(&[], &[Tag::new(1, "a-only")], at(0, 0)).unwrap();
        assert!(b.load().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn save_respects_a_concurrent_writer() {
        use crate::io::lock::StateLock;
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let held = StateLock::hold(cache.path()).unwrap();
        let blocked = cache.save(&[], &[], at(0, 0));
        assert!(matches!(blocked, Err(CacheError::Lock(LockError::Busy { .. }))));
        assert!(cache.load().is_none());

        drop(held);
        cache.save(&[], &[], at(0, 0)).unwrap();
        assert!(cache.load().is_some());
    }
}
