//! Response caches keyed by request URL.
//!
//! [`DiskCache`] stores one file per URL and derives freshness from the file's
//! modification time. [`MemoryCache`] is the in-process equivalent used where
//! touching the filesystem is undesirable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

use crate::traits::ResponseCache;

const MAX_KEY_LEN: usize = 200;
const EXTENSION: &str = "json";

/// Maps a URL to a filesystem-safe file name: every character outside
/// `[A-Za-z0-9]` becomes `_`, the stem is cut to 200 characters and `.json`
/// is appended.
pub fn cache_file_name(url: &str) -> String {
    let mut stem: String = url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    // Output is pure ASCII so byte truncation is safe.
    stem.truncate(MAX_KEY_LEN);
    format!("{}.{}", stem, EXTENSION)
}

// ============================================================================
// Disk cache
// ============================================================================

pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
    write_lock: Mutex<()>,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(cache_file_name(key))
    }

    fn write(&self, path: &Path, body: &[u8]) -> std::io::Result<()> {
        // Poisoning only means another writer panicked; the guard still serializes.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)
    }
}

impl ResponseCache for DiskCache {
    fn read_fresh(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        // A modification time in the future counts as fresh.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            debug!(path = %path.display(), age_secs = age.as_secs(), "cache entry expired");
            return None;
        }
        fs::read(&path).ok()
    }

    fn write_best_effort(&self, key: &str, body: &[u8]) {
        let path = self.path_for(key);
        if let Err(e) = self.write(&path, body) {
            debug!(path = %path.display(), error = %e, "cache write failed");
        }
    }
}

// ============================================================================
// Memory cache
// ============================================================================

#[derive(Default)]
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<u8>)>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn read_fresh(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().ok()?;
        let (written, body) = entries.get(key)?;
        (written.elapsed() <= self.ttl).then(|| body.clone())
    }

    fn write_best_effort(&self, key: &str, body: &[u8]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now(), body.to_vec()));
        }
    }
}
