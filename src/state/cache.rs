//! Durable client cache: string values under string keys, surviving restarts.

use log::debug;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub fn draft_key(tournament_id: &str) -> String {
    format!("bracket:{tournament_id}")
}

/// Marker left behind by a reset until the next successful generation.
pub fn reset_key(tournament_id: &str) -> String {
    format!("bracket-reset:{tournament_id}")
}

#[derive(Debug, Error)]
#[error("cache entry '{key}': {source}")]
pub struct CacheError {
    key: String,
    #[source]
    source: io::Error,
}

impl CacheError {
    pub(crate) fn new(key: &str, source: impl Into<io::Error>) -> Self {
        Self { key: key.to_string(), source: source.into() }
    }
}

pub trait DraftCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Percent-encodes everything but ASCII letters, digits and `-`, so
    /// distinct keys never share a file and no key leaves the directory.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                file_name.push(byte as char);
            } else {
                file_name.push_str(&format!("%{byte:02X}"));
            }
        }
        self.dir.join(format!("{file_name}.json"))
    }
}

fn io_error(key: &str) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::new(key, source)
}

impl DraftCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error(key))?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves half an entry behind.
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, value).map_err(io_error(key))?;
        std::fs::rename(&staging, &path).map_err(io_error(key))?;
        debug!("cached {key} at {}", path.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key)(e)),
        }
    }
}

/// Process-local cache, used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
