//! Citation table cache.
//!
//! One entry per paper, holding the last successfully merged table. Entries never
//! expire; they are replaced by the next successful load or removed explicitly.

use crate::config::SourceMode;
use crate::error::{DashboardError, Result};
use crate::table::CitationTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Default cache file path: `~/.citedash_cache.json`
pub fn default_cache_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".citedash_cache.json"))
        .ok_or_else(|| DashboardError::Config("Cannot determine home directory".to_string()))
}

/// Cache key for a paper. Single-source tables get their own slot so a cached dual table
/// is never served to an OpenAlex-only loader, or the reverse.
pub fn cache_key(paper_doi: &str, mode: SourceMode) -> String {
    match mode {
        SourceMode::Dual => format!("citations_{}", paper_doi),
        SourceMode::Single => format!("citations_{}_single", paper_doi),
    }
}

/// A cached table and when it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub stored_at: DateTime<Utc>,
    pub table: CitationTable,
}

impl CacheEntry {
    pub fn new(table: CitationTable) -> Self {
        Self {
            stored_at: Utc::now(),
            table,
        }
    }
}

/// Key-value store for merged tables
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn set(&self, key: &str, table: &CitationTable) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| DashboardError::Cache("memory cache lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, table: &CitationTable) -> Result<()> {
        self.lock()?
            .insert(key.to_string(), CacheEntry::new(table.clone()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// JSON file holding every cached paper
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a FileStore at the default path
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_cache_path()?,
        })
    }

    /// Create a FileStore with custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the cache file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, CacheEntry>> {
        if !self.path.exists() {
            debug!("Cache file not found: {:?}", self.path);
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write to a sibling temp file, then rename over the cache file
    fn write_all(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Delete the cache file
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared cache at {:?}", self.path);
        }
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, table: &CitationTable) -> Result<()> {
        // Only a file that is not valid JSON is replaced; I/O errors leave it alone
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(DashboardError::Json(e)) => {
                warn!("Discarding corrupt cache file {:?}: {}", self.path, e);
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), CacheEntry::new(table.clone()));
        self.write_all(&entries)?;
        info!(key = key, rows = table.len(), "Saved citations to {:?}", self.path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
