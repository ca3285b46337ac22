//! Memo of previous uploads, so re-running a job on the same local file
//! does not send its bytes again.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactReference, LocalFile};
use crate::error::{Result, ReelforgeError};

const CACHE_FILE: &str = "uploads.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCacheEntry {
    pub fingerprint: String,
    pub file_name: String,
    pub size: u64,
    pub artifact: ArtifactReference,
    pub cached_at: u64,
}

pub struct UploadCache {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, UploadCacheEntry>>,
}

impl UploadCache {
    /// A cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Load (or start) the persisted cache under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| ReelforgeError::Cache(format!("Failed to create cache directory: {}", e)))?;

        let path = dir.join(CACHE_FILE);
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Vec<UploadCacheEntry>>(&content) {
                Ok(list) => list.into_iter().map(|e| (e.fingerprint.clone(), e)).collect(),
                Err(e) => {
                    warn!("Ignoring unreadable upload cache {}: {}", path.display(), e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        debug!("Loaded {} cached uploads from {}", entries.len(), path.display());
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Identify a local file by name, size and modification time.
    pub fn fingerprint(file: &LocalFile) -> String {
        let modified = std::fs::metadata(&file.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut hasher = DefaultHasher::new();
        file.name.hash(&mut hasher);
        file.size.hash(&mut hasher);
        modified.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn lookup(&self, file: &LocalFile) -> Option<ArtifactReference> {
        let key = Self::fingerprint(file);
        let entries = self.entries.lock().ok()?;
        entries.get(&key).map(|entry| entry.artifact.clone())
    }

    pub fn store(&self, file: &LocalFile, artifact: &ArtifactReference) -> Result<()> {
        let entry = UploadCacheEntry {
            fingerprint: Self::fingerprint(file),
            file_name: file.name.clone(),
            size: file.size,
            artifact: artifact.clone(),
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };

        let snapshot = {
            let mut entries = self.lock()?;
            entries.insert(entry.fingerprint.clone(), entry);
            entries.values().cloned().collect::<Vec<_>>()
        };
        self.persist(&snapshot)
    }

    /// Forget any upload of `file`. Returns whether an entry was removed.
    pub fn invalidate(&self, file: &LocalFile) -> Result<bool> {
        let key = Self::fingerprint(file);
        let (removed, snapshot) = {
            let mut entries = self.lock()?;
            let removed = entries.remove(&key).is_some();
            (removed, entries.values().cloned().collect::<Vec<_>>())
        };
        if removed {
            info!("Invalidated cached upload of {}", file.name);
            self.persist(&snapshot)?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> Vec<UploadCacheEntry> {
        let mut list: Vec<_> = self
            .entries
            .lock()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        list
    }

    pub fn clear(&self) -> Result<usize> {
        let count = {
            let mut entries = self.lock()?;
            let count = entries.len();
            entries.clear();
            count
        };
        self.persist(&[])?;
        Ok(count)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, UploadCacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| ReelforgeError::Cache("Upload cache lock poisoned".to_string()))
    }

    fn persist(&self, entries: &[UploadCacheEntry]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(path, content)
            .map_err(|e| ReelforgeError::Cache(format!("Failed to write upload cache: {}", e)))
    }
}
