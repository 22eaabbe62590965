//! File-backed string storage.
//!
//! Keeps the whole map in memory and writes it through to a JSON file on
//! every mutation. Writes go to a temp file that is synced and renamed over
//! the target, so a crash never leaves a half-written store behind.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{check_quota, KeyValueStorage};
use crate::error::Result;

/// Durable string store persisted as a single JSON object.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl FileStorage {
    /// Opens the store at `path`, creating it lazily on first write.
    ///
    /// An unreadable or corrupt file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = load_from_disk(&path);
        debug!(path = %path.display(), items = items.len(), "Opened file storage");
        Self {
            path,
            items: RwLock::new(items),
            quota: None,
        }
    }

    /// Limits the store to `quota` bytes of keys and values.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, items: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let serialized = serde_json::to_string(items)?;
        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", process::id()));
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write();
        check_quota(&items, self.quota, key, value)?;
        let previous = items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save(&items) {
            // keep memory and disk in agreement
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write();
        if let Some(old) = items.remove(key) {
            if let Err(e) = self.save(&items) {
                items.insert(key.to_string(), old);
                return Err(e);
            }
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read().keys().cloned().collect())
    }
}

fn load_from_disk(path: &Path) -> HashMap<String, String> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(items) => items,
            Err(e) => {
                warn!("Cache storage file is corrupt, starting empty: {}", e);
                HashMap::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
        Err(e) => {
            warn!("Failed to read cache storage, starting empty: {}", e);
            HashMap::new()
        }
    }
}
