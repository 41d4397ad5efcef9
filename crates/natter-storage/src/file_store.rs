use std::fs;
use std::path::{Path, PathBuf};

use natter_core::error::StorageError;
use natter_core::persist::Persistence;
use serde_json::Value;

/// File-backed key-value snapshots: one `<key>.json` document per key
/// under a data directory. Writes go to a temp file and are renamed
/// into place so readers never see a half-written snapshot.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Persistence for FileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| StorageError::Io(e.to_string()))?;
        let value = serde_json::from_str(&content).map_err(|e| StorageError::Serde(e.to_string()))?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        let content =
            serde_json::to_string(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        fs::write(&tmp, content).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        for entry in fs::read_dir(&self.dir).map_err(|e| StorageError::Io(e.to_string()))? {
            let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path).map_err(|e| StorageError::Io(e.to_string()))?;
            }
        }
        Ok(())
    }
}
