//! Flat-file long-term memory store: a JSON array of `{key, memory}` records, persisted with
//! an atomic temp-file-then-rename write so a crash mid-write never corrupts the file on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::HashiruError;

/// One stored memory, keyed for uniqueness: keys are unique, content is not deduplicated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: String,
    pub memory: String,
}

/// JSON-array-backed store for [`MemoryRecord`]s, guarded by a single mutex. `add`/`delete`
/// are read-modify-atomic-rename, matching the CAS-like semantics the shared-resource policy
/// calls for.
pub struct MemoryStore {
    path: PathBuf,
    records: Mutex<Vec<MemoryRecord>>,
}

impl MemoryStore {
    /// Loads records from `path` if it exists, else starts empty. The file is created lazily
    /// on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HashiruError> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, records: Mutex::new(records) })
    }

    pub fn list(&self) -> Vec<MemoryRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Fails with `DuplicateKey` (no mutation) if `key` is already present.
    pub fn add(&self, key: impl Into<String>, memory: impl Into<String>) -> Result<(), HashiruError> {
        let key = key.into();
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.key == key) {
            return Err(HashiruError::DuplicateKey(key));
        }
        records.push(MemoryRecord { key, memory: memory.into() });
        Self::write_atomic(&self.path, &records)
    }

    /// Fails with `ToolNotFound` (no mutation) if `key` is absent.
    pub fn delete(&self, key: &str) -> Result<(), HashiruError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.key != key);
        if records.len() == before {
            return Err(HashiruError::ToolNotFound(format!("memory key not found: {key}")));
        }
        Self::write_atomic(&self.path, &records)
    }

    /// Replaces the whole store. Used by tests only.
    pub fn replace_all(&self, records: Vec<MemoryRecord>) -> Result<(), HashiruError> {
        let mut guard = self.records.lock().unwrap();
        *guard = records;
        Self::write_atomic(&self.path, &guard)
    }

    fn write_atomic(path: &Path, records: &[MemoryRecord]) -> Result<(), HashiruError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_list_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("memory.json")).unwrap();
        assert!(store.list().is_empty());

        store.add("pet", "user has a dog named Rex").unwrap();
        assert_eq!(store.list().len(), 1);

        store.delete("pet").unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn add_duplicate_key_fails_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("memory.json")).unwrap();
        store.add("pet", "user has a dog named Rex").unwrap();

        let err = store.add("pet", "different value").unwrap_err();
        assert!(matches!(err, HashiruError::DuplicateKey(k) if k == "pet"));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].memory, "user has a dog named Rex");
    }

    #[test]
    fn delete_missing_key_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("memory.json")).unwrap();
        assert!(store.delete("missing").is_err());
    }

    #[test]
    fn add_then_delete_restores_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("memory.json")).unwrap();
        store.add("k", "m").unwrap();
        store.delete("k").unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn reopen_loads_persisted_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let store = MemoryStore::open(&path).unwrap();
        store.add("city", "user lives in Davis").unwrap();
        drop(store);

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.list().len(), 1);
        assert_eq!(reopened.list()[0].key, "city");
    }
}
