//! Durable key-value storage backing the client session.
//!
//! Plays the part of browser local storage: a flat map of string keys to string values, shared by
//! every process that points at the same file.

use crate::{Error, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const ROLE_KEY: &str = "userRole";
pub const NAME_KEY: &str = "userName";

/// Older clients wrote the access token under these names. They are migrated into
/// `ACCESS_TOKEN_KEY` when a store is opened and never read after that.
pub const LEGACY_TOKEN_KEYS: [&str; 2] = ["authToken", "token"];

/// Every key a logout must clear
pub const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ROLE_KEY, NAME_KEY];

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    /// Re-reads the backing medium, returning true if anything changed since the last read.
    ///
    /// Stores without an external medium never change behind our back.
    fn reload(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Moves a legacy access token alias into the canonical key, then deletes all aliases.
///
/// Returns true if a token was migrated.
pub fn migrate_legacy_keys<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<bool> {
    let mut migrated = false;
    let has_canonical = store
        .get(ACCESS_TOKEN_KEY)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    if !has_canonical {
        let legacy = LEGACY_TOKEN_KEYS
            .iter()
            .filter_map(|k| store.get(k))
            .find(|v| !v.is_empty());
        if let Some(token) = legacy {
            info!("migrating legacy access token key to '{ACCESS_TOKEN_KEY}'");
            store.set(ACCESS_TOKEN_KEY, &token)?;
            migrated = true;
        }
    }
    for key in LEGACY_TOKEN_KEYS.iter() {
        if store.get(key).is_some() {
            store.remove(key)?;
        }
    }
    Ok(migrated)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON object file on disk.
///
/// Reads are served from the snapshot taken at open or at the last `reload`. Every mutation
/// re-reads the file, applies the one change and atomically replaces the file, so keys written by
/// other processes in the meantime are never clobbered with stale values.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at the given path, migrating legacy keys.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = FileStore {
            path: path.to_path_buf(),
            entries: read_entries(path)?,
        };
        migrate_legacy_keys(&mut store)?;
        Ok(store)
    }

    /// Default location: `<user config dir>/resumelens/session.json`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Storage("could not determine a config directory".to_string()))?;
        Ok(base.join("resumelens").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::Storage(e.to_string()))?;
        // readers only ever see the old or the new file, never a partial write
        let tmp = self.temp_path();
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }

    /// Applies one mutation on top of what is on disk right now.
    fn mutate<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut fresh = read_entries(&self.path)?;
        if fresh != self.entries {
            debug!("merging external changes to {}", self.path.display());
        }
        let changed = change(&mut fresh);
        self.entries = fresh;
        if changed {
            self.persist()?;
        }
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&raw)
        .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.mutate(|entries| entries.remove(key).is_some())
    }

    fn reload(&mut self) -> Result<bool> {
        let fresh = read_entries(&self.path)?;
        let changed = fresh != self.entries;
        if changed {
            debug!("session file changed on disk: {}", self.path.display());
        }
        self.entries = fresh;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_legacy_alias() {
        let mut store = MemoryStore::new();
        store.set("authToken", "abc").unwrap();
        store.set("token", "older").unwrap();
        assert!(migrate_legacy_keys(&mut store).unwrap());
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("abc".to_string()));
        assert_eq!(store.get("authToken"), None);
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn test_migrate_keeps_canonical() {
        let mut store = MemoryStore::new();
        store.set(ACCESS_TOKEN_KEY, "current").unwrap();
        store.set("token", "stale").unwrap();
        assert!(!migrate_legacy_keys(&mut store).unwrap());
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("current".to_string()));
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn test_file_store_roundtrip_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut first = FileStore::open(&path).unwrap();
        first.set(ACCESS_TOKEN_KEY, "tok").unwrap();
        first.set(ROLE_KEY, "admin").unwrap();

        let mut second = FileStore::open(&path).unwrap();
        assert_eq!(second.get(ROLE_KEY), Some("admin".to_string()));
        assert!(!second.reload().unwrap());

        first.remove(ROLE_KEY).unwrap();
        assert!(second.reload().unwrap());
        assert_eq!(second.get(ROLE_KEY), None);
        assert_eq!(second.get(ACCESS_TOKEN_KEY), Some("tok".to_string()));
    }

    #[test]
    fn test_file_store_writes_merge_with_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut first = FileStore::open(&path).unwrap();
        first.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        first.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        let mut second = FileStore::open(&path).unwrap();
        second.remove(REFRESH_TOKEN_KEY).unwrap();

        // first still holds r1 in its snapshot; writing another key must not put it back
        first.set(ROLE_KEY, "admin").unwrap();
        let third = FileStore::open(&path).unwrap();
        assert_eq!(third.get(REFRESH_TOKEN_KEY), None);
        assert_eq!(third.get(ROLE_KEY), Some("admin".to_string()));
        assert_eq!(first.get(REFRESH_TOKEN_KEY), None);

        // no temp files left behind
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
    }

    #[test]
    fn test_file_store_migrates_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"token": "legacy", "userName": "Ada"}"#).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("legacy".to_string()));
        assert_eq!(store.get("token"), None);

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("\"token\""));
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(Error::Storage(_))));
    }
}
