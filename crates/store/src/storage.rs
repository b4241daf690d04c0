//! Durable key-value persistence port.
//!
//! Every store writes its snapshot under a fixed key after each mutation and
//! reads it back once when constructed. The auth token lives under its own
//! key as a raw string.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{error::StorageError, lock};

pub const TOKEN_KEY: &str = "dinerito-token";
pub const SESSION_KEY: &str = "dinerito-auth";
pub const CATEGORIES_KEY: &str = "dinerito-categories";
pub const MOVEMENTS_KEY: &str = "dinerito-movements";

const SNAPSHOT_VERSION: u32 = 0;

type Result<T> = std::result::Result<T, StorageError>;

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local storage, gone when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// All keys in one pretty-printed JSON object on disk.
///
/// The file is read once on [`FileStorage::open`] and rewritten whole on
/// every `set`/`remove`. A missing file is an empty storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    version: u32,
}

/// Reads the snapshot stored under `key`. Missing, undecodable or
/// unreadable snapshots all yield `None`; the caller starts from scratch.
pub(crate) fn load_snapshot<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!("cannot read {key}: {err}");
            return None;
        }
    };
    match serde_json::from_str::<Envelope<T>>(&raw) {
        Ok(envelope) => Some(envelope.state),
        Err(err) => {
            tracing::warn!("discarding unreadable {key} snapshot: {err}");
            None
        }
    }
}

/// Writes `state` under `key`. Failures are logged, never propagated: a
/// store keeps working in memory when the disk is unavailable.
pub(crate) fn save_snapshot<T: Serialize>(storage: &dyn Storage, key: &str, state: &T) {
    let envelope = Envelope {
        state,
        version: SNAPSHOT_VERSION,
    };
    let result = serde_json::to_string(&envelope)
        .map_err(StorageError::from)
        .and_then(|raw| storage.set(key, &raw));
    if let Err(err) = result {
        tracing::warn!("cannot persist {key}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("dinerito_storage_{}_{name}", std::process::id()))
            .join("state.json")
    }

    #[test]
    fn file_storage_survives_reopen() {
        let path = temp_path("reopen");
        let _ = fs::remove_file(&path);

        let storage = FileStorage::open(&path).unwrap();
        storage.set(TOKEN_KEY, "abc").unwrap();
        storage.set(SESSION_KEY, "{}").unwrap();
        storage.remove(SESSION_KEY).unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get(SESSION_KEY).unwrap(), None);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_empty() {
        let storage = FileStorage::open(temp_path("missing")).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn snapshots_are_enveloped() {
        let storage = MemoryStorage::new();
        save_snapshot(&storage, MOVEMENTS_KEY, &vec![1, 2, 3]);

        let raw = storage.get(MOVEMENTS_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"{"state":[1,2,3],"version":0}"#);
        assert_eq!(load_snapshot::<Vec<i32>>(&storage, MOVEMENTS_KEY), Some(vec![1, 2, 3]));
    }

    #[test]
    fn corrupt_snapshot_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(CATEGORIES_KEY, "not json").unwrap();
        assert_eq!(load_snapshot::<Vec<i32>>(&storage, CATEGORIES_KEY), None);
    }
}
