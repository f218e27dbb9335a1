//! Snapshot store for named record collections.
//!
//! Each collection lives in `<data_dir>/<name>.json` as one pretty-printed
//! JSON array and is rewritten wholesale on every mutation. Access is
//! serialized per collection: readers of a collection share its lock, a
//! writer holds it exclusively. Collections never block each other.
//!
//! `update` is the only safe way to mutate: it loads, applies the caller's
//! change and saves inside a single critical section, so two concurrent
//! writers cannot overwrite each other's additions.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Name of the advisory lock file inside the data directory
const LOCK_FILE: &str = ".lock";

/// Errors raised by the collection store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt snapshot for collection '{collection}': {source}")]
    Serialization {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Data directory is in use by another process: {0}")]
    Locked(PathBuf),
}

/// File-backed collection store
pub struct CollectionStore {
    /// Directory holding one snapshot file per collection
    data_dir: PathBuf,

    /// One reader/writer lock per collection name
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,

    /// Held for the lifetime of the store; dropping it releases the lock
    _dir_lock: std::fs::File,
}

impl CollectionStore {
    /// Open (creating if needed) the store rooted at `data_dir`.
    ///
    /// Fails with [`StoreError::Locked`] when another store instance already
    /// owns the directory.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();

        fs::create_dir_all(&data_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: data_dir.clone(),
                source,
            })?;

        let lock_path = data_dir.join(LOCK_FILE);
        let dir_lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Io {
                path: lock_path.clone(),
                source,
            })?;

        dir_lock
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked(data_dir.clone()))?;

        info!(data_dir = %data_dir.display(), "Opened collection store");

        Ok(Self {
            data_dir,
            locks: Mutex::new(HashMap::new()),
            _dir_lock: dir_lock,
        })
    }

    /// Directory holding the snapshots
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the snapshot file for a collection
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection))
    }

    /// Load every record of a collection. A missing snapshot is empty.
    pub async fn load<T>(&self, collection: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let lock = self.lock_for(collection);
        let _guard = lock.read().await;
        self.read_snapshot(collection).await
    }

    /// Replace a collection's snapshot with `records`
    pub async fn save<T>(&self, collection: &str, records: &[T]) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let lock = self.lock_for(collection);
        let _guard = lock.write().await;
        self.write_snapshot(collection, records).await
    }

    /// Load, mutate and save a collection as one exclusive operation.
    ///
    /// When `apply` fails nothing is written and its error is returned.
    pub async fn update<T, R, E, F>(&self, collection: &str, apply: F) -> Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
    {
        let lock = self.lock_for(collection);
        let _guard = lock.write().await;

        let mut records = self.read_snapshot(collection).await?;
        let outcome = apply(&mut records)?;
        self.write_snapshot(collection, &records).await?;

        Ok(outcome)
    }

    fn lock_for(&self, collection: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    async fn read_snapshot<T>(&self, collection: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let path = self.collection_path(collection);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Serialization {
            collection: collection.to_string(),
            source,
        })
    }

    async fn write_snapshot<T>(&self, collection: &str, records: &[T]) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let path = self.collection_path(collection);
        let tmp_path = self.data_dir.join(format!("{}.json.tmp", collection));

        let content =
            serde_json::to_string_pretty(records).map_err(|source| StoreError::Serialization {
                collection: collection.to_string(),
                source,
            })?;

        fs::write(&tmp_path, content)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(collection, records = records.len(), "Saved snapshot");
        Ok(())
    }
}
