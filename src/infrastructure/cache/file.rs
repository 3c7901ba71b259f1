//! File-backed cache store
//!
//! Layout under the root directory:
//! - `metadata.json` - store-wide record
//! - `entries/<key>.json` - one record per committed entry

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::cache::{
    CacheEntry, CacheKey, CacheLookup, CacheStore, IntegrityViolation, StoreMetadata,
};
use crate::domain::DomainError;

const METADATA_FILE: &str = "metadata.json";
const ENTRIES_DIR: &str = "entries";
const ENTRY_EXTENSION: &str = "json";

/// Persistent cache store with one JSON record per entry
///
/// Writes are serialized within the process; concurrent writers in other
/// processes are not coordinated.
#[derive(Debug)]
pub struct FileCacheStore {
    root: PathBuf,
    schema_version: u32,
    metadata: Mutex<StoreMetadata>,
    writes: Mutex<()>,
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> DomainError {
    DomainError::storage(format!("Failed to {} {}: {}", action, path.display(), e))
}

/// Writes `bytes` to a temp file next to `path`, then renames it into place
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| io_error("create", &temp_path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| io_error("write", &temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| io_error("sync", &temp_path, e))?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(io_error("rename into", path, e));
    }

    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<bool, DomainError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error("remove", path, e)),
    }
}

impl FileCacheStore {
    /// Opens or creates a store, purging stale and unreadable records
    pub async fn open(root: impl Into<PathBuf>, schema_version: u32) -> Result<Self, DomainError> {
        let root = root.into();
        let entries_dir = root.join(ENTRIES_DIR);

        fs::create_dir_all(&entries_dir)
            .await
            .map_err(|e| io_error("create", &entries_dir, e))?;

        let mut metadata = Self::load_metadata(&root, schema_version).await?;
        if metadata.schema_version != schema_version {
            info!(
                from = metadata.schema_version,
                to = schema_version,
                "Cache schema version changed"
            );
            metadata.schema_version = schema_version;
        }

        let store = Self {
            root,
            schema_version,
            metadata: Mutex::new(metadata),
            writes: Mutex::new(()),
        };

        let total = store.sweep().await?;
        {
            let mut metadata = store.metadata.lock().await;
            metadata.total_entries = total as u64;
            metadata.touch();
        }
        store.flush_metadata().await?;

        info!(
            path = %store.root.display(),
            schema_version,
            entries = total,
            "Opened file cache store"
        );

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join(ENTRIES_DIR)
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.entries_dir()
            .join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    async fn load_metadata(root: &Path, schema_version: u32) -> Result<StoreMetadata, DomainError> {
        let path = root.join(METADATA_FILE);

        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(metadata) => Ok(metadata),
                Err(e) => {
                    warn!(
                        target: "data_integrity",
                        path = %path.display(),
                        error = %e,
                        "Unreadable store metadata replaced"
                    );
                    Ok(StoreMetadata::new(schema_version))
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreMetadata::new(schema_version)),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn flush_metadata(&self) -> Result<(), DomainError> {
        let metadata = self.metadata.lock().await.clone();
        let bytes = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| DomainError::internal(format!("Failed to encode metadata: {}", e)))?;

        write_atomic(&self.metadata_path(), &bytes).await
    }

    async fn set_total(&self, total: usize) {
        let mut metadata = self.metadata.lock().await;
        metadata.total_entries = total as u64;
        metadata.touch();
    }

    async fn adjust_total(&self, delta: i64) {
        let mut metadata = self.metadata.lock().await;
        metadata.total_entries = metadata.total_entries.saturating_add_signed(delta);
        metadata.touch();
    }

    /// Lists `(key, path)` for every record file; other files are left alone
    async fn record_files(&self) -> Result<Vec<(Option<CacheKey>, PathBuf)>, DomainError> {
        let dir = self.entries_dir();
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|e| io_error("list", &dir, e))?;
        let mut files = Vec::new();

        while let Some(item) = reader
            .next_entry()
            .await
            .map_err(|e| io_error("list", &dir, e))?
        {
            let path = item.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(".tmp") {
                files.push((None, path));
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| CacheKey::parse(s).ok());
            files.push((key, path));
        }

        Ok(files)
    }

    /// Removes leftovers, unreadable records and records from other schema versions
    async fn sweep(&self) -> Result<usize, DomainError> {
        let mut kept = 0;

        for (key, path) in self.record_files().await? {
            let Some(key) = key else {
                debug!(path = %path.display(), "Removing stray file");
                remove_if_present(&path).await?;
                continue;
            };

            match self.read_entry(&path).await? {
                Some(entry) if entry.schema_version != self.schema_version => {
                    info!(
                        key = %key,
                        schema_version = entry.schema_version,
                        "Purging stale cache entry"
                    );
                    remove_if_present(&path).await?;
                }
                Some(_) => kept += 1,
                None => {
                    warn!(
                        target: "data_integrity",
                        key = %key,
                        "Unreadable cache record purged"
                    );
                    remove_if_present(&path).await?;
                }
            }
        }

        Ok(kept)
    }

    /// `Ok(None)` when the record exists but cannot be decoded
    async fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>, DomainError> {
        let bytes = fs::read(path).await.map_err(|e| io_error("read", path, e))?;
        Ok(serde_json::from_slice(&bytes).ok())
    }

    async fn purge_corrupt(
        &self,
        key: &CacheKey,
        path: &Path,
        violation: IntegrityViolation,
    ) -> Result<CacheLookup, DomainError> {
        warn!(
            target: "data_integrity",
            key = %key,
            violation = %violation,
            "Corrupt cache entry purged"
        );

        self.purge_if_corrupt(key, path).await?;

        Ok(CacheLookup::Corrupted(violation))
    }

    /// Removes the record only if it still fails verification under the write lock
    ///
    /// A record committed between the corrupt read and the purge is kept.
    async fn purge_if_corrupt(&self, key: &CacheKey, path: &Path) -> Result<bool, DomainError> {
        let _guard = self.writes.lock().await;

        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error("read", path, e)),
        };

        let still_corrupt = match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => entry.verify_integrity(key).is_err(),
            Err(_) => true,
        };

        if !still_corrupt {
            debug!(key = %key, "Cache entry repaired before purge");
            return Ok(false);
        }

        let removed = remove_if_present(path).await?;
        if removed {
            self.adjust_total(-1).await;
        }

        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn lookup(&self, key: &CacheKey) -> Result<CacheLookup, DomainError> {
        let path = self.entry_path(key);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheLookup::Miss),
            Err(e) => return Err(io_error("read", &path, e)),
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(_) => {
                return self
                    .purge_corrupt(key, &path, IntegrityViolation::Unreadable)
                    .await;
            }
        };

        match entry.verify_integrity(key) {
            Ok(()) => Ok(CacheLookup::Hit(entry)),
            Err(violation) => self.purge_corrupt(key, &path, violation).await,
        }
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), DomainError> {
        entry.verify_integrity(key).map_err(|violation| {
            DomainError::internal(format!("Refusing to store entry for {}: {}", key, violation))
        })?;

        let bytes = serde_json::to_vec_pretty(&entry)
            .map_err(|e| DomainError::internal(format!("Failed to encode entry: {}", e)))?;
        let path = self.entry_path(key);

        let _guard = self.writes.lock().await;

        if fs::try_exists(&path)
            .await
            .map_err(|e| io_error("check", &path, e))?
        {
            return Err(DomainError::conflict(format!(
                "Cache entry '{}' already exists",
                key
            )));
        }

        write_atomic(&path, &bytes).await?;
        self.adjust_total(1).await;

        debug!(key = %key, "Cache entry written");
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<bool, DomainError> {
        let _guard = self.writes.lock().await;
        let removed = remove_if_present(&self.entry_path(key)).await?;

        if removed {
            self.adjust_total(-1).await;
        }

        Ok(removed)
    }

    async fn invalidate_before_schema(&self, schema_version: u32) -> Result<usize, DomainError> {
        let _guard = self.writes.lock().await;
        let mut removed = 0;
        let mut remaining = 0;

        for (key, path) in self.record_files().await? {
            if key.is_none() {
                continue;
            }

            match self.read_entry(&path).await? {
                Some(entry) if entry.schema_version < schema_version => {
                    if remove_if_present(&path).await? {
                        removed += 1;
                    }
                }
                _ => remaining += 1,
            }
        }

        self.set_total(remaining).await;
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, DomainError> {
        let mut entries = Vec::new();

        for (key, _) in self.record_files().await? {
            let Some(key) = key else { continue };

            if let CacheLookup::Hit(entry) = self.lookup(&key).await? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    async fn metadata(&self) -> Result<StoreMetadata, DomainError> {
        Ok(self.metadata.lock().await.clone())
    }

    async fn record_usage(&self, hits: u64, misses: u64) -> Result<(), DomainError> {
        let mut metadata = self.metadata.lock().await;
        metadata.hits += hits;
        metadata.misses += misses;
        metadata.touch();
        Ok(())
    }

    async fn close(&self) -> Result<(), DomainError> {
        self.flush_metadata().await?;
        debug!(path = %self.root.display(), "File cache store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::fixtures::entry_for;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> FileCacheStore {
        FileCacheStore::open(dir.path(), 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        assert!(dir.path().join(METADATA_FILE).exists());
        assert!(dir.path().join(ENTRIES_DIR).is_dir());
        assert_eq!(store.metadata().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_entries_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let entry = entry_for("source", "output");
        let key = entry.key.clone();

        {
            let store = open(&dir).await;
            store.put(&key, entry.clone()).await.unwrap();
            assert_eq!(store.get(&key).await.unwrap(), Some(entry.clone()));
            store.close().await.unwrap();
        }

        let store = open(&dir).await;
        assert_eq!(store.get(&key).await.unwrap(), Some(entry));
        assert_eq!(store.metadata().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn test_put_is_append_only() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let entry = entry_for("source", "output");
        let key = entry.key.clone();

        store.put(&key, entry.clone()).await.unwrap();
        let err = store.put(&key, entry).await.unwrap_err();

        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_edited_output_is_detected_and_purged() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let entry = entry_for("source", "output");
        let key = entry.key.clone();
        store.put(&key, entry).await.unwrap();

        let path = store.entry_path(&key);
        let mut record: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        record["output"] = serde_json::json!("tampered output");
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        assert_eq!(
            store.lookup(&key).await.unwrap(),
            CacheLookup::Corrupted(IntegrityViolation::OutputHashMismatch)
        );
        assert!(!path.exists());
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.metadata().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_purge_spares_record_rewritten_after_corrupt_read() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let entry = entry_for("source", "output");
        let key = entry.key.clone();
        store.put(&key, entry).await.unwrap();
        let path = store.entry_path(&key);

        // The corrupt read already happened; the record is valid again by purge time
        assert!(!store.purge_if_corrupt(&key, &path).await.unwrap());
        assert!(path.exists());
        assert!(store.get(&key).await.unwrap().is_some());
        assert_eq!(store.metadata().await.unwrap().total_entries, 1);

        std::fs::write(&path, b"{\"key\":").unwrap();
        assert!(store.purge_if_corrupt(&key, &path).await.unwrap());
        assert!(!path.exists());
        assert_eq!(store.metadata().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_truncated_record_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let entry = entry_for("source", "output");
        let key = entry.key.clone();
        store.put(&key, entry).await.unwrap();

        std::fs::write(store.entry_path(&key), b"{\"key\":").unwrap();

        assert_eq!(
            store.lookup(&key).await.unwrap(),
            CacheLookup::Corrupted(IntegrityViolation::Unreadable)
        );
    }

    #[tokio::test]
    async fn test_open_purges_stale_and_broken_records() {
        let dir = TempDir::new().unwrap();
        let stale = entry_for("stale", "output");
        let broken = entry_for("broken", "output");

        {
            let store = open(&dir).await;
            store.put(&stale.key.clone(), stale.clone()).await.unwrap();
            store.put(&broken.key.clone(), broken.clone()).await.unwrap();
            std::fs::write(store.entry_path(&broken.key), b"not json").unwrap();
            std::fs::write(dir.path().join(ENTRIES_DIR).join("leftover.json.1.tmp"), b"x")
                .unwrap();
            store.close().await.unwrap();
        }

        let store = FileCacheStore::open(dir.path(), 2).await.unwrap();

        assert_eq!(store.get(&stale.key).await.unwrap(), None);
        assert_eq!(store.get(&broken.key).await.unwrap(), None);

        let metadata = store.metadata().await.unwrap();
        assert_eq!(metadata.schema_version, 2);
        assert_eq!(metadata.total_entries, 0);
        assert_eq!(std::fs::read_dir(dir.path().join(ENTRIES_DIR)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_metadata_does_not_fail_open() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), b"garbage").unwrap();

        let store = open(&dir).await;
        assert_eq!(store.metadata().await.unwrap().schema_version, 1);
    }

    #[tokio::test]
    async fn test_invalidate_before_schema() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let old = entry_for("old", "output");
        let mut newer = entry_for("newer", "output");
        newer.schema_version = 3;

        store.put(&old.key.clone(), old.clone()).await.unwrap();
        store.put(&newer.key.clone(), newer.clone()).await.unwrap();

        assert_eq!(store.invalidate_before_schema(2).await.unwrap(), 1);
        assert_eq!(store.entries().await.unwrap(), vec![newer]);
        assert_eq!(store.metadata().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn test_usage_is_flushed_on_close() {
        let dir = TempDir::new().unwrap();

        {
            let store = open(&dir).await;
            store.record_usage(5, 2).await.unwrap();
            store.close().await.unwrap();
        }

        let metadata = open(&dir).await.metadata().await.unwrap();
        assert_eq!(metadata.hits, 5);
        assert_eq!(metadata.misses, 2);
    }

    #[tokio::test]
    async fn test_invalidate_missing_key() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let key = entry_for("source", "output").key;

        assert!(!store.invalidate(&key).await.unwrap());
    }
}
