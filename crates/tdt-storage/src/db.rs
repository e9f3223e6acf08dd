//! RocksDB wrapper for topic tracking storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Persist/restore of named structures (window artifacts and globals)
//! - Prefix listing of a community's window artifacts
//! - Session checkpoints and admin operations

use std::collections::BTreeSet;
use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use tdt_types::{GlobalArtifact, Scope, WindowArtifact};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_CHECKPOINTS, CF_GLOBALS, CF_WINDOWS,
};
use crate::error::StorageError;
use crate::keys::{ArtifactKey, CheckpointKey};

/// Main storage interface
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self, cf_name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    fn put_json<T: Serialize>(
        &self,
        cf_name: &str,
        key: &ArtifactKey,
        value: &T,
    ) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::serialization(&key.name, e))?;
        self.put(cf_name, &key.to_bytes(), &bytes)?;
        debug!(artifact = %key.name, bytes = bytes.len(), "Stored artifact");
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &ArtifactKey,
    ) -> Result<Option<T>, StorageError> {
        match self.get(cf_name, &key.to_bytes())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::serialization(&key.name, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // ===== Window artifacts =====

    /// Persist a window artifact, replacing any earlier version.
    #[instrument(skip_all, fields(community = %community, scope = %scope, kind = %kind))]
    pub fn put_window<T: Serialize>(
        &self,
        community: &str,
        scope: &Scope,
        kind: WindowArtifact,
        value: &T,
    ) -> Result<(), StorageError> {
        self.put_json(CF_WINDOWS, &ArtifactKey::new(community, kind.name(scope)), value)
    }

    /// Restore a window artifact.
    #[instrument(skip_all, fields(community = %community, scope = %scope, kind = %kind))]
    pub fn get_window<T: DeserializeOwned>(
        &self,
        community: &str,
        scope: &Scope,
        kind: WindowArtifact,
    ) -> Result<Option<T>, StorageError> {
        self.get_json(CF_WINDOWS, &ArtifactKey::new(community, kind.name(scope)))
    }

    /// Restore a window artifact by its full name.
    pub fn get_window_by_name<T: DeserializeOwned>(
        &self,
        community: &str,
        name: &str,
    ) -> Result<Option<T>, StorageError> {
        self.get_json(CF_WINDOWS, &ArtifactKey::new(community, name))
    }

    /// Whether a window artifact exists.
    pub fn has_window(
        &self,
        community: &str,
        scope: &Scope,
        kind: WindowArtifact,
    ) -> Result<bool, StorageError> {
        let key = ArtifactKey::new(community, kind.name(scope));
        Ok(self.get(CF_WINDOWS, &key.to_bytes())?.is_some())
    }

    /// Names of every stored window artifact of a community, parsed.
    ///
    /// Keys that do not parse as window artifact names are skipped.
    pub fn list_windows(
        &self,
        community: &str,
    ) -> Result<Vec<(Scope, WindowArtifact)>, StorageError> {
        let prefix = ArtifactKey::community_prefix(community);
        let mut found = Vec::new();
        for (key, _) in self.prefix_iterator(CF_WINDOWS, &prefix)? {
            let key = ArtifactKey::from_bytes(&key)?;
            if let Some(parsed) = WindowArtifact::parse_name(&key.name) {
                found.push(parsed);
            }
        }
        Ok(found)
    }

    /// Scopes holding a given artifact kind.
    pub fn window_scopes(
        &self,
        community: &str,
        kind: WindowArtifact,
    ) -> Result<BTreeSet<Scope>, StorageError> {
        Ok(self
            .list_windows(community)?
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .map(|(scope, _)| scope)
            .collect())
    }

    // ===== Globals =====

    /// Persist a cross-window global.
    #[instrument(skip_all, fields(community = %community, artifact = %artifact.name()))]
    pub fn put_global<T: Serialize>(
        &self,
        community: &str,
        artifact: GlobalArtifact,
        value: &T,
    ) -> Result<(), StorageError> {
        self.put_json(CF_GLOBALS, &ArtifactKey::new(community, artifact.name()), value)
    }

    /// Restore a cross-window global.
    #[instrument(skip_all, fields(community = %community, artifact = %artifact.name()))]
    pub fn get_global<T: DeserializeOwned>(
        &self,
        community: &str,
        artifact: GlobalArtifact,
    ) -> Result<Option<T>, StorageError> {
        self.get_json(CF_GLOBALS, &ArtifactKey::new(community, artifact.name()))
    }

    // ===== Checkpoints =====

    /// Store a checkpoint for resuming a session
    pub fn put_checkpoint(
        &self,
        community: &str,
        job_name: &str,
        checkpoint_bytes: &[u8],
    ) -> Result<(), StorageError> {
        let key = CheckpointKey::new(community, job_name);
        self.put(CF_CHECKPOINTS, &key.to_bytes(), checkpoint_bytes)
    }

    /// Get a checkpoint
    pub fn get_checkpoint(
        &self,
        community: &str,
        job_name: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let key = CheckpointKey::new(community, job_name);
        self.get(CF_CHECKPOINTS, &key.to_bytes())
    }

    // ===== Generic Column Family Operations =====

    /// Put a value into a specific column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    /// Get a value from a specific column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        let result = self.db.get_cf(&cf, key)?;
        Ok(result)
    }

    /// Collect entries with a given prefix in a column family.
    #[allow(clippy::type_complexity)]
    pub fn prefix_iterator(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(cf_name)?;

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }

    /// Flush all memtables to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            let cf = self.cf(cf_name)?;
            self.db.flush_cf(&cf)?;
        }
        Ok(())
    }

    // ===== Admin Operations =====

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        self.db.compact_range::<&[u8], &[u8]>(None, None);
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(&cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Trigger compaction on a specific column family.
    pub fn compact_cf(&self, cf_name: &str) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        info!(cf = %cf_name, "Starting compaction...");
        self.db.compact_range_cf::<&[u8], &[u8]>(&cf, None, None);
        info!(cf = %cf_name, "Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();

        if let Some(cf) = self.db.cf_handle(CF_WINDOWS) {
            stats.window_artifact_count = self.count_cf_entries(cf)?;
        }
        if let Some(cf) = self.db.cf_handle(CF_GLOBALS) {
            stats.global_count = self.count_cf_entries(cf)?;
        }
        if let Some(cf) = self.db.cf_handle(CF_CHECKPOINTS) {
            stats.checkpoint_count = self.count_cf_entries(cf)?;
        }

        stats.disk_usage_bytes = self.get_disk_usage();

        Ok(stats)
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        for item in iter {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let path = self.db.path();
        let mut total_size = 0u64;

        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }

        total_size
    }
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of stored window artifacts
    pub window_artifact_count: u64,
    /// Number of stored globals
    pub global_count: u64,
    /// Number of checkpoints
    pub checkpoint_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tdt_types::LabelTable;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    fn window() -> Scope {
        Scope::range(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
        )
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_window_artifact_roundtrip() {
        let (storage, _temp) = create_test_storage();
        let mut topics: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        topics.insert(1, vec![3, 4]);

        storage
            .put_window("news", &window(), WindowArtifact::Topics, &topics)
            .unwrap();
        let back: Option<BTreeMap<u32, Vec<u32>>> = storage
            .get_window("news", &window(), WindowArtifact::Topics)
            .unwrap();
        assert_eq!(back, Some(topics));

        let by_name: Option<BTreeMap<u32, Vec<u32>>> = storage
            .get_window_by_name("news", "20230101-20230102_Topics.tpc")
            .unwrap();
        assert!(by_name.is_some());
    }

    #[test]
    fn test_window_missing() {
        let (storage, _temp) = create_test_storage();
        let missing: Option<Vec<u32>> = storage
            .get_window("news", &window(), WindowArtifact::Assoc)
            .unwrap();
        assert!(missing.is_none());
        assert!(!storage
            .has_window("news", &window(), WindowArtifact::Assoc)
            .unwrap());
    }

    #[test]
    fn test_list_windows_per_community() {
        let (storage, _temp) = create_test_storage();
        storage
            .put_window("news", &window(), WindowArtifact::Topics, &1u32)
            .unwrap();
        storage
            .put_window("news", &Scope::AllDates, WindowArtifact::InfoTok, &2u32)
            .unwrap();
        storage
            .put_window("other", &window(), WindowArtifact::Topics, &3u32)
            .unwrap();

        let listed = storage.list_windows("news").unwrap();
        assert_eq!(listed.len(), 2);
        let scopes = storage.window_scopes("news", WindowArtifact::Topics).unwrap();
        assert_eq!(scopes.into_iter().collect::<Vec<_>>(), vec![window()]);
    }

    #[test]
    fn test_global_roundtrip() {
        let (storage, _temp) = create_test_storage();
        let mut labels = LabelTable::new();
        labels.intern("storm");
        labels.intern("coast");

        storage
            .put_global("news", GlobalArtifact::AllLabels, &labels)
            .unwrap();
        let back: LabelTable = storage
            .get_global("news", GlobalArtifact::AllLabels)
            .unwrap()
            .unwrap();
        assert_eq!(back.lookup("coast"), Some(2));
    }

    #[test]
    fn test_corrupt_artifact_names_the_artifact() {
        let (storage, _temp) = create_test_storage();
        let key = ArtifactKey::new("news", GlobalArtifact::AllDocs.name());
        storage.put(CF_GLOBALS, &key.to_bytes(), b"not json").unwrap();

        let err = storage
            .get_global::<Vec<u32>>("news", GlobalArtifact::AllDocs)
            .unwrap_err();
        assert!(err.to_string().contains("AllDocs.dtab"));
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let (storage, _temp) = create_test_storage();

        storage
            .put_checkpoint("news", "AllDates", b"checkpoint state")
            .unwrap();
        let retrieved = storage.get_checkpoint("news", "AllDates").unwrap();
        assert_eq!(retrieved, Some(b"checkpoint state".to_vec()));
        assert!(storage.get_checkpoint("news", "Other").unwrap().is_none());
    }

    #[test]
    fn test_stats_and_compact() {
        let (storage, _temp) = create_test_storage();
        storage
            .put_window("news", &window(), WindowArtifact::Topics, &1u32)
            .unwrap();
        storage
            .put_global("news", GlobalArtifact::Unused, &Vec::<u32>::new())
            .unwrap();
        storage.compact().unwrap();
        storage.compact_cf(CF_WINDOWS).unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.window_artifact_count, 1);
        assert_eq!(stats.global_count, 1);
        assert_eq!(stats.checkpoint_count, 0);
    }

    #[test]
    fn test_compact_unknown_cf() {
        let (storage, _temp) = create_test_storage();
        assert!(matches!(
            storage.compact_cf("nope"),
            Err(StorageError::ColumnFamilyNotFound(_))
        ));
    }
}
