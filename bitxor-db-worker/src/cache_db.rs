// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_db_exports::{
    CacheDatabaseConfig, CacheDatabaseController, CacheDbBatch, CacheDbError, Key,
    ShareableCacheDatabase, Value, HEIGHT_KEY, METADATA_CF,
};
use bitxor_models::height::Height;
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use tracing::debug;

/// RocksDB backed cache database: one column family per sub cache plus `metadata`
pub struct CacheDatabase {
    db: DB,
    config: CacheDatabaseConfig,
}

impl std::fmt::Debug for CacheDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheDatabase({})", self.config.path.display())
    }
}

impl CacheDatabase {
    pub fn default_db_opts(max_open_files: i32) -> Options {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(max_open_files);
        db_opts
    }

    pub fn new(config: CacheDatabaseConfig) -> Result<Self, CacheDbError> {
        let db_opts = Self::default_db_opts(config.max_open_files);
        let mut descriptors = vec![ColumnFamilyDescriptor::new(
            METADATA_CF,
            Options::default(),
        )];
        descriptors.extend(
            config
                .columns
                .iter()
                .map(|column| ColumnFamilyDescriptor::new(column, Options::default())),
        );
        let db = DB::open_cf_descriptors(&db_opts, &config.path, descriptors)
            .map_err(|err| CacheDbError::RocksDBError(err.to_string()))?;
        debug!(
            "opened cache database at {} with {} columns",
            config.path.display(),
            config.columns.len()
        );
        Ok(CacheDatabase { db, config })
    }

    /// Opens the database and wraps it for sharing between the cache and its storages
    pub fn new_shareable(config: CacheDatabaseConfig) -> Result<ShareableCacheDatabase, CacheDbError> {
        let db = CacheDatabase::new(config)?;
        Ok(Arc::new(RwLock::new(
            Box::new(db) as Box<dyn CacheDatabaseController>
        )))
    }

    fn handle(&self, column: &str) -> Result<&rocksdb::ColumnFamily, CacheDbError> {
        self.db
            .cf_handle(column)
            .ok_or_else(|| CacheDbError::UnknownColumn(column.to_string()))
    }
}

impl CacheDatabaseController for CacheDatabase {
    fn write_batch(&mut self, batch: CacheDbBatch, height: Height) -> Result<(), CacheDbError> {
        let mut write_batch = WriteBatch::default();
        for (column, changes) in batch.iter() {
            let handle = self.handle(column)?;
            for (key, value) in changes.iter() {
                match value {
                    Some(value) => write_batch.put_cf(handle, key, value),
                    None => write_batch.delete_cf(handle, key),
                }
            }
        }
        write_batch.put_cf(self.handle(METADATA_CF)?, HEIGHT_KEY, height.0.to_le_bytes());
        self.db
            .write(write_batch)
            .map_err(|err| CacheDbError::RocksDBError(err.to_string()))
    }

    fn get_height(&self) -> Result<Option<Height>, CacheDbError> {
        let raw = self
            .db
            .get_cf(self.handle(METADATA_CF)?, HEIGHT_KEY)
            .map_err(|err| CacheDbError::RocksDBError(err.to_string()))?;
        match raw {
            None => Ok(None),
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    CacheDbError::CorruptedHeight(format!("{} bytes", bytes.len()))
                })?;
                Ok(Some(Height(u64::from_le_bytes(bytes))))
            }
        }
    }

    fn get_cf(&self, column: &str, key: &[u8]) -> Result<Option<Value>, CacheDbError> {
        self.db
            .get_cf(self.handle(column)?, key)
            .map_err(|err| CacheDbError::RocksDBError(err.to_string()))
    }

    fn iterate_column(&self, column: &str) -> Result<Vec<(Key, Value)>, CacheDbError> {
        self.db
            .iterator_cf(self.handle(column)?, IteratorMode::Start)
            .map(|item| {
                item.map(|(key, value)| (key.to_vec(), value.to_vec()))
                    .map_err(|err| CacheDbError::RocksDBError(err.to_string()))
            })
            .collect()
    }

    fn flush(&self) -> Result<(), CacheDbError> {
        self.db
            .flush()
            .map_err(|err| CacheDbError::RocksDBError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CacheDatabaseConfig {
        CacheDatabaseConfig {
            path: dir.path().join("db"),
            columns: vec!["accounts".to_string()],
            max_open_files: 16,
        }
    }

    #[test]
    fn batch_and_height_are_written_together() {
        let dir = TempDir::new().unwrap();
        let mut db = CacheDatabase::new(config(&dir)).unwrap();
        assert_eq!(db.get_height().unwrap(), None);

        let mut batch = CacheDbBatch::new();
        let mut column = BTreeMap::new();
        column.insert(b"a".to_vec(), Some(b"1".to_vec()));
        column.insert(b"b".to_vec(), Some(b"2".to_vec()));
        batch.insert("accounts".to_string(), column);
        db.write_batch(batch, Height(3)).unwrap();

        let mut batch = CacheDbBatch::new();
        let mut column = BTreeMap::new();
        column.insert(b"a".to_vec(), None);
        batch.insert("accounts".to_string(), column);
        db.write_batch(batch, Height(4)).unwrap();

        assert_eq!(db.get_height().unwrap(), Some(Height(4)));
        assert_eq!(
            db.iterate_column("accounts").unwrap(),
            vec![(b"b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn content_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut db = CacheDatabase::new(config(&dir)).unwrap();
            let mut batch = CacheDbBatch::new();
            batch.insert(
                "accounts".to_string(),
                BTreeMap::from([(b"k".to_vec(), Some(b"v".to_vec()))]),
            );
            db.write_batch(batch, Height(1)).unwrap();
        }
        let db = CacheDatabase::new(config(&dir)).unwrap();
        assert_eq!(db.get_cf("accounts", b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get_height().unwrap(), Some(Height(1)));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let dir = TempDir::new().unwrap();
        let db = CacheDatabase::new(config(&dir)).unwrap();
        assert_matches!(
            db.iterate_column("tokens"),
            Err(CacheDbError::UnknownColumn(_))
        );
    }
}
