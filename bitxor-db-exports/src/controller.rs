// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::CacheDbError;
use bitxor_models::height::Height;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

pub type Key = Vec<u8>;
pub type Value = Vec<u8>;

/// Changes of one column: `Some` puts the value, `None` deletes the key
pub type ColumnBatch = BTreeMap<Key, Option<Value>>;

/// Changes grouped by column family name
pub type CacheDbBatch = BTreeMap<String, ColumnBatch>;

pub type ShareableCacheDatabase = Arc<RwLock<Box<dyn CacheDatabaseController>>>;

#[cfg_attr(feature = "test-exports", mockall::automock)]
pub trait CacheDatabaseController: Send + Sync + Debug {
    /// Atomically writes the batch along with the height it brings the database to
    fn write_batch(&mut self, batch: CacheDbBatch, height: Height) -> Result<(), CacheDbError>;

    /// Height of the last written batch, `None` for a fresh database
    fn get_height(&self) -> Result<Option<Height>, CacheDbError>;

    /// Exposes RocksDB's "get_cf" function
    fn get_cf(&self, column: &str, key: &[u8]) -> Result<Option<Value>, CacheDbError>;

    /// Every key and value of a column, in key order
    fn iterate_column(&self, column: &str) -> Result<Vec<(Key, Value)>, CacheDbError>;

    /// Flushes memtables to disk
    fn flush(&self) -> Result<(), CacheDbError>;
}
