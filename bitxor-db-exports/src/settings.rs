// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use std::path::PathBuf;

/// Config structure for a `CacheDatabase`
#[derive(Debug, Clone)]
pub struct CacheDatabaseConfig {
    /// The path to the database, used in the wrapped RocksDB instance
    pub path: PathBuf,
    /// One column family per sub cache, in addition to the metadata column
    pub columns: Vec<String>,
    /// Maximum number of files kept open by RocksDB
    pub max_open_files: i32,
}
