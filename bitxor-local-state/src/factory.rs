// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::LocalStateError;
use bitxor_cache::{CacheConfiguration, CoreCache, SubCacheId};
use bitxor_db_exports::CacheDatabaseConfig;
use bitxor_db_worker::CacheDatabase;
use bitxor_io::{BlockStorageCache, DataDirectory, FileBlockStorage};
use bitxor_models::config::BitxorCoreConfiguration;
use tracing::info;

/// Name of the cache database directory inside the data directory
pub const CACHE_DATABASE_DIRECTORY: &str = "statedb";

/// Creates an empty cache, opening the cache database when it is enabled
pub fn create_cache(
    config: &BitxorCoreConfiguration,
    data_directory: &DataDirectory,
) -> Result<CoreCache, LocalStateError> {
    let database = if config.node.enable_cache_database_storage {
        let path = data_directory.dir(CACHE_DATABASE_DIRECTORY).path().to_path_buf();
        info!("opening cache database in {}", path.display());
        Some(CacheDatabase::new_shareable(CacheDatabaseConfig {
            path,
            columns: SubCacheId::database_columns(),
            max_open_files: config.node.cache_database.max_open_files,
        })?)
    } else {
        None
    };
    Ok(CoreCache::new(CacheConfiguration {
        enable_verifiable_state: config.blockchain.enable_verifiable_state,
        database,
    }))
}

/// Block storage kept at the root of the data directory
pub fn create_block_storage(data_directory: &DataDirectory) -> BlockStorageCache {
    BlockStorageCache::new(Box::new(FileBlockStorage::new(
        data_directory.root().clone(),
    )))
}
