// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use displaydoc::Display;
use thiserror::Error;

#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum CacheDbError {
    /// rocksdb error: {0}
    RocksDBError(String),
    /// unknown column family: {0}
    UnknownColumn(String),
    /// stored height is corrupted: {0}
    CorruptedHeight(String),
}
