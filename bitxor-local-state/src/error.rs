// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::file_storage::CommitInterruption;
use bitxor_cache::CacheError;
use bitxor_chain::ChainError;
use bitxor_db_exports::CacheDbError;
use bitxor_genesis::GenesisError;
use bitxor_io::IoError;
use bitxor_models::height::Height;
use bitxor_spooling::SpoolingError;
use displaydoc::Display;
use thiserror::Error;

/// local node state error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum LocalStateError {
    /// io error: {0}
    Io(#[from] IoError),
    /// cache error: {0}
    Cache(#[from] CacheError),
    /// cache database error: {0}
    Database(#[from] CacheDbError),
    /// genesis error: {0}
    Genesis(#[from] GenesisError),
    /// block execution error: {0}
    Execution(#[from] ChainError),
    /// spooling error: {0}
    Spooling(#[from] SpoolingError),
    /// corrupted supplemental data in {path}: {reason}
    CorruptedSupplementalData {
        /// file being decoded
        path: String,
        /// rendered parser error
        reason: String,
    },
    /// cache height {cache} does not match storage height {storage}
    HeightMismatch {
        /// cache height
        cache: Height,
        /// block storage height
        storage: Height,
    },
    /// cannot commit blocks {start} to {end} on top of height {chain_height}
    NonContiguousBlocks {
        /// first block height
        start: Height,
        /// last block height
        end: Height,
        /// current chain height
        chain_height: Height,
    },
    /// commit interrupted at {0:?}
    Interrupted(CommitInterruption),
}
