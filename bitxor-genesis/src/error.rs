// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_cache::CacheError;
use bitxor_chain::{ChainError, ValidationFailure};
use bitxor_hash::Hash;
use bitxor_io::IoError;
use bitxor_models::ModelsError;
use displaydoc::Display;
use thiserror::Error;

/// genesis error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum GenesisError {
    /// invalid genesis block: {0}
    InvalidArgument(String),
    /// {description} with {result}
    ValidationFailed {
        /// what failed
        description: String,
        /// validation failure code
        result: ValidationFailure,
    },
    /// genesis consistency check failed: {0}
    Consistency(String),
    /// {description} does not match: expected {expected}, calculated {calculated}
    HashMismatch {
        /// which hash
        description: &'static str,
        /// hash in the genesis block
        expected: Hash,
        /// hash calculated by executing the genesis block
        calculated: Hash,
    },
    /// genesis execution error: {0}
    Execution(#[from] ChainError),
    /// cache error: {0}
    Cache(#[from] CacheError),
    /// block storage error: {0}
    Storage(#[from] IoError),
    /// models error: {0}
    Models(#[from] ModelsError),
}
