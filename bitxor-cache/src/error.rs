// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_db_exports::CacheDbError;
use bitxor_models::address::Address;
use bitxor_models::height::Height;
use bitxor_models::token::TokenId;
use displaydoc::Display;
use thiserror::Error;

/// cache error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum CacheError {
    /// serialization error: {0}
    Serialization(String),
    /// deserialization error in {name}: {reason}
    Deserialization {
        /// sub cache or structure being decoded
        name: String,
        /// rendered parser error
        reason: String,
    },
    /// cannot commit at height {height}, cache is at height {cache_height}
    NonMonotonicCommit {
        /// requested height
        height: Height,
        /// committed height
        cache_height: Height,
    },
    /// cannot recommit at height {height}, cache is at height {cache_height}
    InvalidRecommit {
        /// requested height
        height: Height,
        /// committed height
        cache_height: Height,
    },
    /// delta was created from a view that is no longer the committed one
    StaleDelta,
    /// sub cache {0} can only be bulk loaded into an empty cache
    AlreadyLoaded(String),
    /// cache database error: {0}
    Database(#[from] CacheDbError),
    /// cache database storage is required to load the summary of {0}
    DatabaseNotEnabled(String),
    /// io error: {0}
    Io(#[from] std::io::Error),
    /// corrupted storage for {name}: {reason}
    CorruptedStorage {
        /// sub cache name
        name: String,
        /// what is wrong
        reason: String,
    },
    /// account {address} has insufficient balance of token {token_id}
    InsufficientBalance {
        /// account
        address: Address,
        /// token
        token_id: TokenId,
    },
    /// balance of token {token_id} overflows for account {address}
    BalanceOverflow {
        /// account
        address: Address,
        /// token
        token_id: TokenId,
    },
}

impl From<bitxor_serialization::SerializeError> for CacheError {
    fn from(err: bitxor_serialization::SerializeError) -> Self {
        CacheError::Serialization(err.to_string())
    }
}
