// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_cache::CacheError;
use bitxor_io::IoError;
use displaydoc::Display;
use thiserror::Error;

/// spooling error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum SpoolingError {
    /// io error: {0}
    Io(#[from] IoError),
    /// message {index} of {queue} is corrupted: {reason}
    CorruptedMessage {
        /// queue directory
        queue: String,
        /// message index
        index: u64,
        /// what is wrong
        reason: String,
    },
    /// serialization error: {0}
    Serialization(String),
    /// subscriber error: {0}
    Subscriber(String),
    /// cache error: {0}
    Cache(#[from] CacheError),
}

impl From<bitxor_serialization::SerializeError> for SpoolingError {
    fn from(err: bitxor_serialization::SerializeError) -> Self {
        SpoolingError::Serialization(err.to_string())
    }
}
