// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_models::height::Height;
use displaydoc::Display;
use std::path::PathBuf;
use thiserror::Error;

/// filesystem and block storage errors
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum IoError {
    /// io error on {path}: {source}
    Io {
        /// file or directory the operation was about
        path: PathBuf,
        /// underlying error
        source: std::io::Error,
    },
    /// index file {0} does not exist
    MissingIndex(PathBuf),
    /// index file {0} is corrupted
    CorruptedIndex(PathBuf),
    /// invalid commit step value {0}
    InvalidCommitStep(u64),
    /// block at height {0} not found
    BlockNotFound(Height),
    /// block at height {height} is corrupted: {reason}
    CorruptedBlock {
        /// height of the block
        height: Height,
        /// why decoding failed
        reason: String,
    },
    /// cannot save block at height {height} on top of chain height {chain_height}
    InvalidBlockHeight {
        /// height of the block being saved
        height: Height,
        /// current chain height
        chain_height: Height,
    },
    /// serialization error: {0}
    Serialization(String),
}

impl IoError {
    /// Wraps a `std::io::Error` with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IoError::Io {
            path: path.into(),
            source,
        }
    }
}
