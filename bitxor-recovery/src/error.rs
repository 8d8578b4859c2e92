// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_cache::CacheError;
use bitxor_chain::ChainError;
use bitxor_io::IoError;
use bitxor_local_state::LocalStateError;
use bitxor_models::height::Height;
use bitxor_spooling::SpoolingError;
use displaydoc::Display;
use thiserror::Error;

/// recovery error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum RecoveryError {
    /// io error: {0}
    Io(#[from] IoError),
    /// local state error: {0}
    LocalState(#[from] LocalStateError),
    /// spooling error: {0}
    Spooling(#[from] SpoolingError),
    /// cache error: {0}
    Cache(#[from] CacheError),
    /// block execution error: {0}
    Execution(#[from] ChainError),
    /// reseed operation detected (cache height {cache}, storage height {storage}), please use the importer tool
    Reseed {
        /// loaded cache height
        cache: Height,
        /// block storage height
        storage: Height,
    },
    /// cache height {cache} is above storage height {storage}
    InvalidHeights {
        /// loaded cache height
        cache: Height,
        /// block storage height
        storage: Height,
    },
}
