// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! # General description
//!
//! Durable state of the local node: the cache, the block storage and the chain score.
//!
//! The state is saved in `<data>/state`: one file per sub cache followed by
//! `supplemental.dat`, which holds the dependent state, the chain score and the cache height.
//! When the cache database is enabled, database backed sub caches only save a summary.
//!
//! Every write spanning several locations goes through a staging area first and records its
//! progress in `commit_step.dat`, so that recovery can tell which copy is valid:
//! * `Blocks_Written`: blocks are staged in `spool/block_sync`, the state is not durable
//! * `State_Written`: the new state is complete in `state.tmp`
//! * `All_Updated`: everything is in place

#![warn(missing_docs)]

mod committer;
mod error;
mod factory;
mod file_storage;
mod state_ref;

pub use committer::ChainCommitter;
pub use error::LocalStateError;
pub use factory::{create_block_storage, create_cache, CACHE_DATABASE_DIRECTORY};
pub use file_storage::{
    has_serialized_state, load_dependent_state_from_directory, load_state_from_directory,
    read_supplemental_data, save_state_to_directory_with_checkpointing, CommitInterruption,
    LocalNodeStateSerializer, SUPPLEMENTAL_DATA_FILENAME,
};
#[cfg(any(test, feature = "test-exports"))]
pub use file_storage::save_state_to_directory_with_interruption;
pub use state_ref::{
    calculate_block_score, LocalNodeChainScore, LocalNodeStateRef, StateHeights,
};

#[cfg(any(test, feature = "test-exports"))]
pub mod test_exports;

#[cfg(test)]
mod tests;
