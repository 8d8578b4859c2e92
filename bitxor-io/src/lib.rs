// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Filesystem primitives of the node: data directory layout, index files,
//! the commit step marker and height indexed block storage.

#![warn(missing_docs)]

mod block_storage;
mod block_storage_cache;
mod commit_step;
mod directory;
mod error;
mod index_file;

pub use block_storage::{move_block_files, find_start_height, BlockStorage, FileBlockStorage};
pub use block_storage_cache::{BlockStorageCache, BlockStorageModifier, BlockStorageView};
pub use commit_step::{CommitOperationStep, COMMIT_STEP_FILENAME};
pub use directory::{purge_directory, DataDirectory, Directory};
pub use error::IoError;
pub use index_file::IndexFile;

#[cfg(any(test, feature = "test-exports"))]
pub mod test_exports;
