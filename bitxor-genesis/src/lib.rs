// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Genesis block loading.
//!
//! The genesis block seeds every initial balance, namespace and token of the network. Loading
//! it checks the block against the network fingerprint, executes it at the genesis height and
//! enforces the network wide funding constraints before its hashes are compared.

#![warn(missing_docs)]

mod builder;
mod error;
mod funding;
mod loader;
mod publisher;

pub use builder::GenesisBlockBuilder;
pub use error::GenesisError;
pub use funding::{GenesisFundingObserver, GenesisFundingState, GenesisFundingType};
pub use loader::{
    generation_hash_from_proof_hash, GenesisBlockLoader, GenesisHashes, StateHashVerification,
};
pub use publisher::GenesisNotificationPublisher;

#[cfg(any(test, feature = "test-exports"))]
pub mod test_exports;

#[cfg(test)]
mod tests;
