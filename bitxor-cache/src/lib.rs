// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! # General description
//!
//! The cache holds the ledger state in independently versioned sub caches
//! (accounts, block statistics, namespaces, tokens).
//!
//! Readers work against an immutable `CacheView`. The single writer works against a
//! `CacheDelta`, an overlay on top of the view it was created from. `CoreCache::commit`
//! swaps the committed snapshot for the delta content at a strictly increasing height,
//! atomically with respect to view creation.
//!
//! When a cache database is configured, every commit also writes the delta changes and
//! the new height to it in a single batch. Sub cache storages then only need to save a
//! summary of the database backed sub caches.

#![warn(missing_docs)]

mod accounts;
mod block_statistics;
mod changes;
mod core_cache;
mod dependent_state;
mod error;
mod namespaces;
mod state_hash;
mod storage;
mod sub_cache;
mod tokens;

pub use accounts::{AccountState, AccountStateCache};
pub use block_statistics::{BlockStatistic, BlockStatisticCache};
pub use changes::{CacheChanges, CacheChangesDeserializer, CacheChangesSerializer, SubCacheChanges};
pub use core_cache::{CacheConfiguration, CacheDelta, CacheView, CoreCache};
pub use dependent_state::{
    DependentState, DependentStateDeserializer, DependentStateSerializer, SupplementalData,
    SupplementalDataDeserializer, SupplementalDataSerializer,
};
pub use error::CacheError;
pub use namespaces::{NamespaceCache, NamespaceEntry};
pub use state_hash::StateHashInfo;
pub use storage::{CacheStorage, StorageFormat, SubCacheStorage};
pub use sub_cache::{SubCacheDescriptor, SubCacheId, SubCacheModifier, SubCacheReader};
pub use tokens::{TokenCache, TokenEntry};
