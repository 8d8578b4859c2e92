// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_hash::{Hash, MerkleHashBuilder};

/// State hash and the sub cache Merkle roots it was derived from
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StateHashInfo {
    /// aggregate state hash, zero when verifiable state is disabled
    pub state_hash: Hash,
    /// one root per verifiable sub cache, in registration order
    pub sub_cache_merkle_roots: Vec<Hash>,
}

impl StateHashInfo {
    /// Aggregates `roots` into a state hash
    pub fn from_roots(roots: Vec<Hash>) -> Self {
        let parts: Vec<&[u8]> = roots.iter().map(|root| root.to_bytes().as_slice()).collect();
        StateHashInfo {
            state_hash: Hash::compute_from_tuple(&parts),
            sub_cache_merkle_roots: roots,
        }
    }
}

/// Merkle root over sorted entries, each leaf being the hash of key and value
pub(crate) fn merkle_root<'a>(entries: impl Iterator<Item = (&'a [u8], &'a [u8])>) -> Hash {
    let mut builder = MerkleHashBuilder::new();
    for (key, value) in entries {
        builder.update(Hash::compute_from_tuple(&[key, value]));
    }
    builder.final_hash()
}
