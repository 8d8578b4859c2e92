// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::hash::Hash;

/// Accumulates hashes and computes their Merkle root.
///
/// Leaves are paired left to right; an odd trailing node is paired with itself.
/// No leaves hash to the zero hash and a single leaf is its own root.
#[derive(Debug, Default, Clone)]
pub struct MerkleHashBuilder {
    leaves: Vec<Hash>,
}

impl MerkleHashBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with capacity for `count` leaves
    pub fn with_capacity(count: usize) -> Self {
        MerkleHashBuilder {
            leaves: Vec::with_capacity(count),
        }
    }

    /// Append a leaf
    pub fn update(&mut self, hash: Hash) {
        self.leaves.push(hash);
    }

    /// Consume the builder and compute the root
    pub fn final_hash(self) -> Hash {
        let mut level = self.leaves;
        if level.is_empty() {
            return Hash::zero();
        }

        while level.len() > 1 {
            if level.len() % 2 == 1 {
                let last = level[level.len() - 1];
                level.push(last);
            }
            level = level
                .chunks_exact(2)
                .map(|pair| Hash::compute_from_tuple(&[pair[0].to_bytes().as_slice(), pair[1].to_bytes().as_slice()]))
                .collect();
        }
        level[0]
    }
}
