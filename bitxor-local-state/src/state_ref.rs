// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::LocalStateError;
use bitxor_cache::CoreCache;
use bitxor_io::{BlockStorage, BlockStorageCache};
use bitxor_models::amount::ChainScore;
use bitxor_models::block::BlockHeader;
use bitxor_models::config::BitxorCoreConfiguration;
use bitxor_models::height::Height;
use parking_lot::RwLock;

/// Chain score of the local node, shared between the threads of the node
#[derive(Debug, Default)]
pub struct LocalNodeChainScore {
    score: RwLock<ChainScore>,
}

impl LocalNodeChainScore {
    /// Score starting at `score`
    pub fn new(score: ChainScore) -> Self {
        LocalNodeChainScore {
            score: RwLock::new(score),
        }
    }

    /// Current score
    pub fn get(&self) -> ChainScore {
        *self.score.read()
    }

    /// Adds `delta`, saturating
    pub fn add(&self, delta: ChainScore) -> ChainScore {
        let mut score = self.score.write();
        *score = score.add(delta);
        *score
    }

    /// Replaces the score
    pub fn set(&self, score: ChainScore) {
        *self.score.write() = score;
    }
}

/// Score added by `block` on top of `parent`: its difficulty minus the seconds elapsed since
/// the parent, saturating at zero
pub fn calculate_block_score(parent: &BlockHeader, block: &BlockHeader) -> ChainScore {
    let elapsed_seconds = block.timestamp.millis_since(parent.timestamp) / 1_000;
    ChainScore::new(block.difficulty.saturating_sub(elapsed_seconds) as u128)
}

/// Borrowed references to the durable parts of the local node state
#[derive(Clone, Copy)]
pub struct LocalNodeStateRef<'a> {
    /// node configuration
    pub config: &'a BitxorCoreConfiguration,
    /// ledger state
    pub cache: &'a CoreCache,
    /// block storage
    pub storage: &'a BlockStorageCache,
    /// chain score
    pub score: &'a LocalNodeChainScore,
}

impl<'a> LocalNodeStateRef<'a> {
    /// Groups the state references
    pub fn new(
        config: &'a BitxorCoreConfiguration,
        cache: &'a CoreCache,
        storage: &'a BlockStorageCache,
        score: &'a LocalNodeChainScore,
    ) -> Self {
        LocalNodeStateRef {
            config,
            cache,
            storage,
            score,
        }
    }

    /// Current heights of the cache and of the block storage
    pub fn heights(&self) -> Result<StateHeights, LocalStateError> {
        Ok(StateHeights {
            cache: self.cache.height(),
            storage: self.storage.view().chain_height()?,
        })
    }
}

/// Heights of the loaded cache and of the block storage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateHeights {
    /// cache height
    pub cache: Height,
    /// block storage height
    pub storage: Height,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_io::test_exports::create_block_element;
    use bitxor_models::timestamp::Timestamp;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn score_is_accumulated_across_threads() {
        let score = Arc::new(LocalNodeChainScore::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let score = score.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        score.add(ChainScore::new(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(score.get(), ChainScore::new(400));

        score.set(ChainScore::new(7));
        assert_eq!(score.add(ChainScore::new(u128::MAX)), ChainScore::new(u128::MAX));
    }

    #[test]
    fn block_score_subtracts_elapsed_seconds() {
        let parent = create_block_element(1).block.header;
        let mut block = create_block_element(2).block.header;
        block.difficulty = 100;

        block.timestamp = Timestamp(parent.timestamp.0 + 15_999);
        assert_eq!(calculate_block_score(&parent, &block), ChainScore::new(85));

        block.timestamp = Timestamp(parent.timestamp.0 + 1_000_000);
        assert_eq!(calculate_block_score(&parent, &block), ChainScore::new(0));
    }
}
