// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_cache::CoreCache;
use bitxor_local_state::LocalNodeChainScore;
use bitxor_models::amount::ChainScore;
use bitxor_spooling::{SpoolingError, StateChangeInfo, StateChangeSubscriber};
use tracing::debug;

/// Applies replayed state changes to the cache and the chain score.
/// Changes at or below the cache height are already part of the cache and are skipped.
pub struct StateChangeRepairingSubscriber<'a> {
    cache: &'a CoreCache,
    score: &'a LocalNodeChainScore,
}

impl<'a> StateChangeRepairingSubscriber<'a> {
    /// Subscriber repairing `cache` and `score`
    pub fn new(cache: &'a CoreCache, score: &'a LocalNodeChainScore) -> Self {
        StateChangeRepairingSubscriber { cache, score }
    }
}

impl<'a> StateChangeSubscriber for StateChangeRepairingSubscriber<'a> {
    fn notify_score_change(&mut self, score: ChainScore) -> Result<(), SpoolingError> {
        self.score.set(score);
        Ok(())
    }

    fn notify_state_change(&mut self, info: &StateChangeInfo) -> Result<(), SpoolingError> {
        let cache_height = self.cache.height();
        if info.height <= cache_height {
            debug!(
                "skipping state change at {}, cache is at {}",
                info.height, cache_height
            );
            return Ok(());
        }

        let mut delta = self.cache.create_delta();
        delta.apply_changes(&info.cache_changes)?;
        self.cache.commit(delta, info.height)?;
        self.score.add(info.score_delta);
        debug!("applied state change at {}", info.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_cache::{CacheConfiguration, CacheDelta, DependentState};
    use bitxor_models::height::Height;

    fn change_at(cache: &CoreCache, height: u64, transactions: u64) -> StateChangeInfo {
        let mut delta: CacheDelta = cache.create_delta();
        delta.dependent_state_mut().num_total_transactions = transactions;
        StateChangeInfo {
            cache_changes: delta.changes(),
            score_delta: ChainScore::new(10),
            height: Height(height),
        }
    }

    #[test]
    fn changes_above_cache_height_are_committed() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let score = LocalNodeChainScore::new(ChainScore::new(5));
        let change = change_at(&cache, 3, 7);
        let mut subscriber = StateChangeRepairingSubscriber::new(&cache, &score);

        subscriber.notify_state_change(&change).unwrap();

        assert_eq!(cache.height(), Height(3));
        assert_eq!(
            *cache.create_view().dependent_state(),
            DependentState {
                num_total_transactions: 7,
                ..DependentState::default()
            }
        );
        assert_eq!(score.get(), ChainScore::new(15));
    }

    #[test]
    fn changes_at_or_below_cache_height_are_skipped() {
        let cache = CoreCache::new(CacheConfiguration::default());
        cache.commit(cache.create_delta(), Height(4)).unwrap();
        let score = LocalNodeChainScore::new(ChainScore::new(5));
        let mut subscriber = StateChangeRepairingSubscriber::new(&cache, &score);

        for height in [3, 4] {
            subscriber
                .notify_state_change(&change_at(&cache, height, 7))
                .unwrap();
        }

        assert_eq!(cache.height(), Height(4));
        assert_eq!(cache.create_view().dependent_state().num_total_transactions, 0);
        assert_eq!(score.get(), ChainScore::new(5));
    }

    #[test]
    fn score_change_replaces_score() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let score = LocalNodeChainScore::new(ChainScore::new(5));
        let mut subscriber = StateChangeRepairingSubscriber::new(&cache, &score);

        subscriber.notify_score_change(ChainScore::new(42)).unwrap();

        assert_eq!(score.get(), ChainScore::new(42));
    }
}
