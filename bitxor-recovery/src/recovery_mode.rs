// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::RecoveryError;
use bitxor_local_state::StateHeights;
use bitxor_models::config::NodeConfiguration;
use bitxor_models::height::Height;

/// What loading the saved state requires before the node can run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateRecoveryMode {
    /// the cache matches the block storage
    None,
    /// the blocks above the cache height must be executed
    Repair,
    /// only the genesis state is available for a longer chain, an import is required
    Reseed,
}

/// Decides how the loaded cache catches up with the block storage
pub fn calculate_state_recovery_mode(
    config: &NodeConfiguration,
    heights: StateHeights,
) -> Result<StateRecoveryMode, RecoveryError> {
    if heights.cache == heights.storage {
        return Ok(StateRecoveryMode::None);
    }
    if heights.cache == Height(1) && heights.storage > Height(1) {
        return Ok(StateRecoveryMode::Reseed);
    }
    if heights.cache > heights.storage {
        return Err(RecoveryError::InvalidHeights {
            cache: heights.cache,
            storage: heights.storage,
        });
    }

    // the cache database is caught up by the state change replay
    Ok(if config.enable_cache_database_storage {
        StateRecoveryMode::None
    } else {
        StateRecoveryMode::Repair
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bitxor_models::config::CacheDatabaseSettings;

    fn mode(cache: u64, storage: u64, enable_cache_db: bool) -> Result<StateRecoveryMode, RecoveryError> {
        let config = NodeConfiguration {
            enable_cache_database_storage: enable_cache_db,
            file_database_batch_size: 100,
            loader_batch_size: 10,
            cache_database: CacheDatabaseSettings::default(),
        };
        calculate_state_recovery_mode(
            &config,
            StateHeights {
                cache: Height(cache),
                storage: Height(storage),
            },
        )
    }

    #[test]
    fn equal_heights_need_nothing() {
        for (height, enable_cache_db) in [(1, false), (1, true), (10, false), (10, true)] {
            assert_eq!(
                mode(height, height, enable_cache_db).unwrap(),
                StateRecoveryMode::None
            );
        }
    }

    #[test]
    fn genesis_cache_below_longer_chain_needs_reseed() {
        assert_eq!(mode(1, 10, false).unwrap(), StateRecoveryMode::Reseed);
        assert_eq!(mode(1, 10, true).unwrap(), StateRecoveryMode::Reseed);
    }

    #[test]
    fn cache_above_storage_is_rejected() {
        for (cache, storage) in [(10, 9), (10, 1)] {
            for enable_cache_db in [false, true] {
                assert_matches!(
                    mode(cache, storage, enable_cache_db),
                    Err(RecoveryError::InvalidHeights { .. })
                );
            }
        }
    }

    #[test]
    fn cache_below_storage_is_repaired_without_cache_database() {
        assert_eq!(mode(2, 10, false).unwrap(), StateRecoveryMode::Repair);
        assert_eq!(mode(9, 10, false).unwrap(), StateRecoveryMode::Repair);
        assert_eq!(mode(2, 10, true).unwrap(), StateRecoveryMode::None);
        assert_eq!(mode(9, 10, true).unwrap(), StateRecoveryMode::None);
    }
}
