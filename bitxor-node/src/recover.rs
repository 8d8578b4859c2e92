// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use anyhow::Result;
use bitxor_chain::PluginManager;
use bitxor_local_state::StateHeights;
use bitxor_models::amount::ChainScore;
use bitxor_models::config::BitxorCoreConfiguration;
use bitxor_recovery::RecoveryOrchestrator;
use bitxor_spooling::SubscriptionManager;

/// Recovers the data directory of `config` with no registered subscriber.
/// Returns the recovered heights and chain score.
pub fn run_recovery(config: BitxorCoreConfiguration) -> Result<(StateHeights, ChainScore)> {
    let plugins = PluginManager::with_builtin_plugins(config.blockchain.clone())?;
    let mut subscription_manager = SubscriptionManager::new();
    let mut orchestrator = RecoveryOrchestrator::new(config, plugins, &mut subscription_manager)?;
    orchestrator.boot()?;
    let heights = orchestrator.heights()?;
    let score = orchestrator.score();
    orchestrator.shutdown()?;
    Ok((heights, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_io::CommitOperationStep;
    use bitxor_local_state::test_exports::LocalNodeTestContext;
    use bitxor_local_state::CommitInterruption;
    use bitxor_models::height::Height;
    use tempfile::TempDir;

    #[test]
    fn interrupted_commit_is_completed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let config = {
            let context = LocalNodeTestContext::new(&root, false);
            context.load_state();
            let (delta, blocks, score) = context.execute_blocks(2);
            assert!(context
                .committer()
                .with_interruption(CommitInterruption::AfterStateWritten)
                .commit(delta, &blocks, score)
                .is_err());
            context.config.clone()
        };

        let (heights, _) = run_recovery(config).unwrap();

        heights.ensure_consistent().unwrap();
        assert_eq!(heights.cache, Height(3));
        assert_eq!(
            CommitOperationStep::read_from(&root).unwrap(),
            CommitOperationStep::AllUpdated
        );
    }

    #[test]
    fn clean_directory_is_left_as_is() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let config = LocalNodeTestContext::new(&root, false).config.clone();

        let (heights, score) = run_recovery(config).unwrap();

        assert_eq!(heights.cache, Height::GENESIS);
        assert_eq!(heights.storage, Height::GENESIS);
        assert_eq!(score, ChainScore::new(1));
    }
}
