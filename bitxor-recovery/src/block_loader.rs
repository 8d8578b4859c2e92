// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::RecoveryError;
use bitxor_cache::CacheDelta;
use bitxor_chain::{execute_block, rollback_block, verify_block_hashes, PluginManager};
use bitxor_local_state::{calculate_block_score, LocalNodeStateRef};
use bitxor_models::amount::ChainScore;
use bitxor_models::height::Height;
use bitxor_models::receipt::BlockStatementBuilder;
use std::time::Instant;
use tracing::{debug, info};

/// Number of blocks between two progress messages
const PROGRESS_INTERVAL: u64 = 1_000;

/// Executes the stored blocks from `start_height` up to the storage height on top of the cache,
/// checking the hashes each block declares, then commits the cache at the storage height.
/// Returns the score added by the executed blocks.
pub fn load_blockchain(
    plugins: &PluginManager,
    state: &LocalNodeStateRef<'_>,
    start_height: Height,
) -> Result<ChainScore, RecoveryError> {
    let storage = state.storage.view();
    let chain_height = storage.chain_height()?;
    if start_height > chain_height {
        return Ok(ChainScore::default());
    }

    info!("loading blocks {} to {}", start_height, chain_height);
    let start = Instant::now();
    let mut delta = state.cache.create_delta();
    // the genesis block has no parent and adds no score
    let mut parent = match start_height.prev() {
        Height(0) => None,
        height => Some(storage.load_block_element(height)?),
    };
    let mut score = ChainScore::default();
    for height in Height::range_inclusive(start_height, chain_height) {
        let element = storage.load_block_element(height)?;
        let mut statement_builder = BlockStatementBuilder::new();
        execute_block(plugins, &element, &mut delta, Some(&mut statement_builder))?;
        verify_block_hashes(
            plugins.config(),
            &element,
            &statement_builder.build(),
            &mut delta,
        )?;

        if let Some(parent) = &parent {
            score = score.add(calculate_block_score(
                &parent.block.header,
                &element.block.header,
            ));
        }
        if height.0 % PROGRESS_INTERVAL == 0 {
            info!("loaded block {} of {}", height, chain_height);
        }
        parent = Some(element);
    }
    drop(storage);

    state.cache.commit(delta, chain_height)?;
    info!(
        "loaded {} blocks in {} ms",
        chain_height.0 - start_height.0 + 1,
        start.elapsed().as_millis()
    );
    Ok(score)
}

/// Rolls the blocks from `start_height` up to the storage height back from `delta`, then
/// executes them again, calculating the state hash at every height
pub fn reapply_blocks(
    plugins: &PluginManager,
    state: &LocalNodeStateRef<'_>,
    delta: &mut CacheDelta,
    start_height: Height,
) -> Result<(), RecoveryError> {
    let storage = state.storage.view();
    let chain_height = storage.chain_height()?;
    info!(
        "reapplying blocks {} to {} to regenerate state roots",
        start_height, chain_height
    );

    debug!(" - rolling back blocks");
    for height in Height::range_inclusive(start_height, chain_height).rev() {
        rollback_block(plugins, &storage.load_block_element(height)?, delta)?;
    }

    debug!(" - executing blocks");
    for height in Height::range_inclusive(start_height, chain_height) {
        execute_block(plugins, &storage.load_block_element(height)?, delta, None)?;
        delta.calculate_state_hash();
    }
    Ok(())
}
