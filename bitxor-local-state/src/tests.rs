// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::test_exports::{LocalNodeTestContext, TEST_TRANSFER_AMOUNT};
use crate::{
    has_serialized_state, read_supplemental_data, save_state_to_directory_with_checkpointing,
    save_state_to_directory_with_interruption, CommitInterruption, LocalStateError, StateHeights,
};
use assert_matches::assert_matches;
use bitxor_genesis::test_exports::expected_recipient_balance;
use bitxor_io::{BlockStorage, CommitOperationStep, FileBlockStorage, IndexFile};
use bitxor_models::amount::{Amount, ChainScore};
use bitxor_models::height::Height;
use bitxor_spooling::{queues, INDEX_FILENAME, INDEX_SERVER_FILENAME};
use serial_test::serial;
use tempfile::TempDir;

fn commit_step(context: &LocalNodeTestContext) -> CommitOperationStep {
    CommitOperationStep::read_from(context.data_directory.root().path()).unwrap()
}

fn balance_after(context: &LocalNodeTestContext, blocks: u64) -> Amount {
    let genesis = expected_recipient_balance(
        &context.plugins,
        context.plugins.config().currency_token_id,
    );
    Amount::from_raw(genesis.to_raw() + blocks * TEST_TRANSFER_AMOUNT)
}

fn state_change_index(context: &LocalNodeTestContext, name: &str) -> u64 {
    let spool = context.data_directory.spool_dir(queues::STATE_CHANGE);
    IndexFile::new(spool.file(name)).get_or(0).unwrap()
}

/// Boots a node, commits `count` blocks and returns the score they added
fn boot_and_commit(context: &LocalNodeTestContext, count: u64) -> ChainScore {
    context.load_state();
    let (delta, blocks, score) = context.execute_blocks(count);
    context.committer().commit(delta, &blocks, score).unwrap();
    score
}

#[test]
fn genesis_block_is_loaded_without_saved_state() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);

    let heights = context.load_state();

    assert_eq!(
        heights,
        StateHeights {
            cache: Height(1),
            storage: Height(1)
        }
    );
    assert_eq!(context.score.get(), ChainScore::new(1));
    assert!(!has_serialized_state(&context.data_directory.state()));
    assert_eq!(context.recipient_balance(), balance_after(&context, 0));
}

#[test]
fn committed_blocks_survive_a_restart() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    let added = boot_and_commit(&context, 3);
    assert_eq!(added, ChainScore::new(3 * 99));
    assert_eq!(context.cache.height(), Height(4));
    assert_eq!(context.storage.view().chain_height().unwrap(), Height(4));
    assert_eq!(context.score.get(), ChainScore::new(1 + 3 * 99));
    assert_eq!(commit_step(&context), CommitOperationStep::AllUpdated);
    assert_eq!(state_change_index(&context, INDEX_FILENAME), 1);
    assert_eq!(state_change_index(&context, INDEX_SERVER_FILENAME), 1);

    let context = context.reopen();
    let heights = context.load_state();

    heights.ensure_consistent().unwrap();
    assert_eq!(heights.cache, Height(4));
    assert_eq!(context.score.get(), ChainScore::new(1 + 3 * 99));
    assert_eq!(context.recipient_balance(), balance_after(&context, 3));
}

#[test]
#[serial]
fn committed_blocks_survive_a_restart_with_cache_database() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), true);
    boot_and_commit(&context, 2);
    let (delta, blocks, score) = context.execute_blocks(1);
    context.committer().commit(delta, &blocks, score).unwrap();
    assert_eq!(context.cache.height(), Height(4));

    let (_, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
    assert_eq!(height, Height(4));

    let context = context.reopen();
    let heights = context.load_state();

    heights.ensure_consistent().unwrap();
    assert_eq!(heights.cache, Height(4));
    assert_eq!(context.score.get(), ChainScore::new(1 + 3 * 99));
    assert_eq!(context.recipient_balance(), balance_after(&context, 3));
}

#[test]
fn commit_rejects_blocks_not_following_the_chain() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    context.load_state();
    let (delta, blocks, score) = context.execute_blocks(2);

    let result = context.committer().commit(delta, &blocks[1..], score);

    assert_matches!(
        result,
        Err(LocalStateError::NonContiguousBlocks {
            start: Height(3),
            end: Height(3),
            chain_height: Height(1)
        })
    );
    assert_eq!(context.cache.height(), Height(1));
    assert_eq!(commit_step(&context), CommitOperationStep::AllUpdated);
}

#[test]
fn commit_rejects_empty_block_list() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    context.load_state();

    let result = context
        .committer()
        .commit(context.cache.create_delta(), &[], ChainScore::default());

    assert_matches!(result, Err(LocalStateError::NonContiguousBlocks { .. }));
}

#[test]
fn commit_interrupted_before_state_is_durable_leaves_state_untouched() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    boot_and_commit(&context, 1);

    for interruption in [
        CommitInterruption::AfterBlocksWritten,
        CommitInterruption::AfterStateStaged,
    ] {
        let (delta, blocks, score) = context.execute_blocks(2);
        let result = context
            .committer()
            .with_interruption(interruption)
            .commit(delta, &blocks, score);
        assert_matches!(result, Err(LocalStateError::Interrupted(point)) if point == interruption);
        assert_eq!(commit_step(&context), CommitOperationStep::BlocksWritten);

        // the staged blocks are published to the state change queue but not to its readers
        assert_eq!(context.storage.view().chain_height().unwrap(), Height(2));
        let staged = FileBlockStorage::new(context.data_directory.spool_dir(queues::BLOCK_SYNC));
        assert_eq!(staged.chain_height().unwrap(), Height(4));
        assert_eq!(state_change_index(&context, INDEX_FILENAME), 1);

        let (_, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
        assert_eq!(height, Height(2));
        // the in memory state still matches the saved one
        assert_eq!(context.cache.height(), Height(2));
        assert_eq!(context.recipient_balance(), balance_after(&context, 1));
        // resets the marker for the next round
        CommitOperationStep::AllUpdated
            .write_to(context.data_directory.root().path())
            .unwrap();
    }

    // the node keeps committing on top of the untouched cache
    let (delta, blocks, score) = context.execute_blocks(2);
    context.committer().commit(delta, &blocks, score).unwrap();
    assert_eq!(context.cache.height(), Height(4));
    assert_eq!(context.recipient_balance(), balance_after(&context, 3));
}

#[test]
fn commit_interrupted_after_state_written_keeps_staged_state() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    boot_and_commit(&context, 1);
    let (delta, blocks, score) = context.execute_blocks(2);

    let result = context
        .committer()
        .with_interruption(CommitInterruption::AfterStateWritten)
        .commit(delta, &blocks, score);

    assert_matches!(result, Err(LocalStateError::Interrupted(_)));
    assert_eq!(commit_step(&context), CommitOperationStep::StateWritten);
    let (staged, height) = read_supplemental_data(&context.data_directory.state_tmp()).unwrap();
    assert_eq!(height, Height(4));
    assert_eq!(staged.chain_score, ChainScore::new(1 + 3 * 99));
    let (_, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
    assert_eq!(height, Height(2));
    assert_eq!(context.cache.height(), Height(2));
}

#[test]
fn commit_interrupted_after_blocks_moved_keeps_previous_state() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    boot_and_commit(&context, 1);
    let (delta, blocks, score) = context.execute_blocks(2);

    let result = context
        .committer()
        .with_interruption(CommitInterruption::AfterBlocksMoved)
        .commit(delta, &blocks, score);

    assert_matches!(result, Err(LocalStateError::Interrupted(_)));
    assert_eq!(commit_step(&context), CommitOperationStep::StateWritten);
    assert_eq!(context.storage.view().chain_height().unwrap(), Height(4));
    let staged = FileBlockStorage::new(context.data_directory.spool_dir(queues::BLOCK_SYNC));
    assert_eq!(staged.chain_height().unwrap(), Height(0));
    let (_, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
    assert_eq!(height, Height(2));
    assert!(has_serialized_state(&context.data_directory.state_tmp()));
}

#[test]
fn commit_interrupted_after_state_promoted_only_misses_the_index_bump() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    boot_and_commit(&context, 1);
    let (delta, blocks, score) = context.execute_blocks(2);

    let result = context
        .committer()
        .with_interruption(CommitInterruption::AfterStatePromoted)
        .commit(delta, &blocks, score);

    assert_matches!(result, Err(LocalStateError::Interrupted(_)));
    assert_eq!(commit_step(&context), CommitOperationStep::StateWritten);
    assert!(!context.data_directory.state_tmp().exists());
    let (_, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
    assert_eq!(height, Height(4));
    assert_eq!(context.storage.view().chain_height().unwrap(), Height(4));
    assert_eq!(state_change_index(&context, INDEX_FILENAME), 1);
    assert_eq!(state_change_index(&context, INDEX_SERVER_FILENAME), 2);
}

#[test]
fn checkpointed_save_promotes_state() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    context.load_state();

    save_state_to_directory_with_checkpointing(
        &context.data_directory,
        &context.config.node,
        &context.cache,
        context.score.get(),
    )
    .unwrap();

    assert_eq!(commit_step(&context), CommitOperationStep::AllUpdated);
    assert!(!context.data_directory.state_tmp().exists());
    let (data, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
    assert_eq!(height, Height(1));
    assert_eq!(data.chain_score, ChainScore::new(1));

    let context = context.reopen();
    assert_eq!(context.load_state().cache, Height(1));
    assert_eq!(context.score.get(), ChainScore::new(1));
    assert_eq!(context.recipient_balance(), balance_after(&context, 0));
}

#[test]
fn stale_staged_files_are_not_promoted() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    boot_and_commit(&context, 1);
    let staged = context.data_directory.state_tmp();
    staged.create().unwrap();
    std::fs::write(staged.file("stale.dat"), [1, 2, 3]).unwrap();

    save_state_to_directory_with_checkpointing(
        &context.data_directory,
        &context.config.node,
        &context.cache,
        context.score.get(),
    )
    .unwrap();
    assert!(!context.data_directory.state().file("stale.dat").exists());

    staged.create().unwrap();
    std::fs::write(staged.file("stale.dat"), [1, 2, 3]).unwrap();
    let (delta, blocks, score) = context.execute_blocks(1);
    context.committer().commit(delta, &blocks, score).unwrap();
    assert!(!context.data_directory.state().file("stale.dat").exists());
    let (_, height) = read_supplemental_data(&context.data_directory.state()).unwrap();
    assert_eq!(height, Height(3));
}

#[test]
fn interrupted_checkpointed_save_keeps_previous_state() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    context.load_state();

    let result = save_state_to_directory_with_interruption(
        &context.data_directory,
        &context.config.node,
        &context.cache,
        context.score.get(),
        CommitInterruption::AfterStateStaged,
    );

    assert_matches!(result, Err(LocalStateError::Interrupted(_)));
    assert_eq!(commit_step(&context), CommitOperationStep::BlocksWritten);
    assert!(has_serialized_state(&context.data_directory.state_tmp()));
    assert!(!has_serialized_state(&context.data_directory.state()));
}

#[test]
fn corrupted_supplemental_data_is_reported() {
    let temp = TempDir::new().unwrap();
    let context = LocalNodeTestContext::new(temp.path(), false);
    boot_and_commit(&context, 1);
    let path = context
        .data_directory
        .state()
        .file(crate::SUPPLEMENTAL_DATA_FILENAME);
    std::fs::write(&path, [1, 2, 3]).unwrap();

    let context = context.reopen();
    let result = crate::load_state_from_directory(
        &context.data_directory.state(),
        &context.state_ref(),
        &context.plugins,
    );

    assert_matches!(result, Err(LocalStateError::CorruptedSupplementalData { .. }));
}
