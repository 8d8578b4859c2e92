// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::LocalStateError;
use crate::file_storage::{set_commit_step, CommitInterruption, LocalNodeStateSerializer};
use crate::state_ref::LocalNodeStateRef;
use bitxor_cache::CacheDelta;
use bitxor_io::{BlockStorage, CommitOperationStep, DataDirectory, FileBlockStorage, IndexFile};
use bitxor_logging::bitxor_trace;
use bitxor_models::amount::ChainScore;
use bitxor_models::block::BlockElement;
use bitxor_models::height::Height;
use bitxor_spooling::{
    queues, FileStateChangeStorage, StateChangeInfo, StateChangeSubscriber, INDEX_FILENAME,
    INDEX_SERVER_FILENAME,
};
use tracing::debug;

/// Commits executed blocks to the cache, the block storage and the state directory.
///
/// Blocks are staged in `block_sync` and the state change is published to `state_change`
/// before `Blocks_Written` is set. The state is then staged in `state.tmp` and `State_Written`
/// is set. Finally the staged blocks and state are moved in place, the state change becomes
/// visible to readers and `All_Updated` is set. Recovery completes or discards an interrupted
/// commit depending on the last step set.
pub struct ChainCommitter<'a> {
    data_directory: &'a DataDirectory,
    state: LocalNodeStateRef<'a>,
    state_changes: FileStateChangeStorage,
    interruption: CommitInterruption,
}

impl<'a> ChainCommitter<'a> {
    /// Committer of `state`, laid out in `data_directory`
    pub fn new(
        data_directory: &'a DataDirectory,
        state: LocalNodeStateRef<'a>,
    ) -> Result<Self, LocalStateError> {
        let state_changes =
            FileStateChangeStorage::new(data_directory.spool_dir(queues::STATE_CHANGE).path())?;
        Ok(ChainCommitter {
            data_directory,
            state,
            state_changes,
            interruption: CommitInterruption::Never,
        })
    }

    /// Stops every following commit at `interruption`
    #[cfg(any(test, feature = "test-exports"))]
    pub fn with_interruption(mut self, interruption: CommitInterruption) -> Self {
        self.interruption = interruption;
        self
    }

    fn check_blocks(
        &self,
        delta: &CacheDelta,
        blocks: &[BlockElement],
    ) -> Result<(Height, Height), LocalStateError> {
        let chain_height = self.state.storage.view().chain_height()?;
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            return Err(LocalStateError::NonContiguousBlocks {
                start: chain_height.next(),
                end: chain_height,
                chain_height,
            });
        };
        let contiguous = first.height() == chain_height.next()
            && delta.height() == chain_height
            && blocks
                .windows(2)
                .all(|pair| pair[1].height() == pair[0].height().next());
        if !contiguous {
            return Err(LocalStateError::NonContiguousBlocks {
                start: first.height(),
                end: last.height(),
                chain_height,
            });
        }
        Ok((first.height(), last.height()))
    }

    /// Commits `delta`, the result of executing `blocks` on top of the chain, together with
    /// the blocks and the score they add
    pub fn commit(
        &mut self,
        delta: CacheDelta,
        blocks: &[BlockElement],
        score_delta: ChainScore,
    ) -> Result<(), LocalStateError> {
        let (start, end) = self.check_blocks(&delta, blocks)?;
        debug!("committing blocks {} to {}", start, end);

        let mut staging =
            FileBlockStorage::new(self.data_directory.spool_dir(queues::BLOCK_SYNC));
        staging.purge()?;
        for element in blocks {
            staging.save_block(element)?;
        }
        self.state_changes.notify_state_change(&StateChangeInfo {
            cache_changes: delta.changes(),
            score_delta,
            height: end,
        })?;
        set_commit_step(self.data_directory, CommitOperationStep::BlocksWritten)?;
        self.interruption
            .check(CommitInterruption::AfterBlocksWritten)?;

        // the cache is only committed once the new state is durable
        let serializer = LocalNodeStateSerializer::new(self.data_directory.state_tmp());
        let score = self.state.score.get().add(score_delta);
        let storages = self.state.cache.storages();
        if self.state.config.node.enable_cache_database_storage {
            serializer.save_summary(&delta, &storages, score, end)?;
        } else {
            serializer.save_from_delta(&delta, &storages, score, end)?;
        }
        self.interruption.check(CommitInterruption::AfterStateStaged)?;

        set_commit_step(self.data_directory, CommitOperationStep::StateWritten)?;
        self.interruption
            .check(CommitInterruption::AfterStateWritten)?;

        self.state.cache.commit(delta, end)?;
        // blocks go first so that a saved state is never ahead of the block storage
        self.state.storage.move_blocks_from(&mut staging)?;
        self.interruption
            .check(CommitInterruption::AfterBlocksMoved)?;

        serializer.move_to(&self.data_directory.state())?;
        self.interruption
            .check(CommitInterruption::AfterStatePromoted)?;

        self.state.score.add(score_delta);
        let spool = self.data_directory.spool_dir(queues::STATE_CHANGE);
        let written = IndexFile::new(spool.file(INDEX_SERVER_FILENAME)).get()?;
        IndexFile::new(spool.file(INDEX_FILENAME)).set(written)?;
        set_commit_step(self.data_directory, CommitOperationStep::AllUpdated)?;
        self.state.heights()?.ensure_consistent()?;

        bitxor_trace!("local_state.commit", {
            "start": start.0,
            "end": end.0,
            "state_change_index": written
        });
        Ok(())
    }
}
