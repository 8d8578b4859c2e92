// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::block_loader::{load_blockchain, reapply_blocks};
use crate::error::RecoveryError;
use crate::recovery_mode::{calculate_state_recovery_mode, StateRecoveryMode};
use crate::repair_importance::repair_importance;
use crate::repair_spooling::repair_spooling;
use crate::repair_state::repair_state;
use crate::repairing_subscriber::StateChangeRepairingSubscriber;
use crate::system_state::BitxorCoreSystemState;
use bitxor_cache::CoreCache;
use bitxor_chain::PluginManager;
use bitxor_io::{
    purge_directory, BlockStorageCache, CommitOperationStep, DataDirectory, FileBlockStorage,
};
use bitxor_local_state::{
    create_block_storage, create_cache, has_serialized_state, load_state_from_directory,
    read_supplemental_data, save_state_to_directory_with_checkpointing, LocalNodeChainScore,
    LocalNodeStateRef, LocalStateError, StateHeights,
};
use bitxor_logging::bitxor_trace;
use bitxor_models::amount::ChainScore;
use bitxor_models::config::BitxorCoreConfiguration;
use bitxor_models::height::Height;
use bitxor_spooling::{
    queues, read_all, read_next_block_change, read_next_finalization,
    read_next_transaction_status, AggregateBlockChangeSubscriber,
    AggregateFinalizationSubscriber, AggregateStateChangeSubscriber,
    AggregateTransactionStatusSubscriber, QueueReadOptions, StateChangeSubscriber,
    SubscriptionManager, TransactionStatusSubscriber, INDEX_BROKER_READER_FILENAME,
    INDEX_FILENAME,
};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Brings the data directory of a node that stopped abruptly back to a consistent state.
///
/// `boot` repairs the spool queues and the importance files, replays the queues consumed by
/// the broker into the registered subscribers, loads the saved state and completes or
/// discards the interrupted commit. `shutdown` saves what recovery changed.
pub struct RecoveryOrchestrator {
    config: BitxorCoreConfiguration,
    data_directory: DataDirectory,
    plugins: PluginManager,
    cache: CoreCache,
    storage: BlockStorageCache,
    score: LocalNodeChainScore,
    block_change_subscriber: AggregateBlockChangeSubscriber,
    finalization_subscriber: AggregateFinalizationSubscriber,
    transaction_status_subscriber: AggregateTransactionStatusSubscriber,
    state_change_subscriber: AggregateStateChangeSubscriber,
    state_saving_required: bool,
    // first block moved out of block_sync by a promotion completed before loading
    promoted_start_height: Height,
}

impl RecoveryOrchestrator {
    /// Orchestrator over the data directory of `config`, forwarding replayed messages to the
    /// subscribers registered in `subscription_manager`
    pub fn new(
        config: BitxorCoreConfiguration,
        plugins: PluginManager,
        subscription_manager: &mut SubscriptionManager,
    ) -> Result<Self, RecoveryError> {
        let data_directory = DataDirectory::prepare(config.user.data_directory.clone())?;
        let cache = create_cache(&config, &data_directory)?;
        let storage = create_block_storage(&data_directory);
        Ok(RecoveryOrchestrator {
            block_change_subscriber: subscription_manager.create_block_change_subscriber()?,
            finalization_subscriber: subscription_manager.create_finalization_subscriber()?,
            transaction_status_subscriber: subscription_manager
                .create_transaction_status_subscriber()?,
            state_change_subscriber: subscription_manager.create_state_change_subscriber()?,
            config,
            data_directory,
            plugins,
            cache,
            storage,
            score: LocalNodeChainScore::default(),
            state_saving_required: true,
            promoted_start_height: Height(0),
        })
    }

    /// Current chain score
    pub fn score(&self) -> ChainScore {
        self.score.get()
    }

    /// Heights of the cache and of the block storage
    pub fn heights(&self) -> Result<StateHeights, RecoveryError> {
        Ok(StateHeights {
            cache: self.cache.height(),
            storage: self.storage.view().chain_height()?,
        })
    }

    /// Runs recovery
    pub fn boot(&mut self) -> Result<(), RecoveryError> {
        let start = Instant::now();
        let system_state = BitxorCoreSystemState::new(&self.data_directory);
        let commit_step = system_state.commit_step()?;
        info!("recovering from commit step {}", commit_step);
        if system_state.should_recover_broker() {
            warn!("broker did not shut down cleanly");
        }
        if system_state.should_recover_server() {
            warn!("server did not shut down cleanly");
        }

        info!("repairing spooling");
        repair_spooling(&self.data_directory, commit_step)?;

        info!("repairing importance files");
        repair_importance(&self.data_directory, commit_step)?;

        info!("repairing subscribers");
        self.repair_subscribers()?;

        self.complete_state_promotion(commit_step)?;

        info!("loading state");
        let state = LocalNodeStateRef::new(&self.config, &self.cache, &self.storage, &self.score);
        let heights =
            load_state_from_directory(&self.data_directory.state(), &state, &self.plugins)?;
        match calculate_state_recovery_mode(&self.config.node, heights)? {
            StateRecoveryMode::None => {}
            StateRecoveryMode::Repair => {
                info!("cache at {} is behind storage at {}", heights.cache, heights.storage);
                let score = load_blockchain(&self.plugins, &state, heights.cache.next())?;
                self.score.add(score);
            }
            StateRecoveryMode::Reseed => {
                return Err(RecoveryError::Reseed {
                    cache: heights.cache,
                    storage: heights.storage,
                });
            }
        }

        info!("repairing state");
        self.recover_state(commit_step)?;

        info!("finalizing");
        BitxorCoreSystemState::new(&self.data_directory).reset()?;

        let heights = self.heights()?;
        bitxor_trace!("recovery.boot", {
            "commit_step": commit_step.to_string(),
            "cache_height": heights.cache.0,
            "storage_height": heights.storage.0
        });
        info!(
            "recovery completed in {} ms (height {}, score {})",
            start.elapsed().as_millis(),
            heights.storage,
            self.score.get()
        );
        Ok(())
    }

    fn repair_subscribers(&mut self) -> Result<(), RecoveryError> {
        let broker_options = |queue: &str| {
            QueueReadOptions::new(
                self.data_directory.spool_dir(queue).path(),
                INDEX_BROKER_READER_FILENAME,
                INDEX_FILENAME,
            )
        };

        let count = read_all(
            &broker_options(queues::BLOCK_CHANGE),
            &mut self.block_change_subscriber,
            read_next_block_change,
        )?;
        debug!(" - replayed {} block changes", count);

        let count = read_all(
            &broker_options(queues::FINALIZATION),
            &mut self.finalization_subscriber,
            read_next_finalization,
        )?;
        debug!(" - replayed {} finalizations", count);

        let count = read_all(
            &broker_options(queues::TRANSACTION_STATUS),
            &mut self.transaction_status_subscriber,
            read_next_transaction_status,
        )?;
        self.transaction_status_subscriber.flush()?;
        debug!(" - replayed {} transaction statuses", count);
        Ok(())
    }

    /// Finishes a promotion of `state.tmp` that stopped after `state` was removed, so that the
    /// staged state is loaded instead of the genesis block
    fn complete_state_promotion(
        &mut self,
        commit_step: CommitOperationStep,
    ) -> Result<(), RecoveryError> {
        let state = self.data_directory.state();
        let state_tmp = self.data_directory.state_tmp();
        if commit_step != CommitOperationStep::StateWritten
            || has_serialized_state(&state)
            || !has_serialized_state(&state_tmp)
        {
            return Ok(());
        }

        // a summary only describes the cache once the database holds its changes
        let (_, staged_height) = read_supplemental_data(&state_tmp)?;
        if let Some(database) = self.cache.database() {
            let database_height = database
                .read()
                .get_height()
                .map_err(LocalStateError::from)?
                .unwrap_or_default();
            if database_height < staged_height {
                debug!(
                    " - cache database at {} is behind staged state at {}",
                    database_height, staged_height
                );
                return Ok(());
            }
        }

        info!("completing promotion of state at height {}", staged_height);
        let mut staging = FileBlockStorage::new(self.data_directory.spool_dir(queues::BLOCK_SYNC));
        self.promoted_start_height = self.storage.move_blocks_from(&mut staging)?;
        state_tmp.move_to(&state)?;
        Ok(())
    }

    fn recover_state(&mut self, commit_step: CommitOperationStep) -> Result<(), RecoveryError> {
        let enable_cache_db = self.config.node.enable_cache_database_storage;
        {
            let mut repairing = StateChangeRepairingSubscriber::new(&self.cache, &self.score);
            let repairing: Option<&mut dyn StateChangeSubscriber> = if enable_cache_db {
                Some(&mut repairing)
            } else {
                None
            };
            repair_state(
                &self.data_directory.spool_dir(queues::STATE_CHANGE),
                &mut self.state_change_subscriber,
                repairing,
            )?;
        }

        let state_tmp = self.data_directory.state_tmp();
        if commit_step != CommitOperationStep::StateWritten {
            debug!(" - purging {}", state_tmp.path().display());
            purge_directory(state_tmp.path())?;
            return Ok(());
        }

        if has_serialized_state(&state_tmp) {
            debug!(" - promoting {}", state_tmp.path().display());
            state_tmp.move_to(&self.data_directory.state())?;
        }

        let mut staging = FileBlockStorage::new(self.data_directory.spool_dir(queues::BLOCK_SYNC));
        let start_height = match self.storage.move_blocks_from(&mut staging)? {
            Height(0) => self.promoted_start_height,
            moved => moved,
        };

        let state = LocalNodeStateRef::new(&self.config, &self.cache, &self.storage, &self.score);
        if !enable_cache_db {
            let heights = self.heights()?;
            if heights.cache < heights.storage {
                info!("catching up cache at {} with storage at {}", heights.cache, heights.storage);
                let score = load_blockchain(&self.plugins, &state, heights.cache.next())?;
                self.score.add(score);
            }
        } else if self.cache.enable_verifiable_state() && start_height.0 > 0 {
            let (data, _) = read_supplemental_data(&self.data_directory.state())?;
            let mut delta = self.cache.create_delta();
            *delta.dependent_state_mut() = data.state;
            reapply_blocks(&self.plugins, &state, &mut delta, start_height)?;
            self.cache.recommit(delta)?;
        }

        self.state_saving_required = !enable_cache_db;
        Ok(())
    }

    /// Saves the state when recovery changed it without the cache database, marks the data
    /// directory as fully updated otherwise
    pub fn shutdown(self) -> Result<(), RecoveryError> {
        self.heights()?.ensure_consistent()?;
        if self.state_saving_required {
            info!("saving state");
            save_state_to_directory_with_checkpointing(
                &self.data_directory,
                &self.config.node,
                &self.cache,
                self.score.get(),
            )?;
        } else {
            CommitOperationStep::AllUpdated.write_to(self.data_directory.root().path())?;
        }
        info!("recovery shut down");
        Ok(())
    }
}
