// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::LocalStateError;
use crate::state_ref::{LocalNodeStateRef, StateHeights};
use bitxor_cache::{
    CacheDelta, CacheStorage, CoreCache, DependentState, SupplementalData,
    SupplementalDataDeserializer, SupplementalDataSerializer,
};
use bitxor_chain::PluginManager;
use bitxor_genesis::{GenesisBlockLoader, StateHashVerification};
use bitxor_io::{purge_directory, CommitOperationStep, DataDirectory, Directory, IoError};
use bitxor_models::amount::ChainScore;
use bitxor_models::config::NodeConfiguration;
use bitxor_models::height::Height;
use bitxor_serialization::{deserialize_exact, Serializer};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Name of the file holding the dependent state, the chain score and the cache height
pub const SUPPLEMENTAL_DATA_FILENAME: &str = "supplemental.dat";

fn storage_filename(storage: &dyn CacheStorage) -> String {
    format!("{}.dat", storage.name())
}

/// Whether `directory` holds a saved state
pub fn has_serialized_state(directory: &Directory) -> bool {
    directory.file(SUPPLEMENTAL_DATA_FILENAME).is_file()
}

/// Reads the supplemental data and the cache height saved in `directory`
pub fn read_supplemental_data(
    directory: &Directory,
) -> Result<(SupplementalData, Height), LocalStateError> {
    let path = directory.file(SUPPLEMENTAL_DATA_FILENAME);
    let bytes = fs::read(&path).map_err(|err| IoError::io(&path, err))?;
    deserialize_exact(&SupplementalDataDeserializer::new(), &bytes).map_err(|reason| {
        LocalStateError::CorruptedSupplementalData {
            path: path.display().to_string(),
            reason,
        }
    })
}

fn commit_dependent_state(
    cache: &CoreCache,
    state: DependentState,
    height: Height,
) -> Result<(), LocalStateError> {
    let mut delta = cache.create_delta();
    *delta.dependent_state_mut() = state;

    // bulk loading drops the committed roots
    delta.calculate_state_hash();
    cache.commit(delta, height)?;
    Ok(())
}

/// Commits the dependent state saved in `directory` at the saved cache height.
/// Returns the saved supplemental data.
pub fn load_dependent_state_from_directory(
    directory: &Directory,
    cache: &CoreCache,
) -> Result<SupplementalData, LocalStateError> {
    let (data, height) = read_supplemental_data(directory)?;
    commit_dependent_state(cache, data.state, height)?;
    Ok(data)
}

/// Loads the state saved in `directory` into `state`, adding the saved chain score.
///
/// Without a saved state the genesis block is loaded from block storage, executed and committed,
/// and the chain score is increased by one.
pub fn load_state_from_directory(
    directory: &Directory,
    state: &LocalNodeStateRef<'_>,
    plugins: &PluginManager,
) -> Result<StateHeights, LocalStateError> {
    let start = Instant::now();
    if has_serialized_state(directory) {
        info!("loading state from {}", directory.path().display());
        let batch_size = state.config.node.loader_batch_size;
        for storage in state.cache.storages() {
            let path = directory.file(&storage_filename(storage.as_ref()));
            let file = File::open(&path).map_err(|err| IoError::io(&path, err))?;
            storage.load_all(state.cache, &mut BufReader::new(file), batch_size)?;
            debug!("loaded {}", path.display());
        }
        let data = load_dependent_state_from_directory(directory, state.cache)?;
        state.score.add(data.chain_score);
    } else {
        info!("no saved state in {}, loading the genesis block", directory.path().display());
        GenesisBlockLoader::execute_and_commit(
            state.cache,
            plugins,
            &state.storage.view(),
            StateHashVerification::Enabled,
        )?;
        state.score.add(ChainScore::new(1));
    }

    let heights = StateHeights {
        cache: state.cache.height(),
        storage: state.storage.view().chain_height()?,
    };
    info!(
        "state loaded in {} ms (cache height {}, storage height {}, score {})",
        start.elapsed().as_millis(),
        heights.cache,
        heights.storage,
        state.score.get()
    );
    Ok(heights)
}

impl StateHeights {
    /// Fails when the cache and the block storage are not at the same height
    pub fn ensure_consistent(&self) -> Result<(), LocalStateError> {
        if self.cache != self.storage {
            return Err(LocalStateError::HeightMismatch {
                cache: self.cache,
                storage: self.storage,
            });
        }
        Ok(())
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>, LocalStateError> {
    let file = File::create(path).map_err(|err| IoError::io(path, err))?;
    Ok(BufWriter::new(file))
}

fn close_file(path: &Path, writer: BufWriter<File>) -> Result<(), LocalStateError> {
    let file = writer
        .into_inner()
        .map_err(|err| IoError::io(path, err.into_error()))?;
    file.sync_all().map_err(|err| IoError::io(path, err))?;
    Ok(())
}

/// Writes the cache content and the supplemental data into a directory
pub struct LocalNodeStateSerializer {
    directory: Directory,
}

impl LocalNodeStateSerializer {
    /// Serializer writing into `directory`
    pub fn new(directory: Directory) -> Self {
        LocalNodeStateSerializer { directory }
    }

    /// Directory written to
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Saves every entry of the committed cache
    pub fn save(&self, cache: &CoreCache, score: ChainScore) -> Result<(), LocalStateError> {
        let view = cache.create_view();
        let data = SupplementalData {
            state: *view.dependent_state(),
            chain_score: score,
        };
        self.save_with(&cache.storages(), data, view.height(), |storage, output| {
            storage.save_all(&view, output)
        })
    }

    /// Saves every entry of `delta` as the state at `height`, leaving the cache untouched
    pub fn save_from_delta(
        &self,
        delta: &CacheDelta,
        storages: &[Box<dyn CacheStorage>],
        score: ChainScore,
        height: Height,
    ) -> Result<(), LocalStateError> {
        let data = SupplementalData {
            state: *delta.dependent_state(),
            chain_score: score,
        };
        self.save_with(storages, data, height, |storage, output| {
            storage.save_all_from_delta(delta, output)
        })
    }

    /// Saves a summary of `delta`, whose changes are or will be in the cache database
    pub fn save_summary(
        &self,
        delta: &CacheDelta,
        storages: &[Box<dyn CacheStorage>],
        score: ChainScore,
        height: Height,
    ) -> Result<(), LocalStateError> {
        let data = SupplementalData {
            state: *delta.dependent_state(),
            chain_score: score,
        };
        self.save_with(storages, data, height, |storage, output| {
            storage.save_summary(delta, output)
        })
    }

    fn save_with(
        &self,
        storages: &[Box<dyn CacheStorage>],
        data: SupplementalData,
        height: Height,
        save: impl Fn(&dyn CacheStorage, &mut dyn Write) -> Result<(), bitxor_cache::CacheError>,
    ) -> Result<(), LocalStateError> {
        // leftovers of an interrupted save would be promoted along with the new files
        purge_directory(self.directory.path())?;
        self.directory.create()?;

        for storage in storages {
            let path = self.directory.file(&storage_filename(storage.as_ref()));
            let mut writer = create_file(&path)?;
            save(storage.as_ref(), &mut writer)?;
            close_file(&path, writer)?;
        }

        // written last, its presence marks a complete state
        let mut buffer = Vec::new();
        SupplementalDataSerializer::new()
            .serialize(&(data, height), &mut buffer)
            .map_err(bitxor_cache::CacheError::from)?;
        let path = self.directory.file(SUPPLEMENTAL_DATA_FILENAME);
        let mut writer = create_file(&path)?;
        writer
            .write_all(&buffer)
            .map_err(|err| IoError::io(&path, err))?;
        close_file(&path, writer)?;
        debug!(
            "saved state at height {} into {}",
            height,
            self.directory.path().display()
        );
        Ok(())
    }

    /// Replaces `destination` with the written directory
    pub fn move_to(&self, destination: &Directory) -> Result<(), LocalStateError> {
        self.directory.move_to(destination)?;
        Ok(())
    }
}

/// Point at which a checkpointed commit stops early.
/// Used to leave the data directory as a crash at that point would.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommitInterruption {
    /// the commit runs to completion
    #[default]
    Never,
    /// right after `Blocks_Written` is set
    AfterBlocksWritten,
    /// once `state.tmp` is written, before `State_Written` is set
    AfterStateStaged,
    /// right after `State_Written` is set
    AfterStateWritten,
    /// once the staged blocks are in the block storage, before `state.tmp` is promoted
    AfterBlocksMoved,
    /// once `state.tmp` is promoted, before `All_Updated` is set
    AfterStatePromoted,
}

impl CommitInterruption {
    pub(crate) fn check(self, point: CommitInterruption) -> Result<(), LocalStateError> {
        if self != CommitInterruption::Never && self == point {
            return Err(LocalStateError::Interrupted(point));
        }
        Ok(())
    }
}

pub(crate) fn set_commit_step(
    data_directory: &DataDirectory,
    step: CommitOperationStep,
) -> Result<(), LocalStateError> {
    step.write_to(data_directory.root().path())?;
    debug!("commit step set to {}", step);
    Ok(())
}

/// Saves the state of `cache` into `state.tmp`, then promotes it to `state`.
/// The commit step marker tells recovery which of the two directories is valid.
pub fn save_state_to_directory_with_checkpointing(
    data_directory: &DataDirectory,
    node_config: &NodeConfiguration,
    cache: &CoreCache,
    score: ChainScore,
) -> Result<(), LocalStateError> {
    checkpoint(
        data_directory,
        node_config,
        cache,
        score,
        CommitInterruption::Never,
    )
}

/// `save_state_to_directory_with_checkpointing` stopping at `interruption`
#[cfg(any(test, feature = "test-exports"))]
pub fn save_state_to_directory_with_interruption(
    data_directory: &DataDirectory,
    node_config: &NodeConfiguration,
    cache: &CoreCache,
    score: ChainScore,
    interruption: CommitInterruption,
) -> Result<(), LocalStateError> {
    checkpoint(data_directory, node_config, cache, score, interruption)
}

fn checkpoint(
    data_directory: &DataDirectory,
    node_config: &NodeConfiguration,
    cache: &CoreCache,
    score: ChainScore,
    interruption: CommitInterruption,
) -> Result<(), LocalStateError> {
    let start = Instant::now();
    set_commit_step(data_directory, CommitOperationStep::BlocksWritten)?;
    interruption.check(CommitInterruption::AfterBlocksWritten)?;

    let serializer = LocalNodeStateSerializer::new(data_directory.state_tmp());
    if node_config.enable_cache_database_storage {
        let delta = cache.create_delta();
        serializer.save_summary(&delta, &cache.storages(), score, delta.height())?;
    } else {
        serializer.save(cache, score)?;
    }
    interruption.check(CommitInterruption::AfterStateStaged)?;

    set_commit_step(data_directory, CommitOperationStep::StateWritten)?;
    interruption.check(CommitInterruption::AfterStateWritten)?;

    serializer.move_to(&data_directory.state())?;
    interruption.check(CommitInterruption::AfterStatePromoted)?;

    set_commit_step(data_directory, CommitOperationStep::AllUpdated)?;
    info!(
        "state at height {} saved in {} ms",
        cache.height(),
        start.elapsed().as_millis()
    );
    Ok(())
}
