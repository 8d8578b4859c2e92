// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use anyhow::Result;
use bitxor_io::{
    BlockStorage, CommitOperationStep, DataDirectory, Directory, FileBlockStorage, IndexFile,
};
use bitxor_local_state::{has_serialized_state, read_supplemental_data};
use bitxor_recovery::{BROKER_LOCK_FILENAME, SERVER_LOCK_FILENAME};
use bitxor_spooling::{
    queues, INDEX_BROKER_READER_FILENAME, INDEX_FILENAME, INDEX_SERVER_FILENAME,
    INDEX_SERVER_READER_FILENAME,
};
use serde::Serialize;
use std::fmt;
use std::path::Path;

const INSPECTED_QUEUES: [&str; 5] = [
    queues::BLOCK_CHANGE,
    queues::BLOCK_SYNC,
    queues::STATE_CHANGE,
    queues::FINALIZATION,
    queues::TRANSACTION_STATUS,
];

/// Indexes of a spool queue, absent index files are reported as `None`
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct QueueIndexes {
    /// queue name
    pub name: String,
    /// committed index
    pub committed: Option<u64>,
    /// writer index
    pub writer: Option<u64>,
    /// broker reader index
    pub broker_reader: Option<u64>,
    /// server reader index
    pub server_reader: Option<u64>,
}

/// Saved state summary
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SavedState {
    /// cache height of the saved state
    pub height: u64,
    /// chain score of the saved state, as a decimal string
    pub chain_score: String,
}

/// Read-only report of a data directory
#[derive(Debug, Serialize)]
pub struct DataDirectoryReport {
    /// last commit step
    pub commit_step: String,
    /// whether the broker lock file is present
    pub broker_locked: bool,
    /// whether the server lock file is present
    pub server_locked: bool,
    /// block storage height
    pub storage_height: u64,
    /// state under `state`
    pub state: Option<SavedState>,
    /// state under `state.tmp`
    pub staged_state: Option<SavedState>,
    /// spool queues
    pub queues: Vec<QueueIndexes>,
}

fn read_index(directory: &Path, name: &str) -> Result<Option<u64>> {
    let index = IndexFile::new(directory.join(name));
    if !index.exists() {
        return Ok(None);
    }
    Ok(Some(index.get()?))
}

fn read_saved_state(directory: &Directory) -> Result<Option<SavedState>> {
    if !has_serialized_state(directory) {
        return Ok(None);
    }
    let (data, height) = read_supplemental_data(directory)?;
    Ok(Some(SavedState {
        height: height.0,
        chain_score: data.chain_score.to_string(),
    }))
}

/// Reports the data directory at `root` without modifying it
pub fn inspect_data_directory(root: &Path) -> Result<DataDirectoryReport> {
    let data_directory = DataDirectory::new(root);
    let storage = FileBlockStorage::new(data_directory.root().clone());

    let mut queue_reports = Vec::new();
    for name in INSPECTED_QUEUES {
        let directory = data_directory.spool_dir(name);
        let path = directory.path();
        queue_reports.push(QueueIndexes {
            name: name.to_string(),
            committed: read_index(path, INDEX_FILENAME)?,
            writer: read_index(path, INDEX_SERVER_FILENAME)?,
            broker_reader: read_index(path, INDEX_BROKER_READER_FILENAME)?,
            server_reader: read_index(path, INDEX_SERVER_READER_FILENAME)?,
        });
    }

    Ok(DataDirectoryReport {
        commit_step: CommitOperationStep::read_from(root)?.to_string(),
        broker_locked: root.join(BROKER_LOCK_FILENAME).exists(),
        server_locked: root.join(SERVER_LOCK_FILENAME).exists(),
        storage_height: storage.chain_height()?.0,
        state: read_saved_state(&data_directory.state())?,
        staged_state: read_saved_state(&data_directory.state_tmp())?,
        queues: queue_reports,
    })
}

fn fmt_index(index: Option<u64>) -> String {
    index.map_or_else(|| "-".to_string(), |value| value.to_string())
}

impl fmt::Display for DataDirectoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "commit step: {}", self.commit_step)?;
        writeln!(f, "broker lock: {}", self.broker_locked)?;
        writeln!(f, "server lock: {}", self.server_locked)?;
        writeln!(f, "block storage height: {}", self.storage_height)?;
        for (label, state) in [("state", &self.state), ("state.tmp", &self.staged_state)] {
            match state {
                Some(state) => writeln!(
                    f,
                    "{}: height {}, score {}",
                    label, state.height, state.chain_score
                )?,
                None => writeln!(f, "{}: none", label)?,
            }
        }
        writeln!(f, "spool queues (committed / writer / broker reader / server reader):")?;
        for queue in self.queues.iter() {
            writeln!(
                f,
                " - {}: {} / {} / {} / {}",
                queue.name,
                fmt_index(queue.committed),
                fmt_index(queue.writer),
                fmt_index(queue.broker_reader),
                fmt_index(queue.server_reader)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_local_state::test_exports::LocalNodeTestContext;
    use bitxor_local_state::CommitInterruption;
    use tempfile::TempDir;

    #[test]
    fn interrupted_commit_is_reported() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let context = LocalNodeTestContext::new(&root, false);
        context.load_state();
        let (delta, blocks, score) = context.execute_blocks(2);
        assert!(context
            .committer()
            .with_interruption(CommitInterruption::AfterStateWritten)
            .commit(delta, &blocks, score)
            .is_err());

        let report = inspect_data_directory(&root).unwrap();

        assert_eq!(
            report.commit_step,
            CommitOperationStep::StateWritten.to_string()
        );
        // blocks are still staged in block_sync
        assert_eq!(report.storage_height, 1);
        assert_eq!(report.state, None);
        assert_eq!(report.staged_state.as_ref().map(|state| state.height), Some(3));
        assert!(report.to_string().contains("block_sync"));
    }

    #[test]
    fn empty_directory_is_reported_without_changes() {
        let temp = TempDir::new().unwrap();

        let report = inspect_data_directory(temp.path()).unwrap();

        assert_eq!(report.commit_step, CommitOperationStep::AllUpdated.to_string());
        assert_eq!(report.storage_height, 0);
        assert!(!report.broker_locked);
        assert!(report.queues.iter().all(|queue| queue.committed.is_none()));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["storage_height"], 0);
    }
}
