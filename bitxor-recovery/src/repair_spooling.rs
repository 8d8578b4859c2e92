// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_io::{purge_directory, CommitOperationStep, DataDirectory, IndexFile, IoError};
use bitxor_spooling::{queues, INDEX_FILENAME, INDEX_SERVER_FILENAME};
use tracing::debug;

struct SpoolingRepairer<'a> {
    data_directory: &'a DataDirectory,
}

impl<'a> SpoolingRepairer<'a> {
    fn retain(&self, queue: &str) {
        debug!(" - leaving {} unchanged", queue);
    }

    fn purge(&self, queue: &str) -> Result<(), IoError> {
        debug!(" - purging {}", queue);
        purge_directory(self.data_directory.spool_dir(queue).path())
    }

    fn reindex(&self, queue: &str, destination: &str, source: &str) -> Result<(), IoError> {
        let directory = self.data_directory.spool_dir(queue);
        let source_index = IndexFile::new(directory.file(source));
        if !source_index.exists() {
            debug!(" - index {} does not exist, skipping", source);
            return Ok(());
        }

        debug!(" - setting {} to {}", destination, source);
        IndexFile::new(directory.file(destination)).set(source_index.get()?)
    }
}

/// Brings the spool queues back in line with the durable state, given the last commit step.
///
/// Server and broker are both stopped during recovery, so queues of transient data are purged.
/// Unless `State_Written` was reached, staged blocks are dropped and state changes beyond the
/// committed index are forgotten.
pub fn repair_spooling(
    data_directory: &DataDirectory,
    commit_step: CommitOperationStep,
) -> Result<(), IoError> {
    let repairer = SpoolingRepairer { data_directory };

    // block changes are written once the state is durable, finalization is independent of
    // state and transaction statuses are permanent
    repairer.retain(queues::BLOCK_CHANGE);
    repairer.retain(queues::FINALIZATION);
    repairer.retain(queues::TRANSACTION_STATUS);

    repairer.purge(queues::PARTIAL_TRANSACTIONS_CHANGE)?;
    repairer.purge(queues::UNCONFIRMED_TRANSACTIONS_CHANGE)?;
    repairer.purge(queues::BLOCK_RECOVER)?;

    if commit_step == CommitOperationStep::StateWritten {
        return Ok(());
    }

    repairer.purge(queues::BLOCK_SYNC)?;
    // messages in (index.dat, index_server.dat] belong to a commit that never completed
    repairer.reindex(queues::STATE_CHANGE, INDEX_SERVER_FILENAME, INDEX_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_spooling::INDEX_SERVER_READER_FILENAME;
    use std::fs;
    use tempfile::TempDir;

    const ALL_QUEUES: [&str; 8] = [
        queues::BLOCK_CHANGE,
        queues::BLOCK_SYNC,
        queues::BLOCK_RECOVER,
        queues::STATE_CHANGE,
        queues::FINALIZATION,
        queues::TRANSACTION_STATUS,
        queues::UNCONFIRMED_TRANSACTIONS_CHANGE,
        queues::PARTIAL_TRANSACTIONS_CHANGE,
    ];

    fn prepare(temp: &TempDir) -> DataDirectory {
        let data_directory = DataDirectory::prepare(temp.path()).unwrap();
        for queue in ALL_QUEUES {
            let directory = data_directory.spool_dir(queue);
            directory.create().unwrap();
            fs::write(directory.file("0000000000000000.dat"), b"message").unwrap();
        }
        let state_change = data_directory.spool_dir(queues::STATE_CHANGE);
        IndexFile::new(state_change.file(INDEX_SERVER_READER_FILENAME)).set(3).unwrap();
        IndexFile::new(state_change.file(INDEX_FILENAME)).set(5).unwrap();
        IndexFile::new(state_change.file(INDEX_SERVER_FILENAME)).set(8).unwrap();
        data_directory
    }

    fn is_empty(data_directory: &DataDirectory, queue: &str) -> bool {
        fs::read_dir(data_directory.spool_dir(queue).path())
            .unwrap()
            .next()
            .is_none()
    }

    fn state_change_index(data_directory: &DataDirectory, name: &str) -> u64 {
        IndexFile::new(data_directory.spool_dir(queues::STATE_CHANGE).file(name))
            .get()
            .unwrap()
    }

    #[test]
    fn transient_queues_are_always_purged() {
        for step in [
            CommitOperationStep::BlocksWritten,
            CommitOperationStep::StateWritten,
            CommitOperationStep::AllUpdated,
        ] {
            let temp = TempDir::new().unwrap();
            let data_directory = prepare(&temp);

            repair_spooling(&data_directory, step).unwrap();

            for queue in [
                queues::PARTIAL_TRANSACTIONS_CHANGE,
                queues::UNCONFIRMED_TRANSACTIONS_CHANGE,
                queues::BLOCK_RECOVER,
            ] {
                assert!(is_empty(&data_directory, queue), "{} after {}", queue, step);
            }
            for queue in [
                queues::BLOCK_CHANGE,
                queues::FINALIZATION,
                queues::TRANSACTION_STATUS,
            ] {
                assert!(!is_empty(&data_directory, queue), "{} after {}", queue, step);
            }
        }
    }

    #[test]
    fn uncommitted_state_changes_are_dropped_unless_state_written() {
        for step in [CommitOperationStep::BlocksWritten, CommitOperationStep::AllUpdated] {
            let temp = TempDir::new().unwrap();
            let data_directory = prepare(&temp);

            repair_spooling(&data_directory, step).unwrap();

            assert!(is_empty(&data_directory, queues::BLOCK_SYNC));
            assert_eq!(state_change_index(&data_directory, INDEX_SERVER_FILENAME), 5);
            assert_eq!(state_change_index(&data_directory, INDEX_FILENAME), 5);
            assert_eq!(state_change_index(&data_directory, INDEX_SERVER_READER_FILENAME), 3);
        }
    }

    #[test]
    fn staged_data_is_kept_when_state_written() {
        let temp = TempDir::new().unwrap();
        let data_directory = prepare(&temp);

        repair_spooling(&data_directory, CommitOperationStep::StateWritten).unwrap();

        assert!(!is_empty(&data_directory, queues::BLOCK_SYNC));
        assert_eq!(state_change_index(&data_directory, INDEX_SERVER_FILENAME), 8);
        assert_eq!(state_change_index(&data_directory, INDEX_FILENAME), 5);
    }

    #[test]
    fn missing_committed_index_is_skipped() {
        let temp = TempDir::new().unwrap();
        let data_directory = DataDirectory::prepare(temp.path()).unwrap();

        repair_spooling(&data_directory, CommitOperationStep::BlocksWritten).unwrap();

        assert!(!IndexFile::new(
            data_directory
                .spool_dir(queues::STATE_CHANGE)
                .file(INDEX_SERVER_FILENAME)
        )
        .exists());
    }
}
