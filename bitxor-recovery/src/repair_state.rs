// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_io::{Directory, IndexFile, IoError};
use bitxor_spooling::{
    read_all, read_next_state_change, DualStateChangeSubscriber, QueueReadOptions, SpoolingError,
    StateChangeSubscriber, INDEX_BROKER_READER_FILENAME, INDEX_FILENAME, INDEX_SERVER_FILENAME,
    INDEX_SERVER_READER_FILENAME,
};
use tracing::debug;

/// Replays the `state_change` queue in `directory`.
///
/// Messages up to the committed index that the final reader has not consumed yet go to
/// `registered`. Messages past the committed index go to `registered` too, after `repairing`
/// when one is given. The final reader (the broker when it has read the queue, the server
/// cleanup consumer otherwise) is then moved to the end of the replay.
pub fn repair_state(
    directory: &Directory,
    registered: &mut dyn StateChangeSubscriber,
    repairing: Option<&mut dyn StateChangeSubscriber>,
) -> Result<(), SpoolingError> {
    let final_reader = if directory.file(INDEX_BROKER_READER_FILENAME).exists() {
        INDEX_BROKER_READER_FILENAME
    } else {
        INDEX_SERVER_READER_FILENAME
    };
    debug!(" - replaying state changes for {}", final_reader);

    let committed = QueueReadOptions::new(directory.path(), final_reader, INDEX_FILENAME);
    read_all(&committed, &mut *registered, read_next_state_change)?;

    let uncommitted = QueueReadOptions::new(directory.path(), INDEX_FILENAME, INDEX_SERVER_FILENAME);
    match repairing {
        Some(repairing) => {
            let mut dual = DualStateChangeSubscriber::new(repairing, registered);
            read_all(&uncommitted, &mut dual, read_next_state_change)?;
        }
        None => {
            read_all(&uncommitted, registered, read_next_state_change)?;
        }
    }

    reindex(directory, final_reader, INDEX_FILENAME)?;
    Ok(())
}

fn reindex(directory: &Directory, destination: &str, source: &str) -> Result<(), IoError> {
    let source_index = IndexFile::new(directory.file(source));
    if !source_index.exists() {
        return Ok(());
    }
    IndexFile::new(directory.file(destination)).set(source_index.get()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_cache::{CacheConfiguration, CoreCache};
    use bitxor_models::amount::ChainScore;
    use bitxor_models::height::Height;
    use bitxor_spooling::{FileStateChangeStorage, MockStateChangeSubscriber, StateChangeInfo};
    use mockall::Sequence;
    use tempfile::TempDir;

    /// Writes one state change per height and marks the first `committed` as committed
    fn write_state_changes(directory: &Directory, heights: &[u64], committed: u64) {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut storage = FileStateChangeStorage::new(directory.path()).unwrap();
        for height in heights {
            storage
                .notify_state_change(&StateChangeInfo {
                    cache_changes: cache.create_delta().changes(),
                    score_delta: ChainScore::new(1),
                    height: Height(*height),
                })
                .unwrap();
        }
        IndexFile::new(directory.file(INDEX_FILENAME))
            .set(committed)
            .unwrap();
    }

    fn index(directory: &Directory, name: &str) -> u64 {
        IndexFile::new(directory.file(name)).get_or(0).unwrap()
    }

    fn expect_heights(
        subscriber: &mut MockStateChangeSubscriber,
        heights: &[u64],
        sequence: &mut Sequence,
    ) {
        for height in heights {
            let height = Height(*height);
            subscriber
                .expect_notify_state_change()
                .withf(move |info| info.height == height)
                .times(1)
                .in_sequence(sequence)
                .returning(|_| Ok(()));
        }
    }

    #[test]
    fn server_reader_replays_committed_then_uncommitted_changes() {
        let temp = TempDir::new().unwrap();
        let directory = Directory::new(temp.path());
        write_state_changes(&directory, &[2, 3, 4, 5], 3);
        IndexFile::new(directory.file(INDEX_SERVER_READER_FILENAME))
            .set(1)
            .unwrap();

        let mut sequence = Sequence::new();
        let mut registered = MockStateChangeSubscriber::new();
        expect_heights(&mut registered, &[3, 4, 5], &mut sequence);

        repair_state(&directory, &mut registered, None).unwrap();

        assert_eq!(index(&directory, INDEX_SERVER_READER_FILENAME), 4);
        assert_eq!(index(&directory, INDEX_FILENAME), 4);
        assert_eq!(index(&directory, INDEX_SERVER_FILENAME), 4);
    }

    #[test]
    fn repairing_subscriber_only_sees_uncommitted_changes() {
        let temp = TempDir::new().unwrap();
        let directory = Directory::new(temp.path());
        write_state_changes(&directory, &[2, 3, 4], 2);
        IndexFile::new(directory.file(INDEX_BROKER_READER_FILENAME))
            .set(1)
            .unwrap();

        let mut sequence = Sequence::new();
        let mut registered = MockStateChangeSubscriber::new();
        let mut repairing = MockStateChangeSubscriber::new();
        expect_heights(&mut registered, &[3], &mut sequence);
        repairing
            .expect_notify_state_change()
            .withf(|info| info.height == Height(4))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));
        expect_heights(&mut registered, &[4], &mut sequence);

        repair_state(&directory, &mut registered, Some(&mut repairing)).unwrap();

        // the broker reader is the final reader, the server reader is left alone
        assert_eq!(index(&directory, INDEX_BROKER_READER_FILENAME), 3);
        assert!(!directory.file(INDEX_SERVER_READER_FILENAME).exists());
        assert!(index(&directory, INDEX_BROKER_READER_FILENAME) <= index(&directory, INDEX_FILENAME));
        assert!(index(&directory, INDEX_FILENAME) <= index(&directory, INDEX_SERVER_FILENAME));
    }

    #[test]
    fn empty_queue_is_left_untouched() {
        let temp = TempDir::new().unwrap();
        let directory = Directory::new(temp.path().join("state_change"));
        let mut registered = MockStateChangeSubscriber::new();
        registered.expect_notify_state_change().never();

        repair_state(&directory, &mut registered, None).unwrap();

        assert!(!directory.exists());
    }
}
