// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::SpoolingError;
use crate::file_queue::{FileQueueWriter, INDEX_FILENAME, INDEX_SERVER_FILENAME};
use crate::messages::{
    BlockChangeMessage, BlockChangeMessageSerializer, FinalizationMessage,
    FinalizationMessageSerializer, FinalizationRound, StateChangeInfo, StateChangeMessage,
    StateChangeMessageSerializer, TransactionStatusMessage, TransactionStatusMessageSerializer,
};
use bitxor_hash::Hash;
use bitxor_logging::bitxor_trace;
use bitxor_models::amount::ChainScore;
use bitxor_models::block::BlockElement;
use bitxor_models::height::Height;
use bitxor_models::transaction::Transaction;
use bitxor_serialization::Serializer;
use std::path::Path;

/// Receives block storage changes
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait BlockChangeSubscriber: Send {
    /// a block was saved
    fn notify_block(&mut self, block_element: &BlockElement) -> Result<(), SpoolingError>;

    /// every block after `height` was dropped
    fn notify_drop_blocks_after(&mut self, height: Height) -> Result<(), SpoolingError>;
}

/// Receives finalized blocks
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait FinalizationSubscriber: Send {
    /// block at `height` with `hash` was finalized in `round`
    fn notify_finalized_block(
        &mut self,
        round: FinalizationRound,
        height: Height,
        hash: &Hash,
    ) -> Result<(), SpoolingError>;
}

/// Receives transaction statuses
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait TransactionStatusSubscriber: Send {
    /// `transaction` with `hash` got `status`
    fn notify_status(
        &mut self,
        transaction: &Transaction,
        hash: &Hash,
        status: u32,
    ) -> Result<(), SpoolingError>;

    /// flushes pending statuses
    fn flush(&mut self) -> Result<(), SpoolingError>;
}

/// Receives cache and chain score changes
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait StateChangeSubscriber: Send {
    /// the chain score was set to `score`
    fn notify_score_change(&mut self, score: ChainScore) -> Result<(), SpoolingError>;

    /// a block was committed
    fn notify_state_change(&mut self, info: &StateChangeInfo) -> Result<(), SpoolingError>;
}

/// Forwards every notification to each subscriber, in registration order
pub struct AggregateSubscriber<T: ?Sized> {
    subscribers: Vec<Box<T>>,
}

impl<T: ?Sized> AggregateSubscriber<T> {
    /// Aggregates `subscribers`
    pub fn new(subscribers: Vec<Box<T>>) -> Self {
        AggregateSubscriber { subscribers }
    }

    /// Number of aggregated subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is aggregated
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Aggregate of block change subscribers
pub type AggregateBlockChangeSubscriber = AggregateSubscriber<dyn BlockChangeSubscriber>;
/// Aggregate of finalization subscribers
pub type AggregateFinalizationSubscriber = AggregateSubscriber<dyn FinalizationSubscriber>;
/// Aggregate of transaction status subscribers
pub type AggregateTransactionStatusSubscriber = AggregateSubscriber<dyn TransactionStatusSubscriber>;
/// Aggregate of state change subscribers
pub type AggregateStateChangeSubscriber = AggregateSubscriber<dyn StateChangeSubscriber>;

impl BlockChangeSubscriber for AggregateBlockChangeSubscriber {
    fn notify_block(&mut self, block_element: &BlockElement) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.notify_block(block_element)?;
        }
        Ok(())
    }

    fn notify_drop_blocks_after(&mut self, height: Height) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.notify_drop_blocks_after(height)?;
        }
        Ok(())
    }
}

impl FinalizationSubscriber for AggregateFinalizationSubscriber {
    fn notify_finalized_block(
        &mut self,
        round: FinalizationRound,
        height: Height,
        hash: &Hash,
    ) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.notify_finalized_block(round, height, hash)?;
        }
        Ok(())
    }
}

impl TransactionStatusSubscriber for AggregateTransactionStatusSubscriber {
    fn notify_status(
        &mut self,
        transaction: &Transaction,
        hash: &Hash,
        status: u32,
    ) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.notify_status(transaction, hash, status)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.flush()?;
        }
        Ok(())
    }
}

impl StateChangeSubscriber for AggregateStateChangeSubscriber {
    fn notify_score_change(&mut self, score: ChainScore) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.notify_score_change(score)?;
        }
        Ok(())
    }

    fn notify_state_change(&mut self, info: &StateChangeInfo) -> Result<(), SpoolingError> {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.notify_state_change(info)?;
        }
        Ok(())
    }
}

/// Forwards state changes to two borrowed subscribers
pub struct DualStateChangeSubscriber<'a> {
    first: &'a mut dyn StateChangeSubscriber,
    second: &'a mut dyn StateChangeSubscriber,
}

impl<'a> DualStateChangeSubscriber<'a> {
    /// Forwards to `first`, then to `second`
    pub fn new(
        first: &'a mut dyn StateChangeSubscriber,
        second: &'a mut dyn StateChangeSubscriber,
    ) -> Self {
        DualStateChangeSubscriber { first, second }
    }
}

impl<'a> StateChangeSubscriber for DualStateChangeSubscriber<'a> {
    fn notify_score_change(&mut self, score: ChainScore) -> Result<(), SpoolingError> {
        self.first.notify_score_change(score)?;
        self.second.notify_score_change(score)
    }

    fn notify_state_change(&mut self, info: &StateChangeInfo) -> Result<(), SpoolingError> {
        self.first.notify_state_change(info)?;
        self.second.notify_state_change(info)
    }
}

/// Writes block changes to a spool queue
pub struct FileBlockChangeStorage {
    writer: FileQueueWriter,
    serializer: BlockChangeMessageSerializer,
}

impl FileBlockChangeStorage {
    /// Storage writing to the queue in `directory`
    pub fn new(directory: &Path) -> Result<Self, SpoolingError> {
        Ok(FileBlockChangeStorage {
            writer: FileQueueWriter::new(directory, INDEX_FILENAME)?,
            serializer: BlockChangeMessageSerializer::new(),
        })
    }

    fn write(&mut self, message: &BlockChangeMessage) -> Result<(), SpoolingError> {
        let mut buffer = Vec::new();
        self.serializer.serialize(message, &mut buffer)?;
        self.writer.write(&buffer);
        self.writer.flush()
    }
}

impl BlockChangeSubscriber for FileBlockChangeStorage {
    fn notify_block(&mut self, block_element: &BlockElement) -> Result<(), SpoolingError> {
        self.write(&BlockChangeMessage::Block(block_element.clone()))
    }

    fn notify_drop_blocks_after(&mut self, height: Height) -> Result<(), SpoolingError> {
        self.write(&BlockChangeMessage::DropBlocksAfter(height))
    }
}

/// Writes finalized blocks to a spool queue
pub struct FileFinalizationStorage {
    writer: FileQueueWriter,
    serializer: FinalizationMessageSerializer,
}

impl FileFinalizationStorage {
    /// Storage writing to the queue in `directory`
    pub fn new(directory: &Path) -> Result<Self, SpoolingError> {
        Ok(FileFinalizationStorage {
            writer: FileQueueWriter::new(directory, INDEX_FILENAME)?,
            serializer: FinalizationMessageSerializer::new(),
        })
    }
}

impl FinalizationSubscriber for FileFinalizationStorage {
    fn notify_finalized_block(
        &mut self,
        round: FinalizationRound,
        height: Height,
        hash: &Hash,
    ) -> Result<(), SpoolingError> {
        let mut buffer = Vec::new();
        self.serializer.serialize(
            &FinalizationMessage {
                round,
                height,
                hash: *hash,
            },
            &mut buffer,
        )?;
        self.writer.write(&buffer);
        self.writer.flush()
    }
}

/// Writes transaction statuses to a spool queue. Statuses are published on `flush`.
pub struct FileTransactionStatusStorage {
    writer: FileQueueWriter,
    serializer: TransactionStatusMessageSerializer,
    pending: usize,
}

impl FileTransactionStatusStorage {
    /// Storage writing to the queue in `directory`
    pub fn new(directory: &Path) -> Result<Self, SpoolingError> {
        Ok(FileTransactionStatusStorage {
            writer: FileQueueWriter::new(directory, INDEX_FILENAME)?,
            serializer: TransactionStatusMessageSerializer::new(),
            pending: 0,
        })
    }
}

impl TransactionStatusSubscriber for FileTransactionStatusStorage {
    fn notify_status(
        &mut self,
        transaction: &Transaction,
        hash: &Hash,
        status: u32,
    ) -> Result<(), SpoolingError> {
        let mut buffer = Vec::new();
        self.serializer.serialize(
            &TransactionStatusMessage {
                hash: *hash,
                status,
                transaction: transaction.clone(),
            },
            &mut buffer,
        )?;
        self.writer.write(&buffer);
        self.pending += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpoolingError> {
        if self.pending == 0 {
            return Ok(());
        }
        self.pending = 0;
        self.writer.flush()
    }
}

/// Writes state changes to the `state_change` queue.
///
/// Messages are published through `index_server.dat`; the commit protocol copies it into
/// `index.dat` once the state they describe is durable.
pub struct FileStateChangeStorage {
    writer: FileQueueWriter,
    serializer: StateChangeMessageSerializer,
}

impl FileStateChangeStorage {
    /// Storage writing to the queue in `directory`
    pub fn new(directory: &Path) -> Result<Self, SpoolingError> {
        Ok(FileStateChangeStorage {
            writer: FileQueueWriter::new(directory, INDEX_SERVER_FILENAME)?,
            serializer: StateChangeMessageSerializer::new(),
        })
    }

    fn write(&mut self, message: &StateChangeMessage) -> Result<(), SpoolingError> {
        let mut buffer = Vec::new();
        self.serializer.serialize(message, &mut buffer)?;
        self.writer.write(&buffer);
        self.writer.flush()
    }
}

impl StateChangeSubscriber for FileStateChangeStorage {
    fn notify_score_change(&mut self, score: ChainScore) -> Result<(), SpoolingError> {
        self.write(&StateChangeMessage::ScoreChange(score))
    }

    fn notify_state_change(&mut self, info: &StateChangeInfo) -> Result<(), SpoolingError> {
        bitxor_trace!("spooling.state_change", { "height": info.height.0 });
        self.write(&StateChangeMessage::StateChange(info.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_queue::{read_all, QueueReadOptions, INDEX_SERVER_READER_FILENAME};
    use crate::messages::{read_next_block_change, read_next_state_change};
    use bitxor_cache::{CacheChanges, DependentState, SubCacheChanges};
    use bitxor_io::test_exports::create_block_element;
    use bitxor_io::IndexFile;
    use bitxor_models::amount::Amount;
    use bitxor_models::entity::EntityType;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_models::timestamp::Timestamp;
    use bitxor_signature::KeyPair;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use tempfile::TempDir;

    fn state_change(height: u64) -> StateChangeInfo {
        StateChangeInfo {
            cache_changes: CacheChanges {
                sub_caches: vec![SubCacheChanges::default(); 4],
                dependent_state: DependentState::default(),
            },
            score_delta: ChainScore::new(height as u128),
            height: Height(height),
        }
    }

    #[test]
    fn aggregate_forwards_in_order() {
        let mut sequence = Sequence::new();
        let mut first = MockStateChangeSubscriber::new();
        let mut second = MockStateChangeSubscriber::new();
        first
            .expect_notify_score_change()
            .with(eq(ChainScore::new(5)))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));
        second
            .expect_notify_score_change()
            .with(eq(ChainScore::new(5)))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));

        let mut aggregate = AggregateStateChangeSubscriber::new(vec![
            Box::new(first) as Box<dyn StateChangeSubscriber>,
            Box::new(second),
        ]);
        aggregate.notify_score_change(ChainScore::new(5)).unwrap();
    }

    #[test]
    fn aggregate_stops_at_first_failure() {
        let mut first = MockBlockChangeSubscriber::new();
        first
            .expect_notify_drop_blocks_after()
            .returning(|_| Err(SpoolingError::Subscriber("full".to_string())));
        let mut second = MockBlockChangeSubscriber::new();
        second.expect_notify_drop_blocks_after().times(0);

        let mut aggregate = AggregateBlockChangeSubscriber::new(vec![
            Box::new(first) as Box<dyn BlockChangeSubscriber>,
            Box::new(second),
        ]);
        assert!(aggregate.notify_drop_blocks_after(Height(3)).is_err());
    }

    #[test]
    fn state_change_storage_publishes_through_server_index() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStateChangeStorage::new(temp.path()).unwrap();
        storage.notify_state_change(&state_change(2)).unwrap();
        storage.notify_score_change(ChainScore::new(10)).unwrap();

        assert_eq!(
            IndexFile::new(temp.path().join(INDEX_SERVER_FILENAME))
                .get()
                .unwrap(),
            2
        );
        assert!(!temp.path().join(INDEX_FILENAME).exists());

        let mut subscriber = MockStateChangeSubscriber::new();
        subscriber
            .expect_notify_state_change()
            .withf(|info| info.height == Height(2))
            .times(1)
            .returning(|_| Ok(()));
        subscriber
            .expect_notify_score_change()
            .with(eq(ChainScore::new(10)))
            .times(1)
            .returning(|_| Ok(()));
        let options = QueueReadOptions::new(
            temp.path(),
            INDEX_SERVER_READER_FILENAME,
            INDEX_SERVER_FILENAME,
        );
        let count = read_all(&options, &mut subscriber, |bytes, subscriber| {
            read_next_state_change(bytes, subscriber)
        })
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn block_change_storage_is_readable() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileBlockChangeStorage::new(temp.path()).unwrap();
        storage.notify_block(&create_block_element(1)).unwrap();
        storage.notify_drop_blocks_after(Height(0)).unwrap();

        let mut subscriber = MockBlockChangeSubscriber::new();
        subscriber
            .expect_notify_block()
            .withf(|block_element| block_element.height() == Height(1))
            .times(1)
            .returning(|_| Ok(()));
        subscriber
            .expect_notify_drop_blocks_after()
            .with(eq(Height(0)))
            .times(1)
            .returning(|_| Ok(()));
        let options = QueueReadOptions::new(temp.path(), INDEX_SERVER_READER_FILENAME, INDEX_FILENAME);
        read_all(&options, &mut subscriber, |bytes, subscriber| {
            read_next_block_change(bytes, subscriber)
        })
        .unwrap();
    }

    #[test]
    fn transaction_statuses_are_published_on_flush() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileTransactionStatusStorage::new(temp.path()).unwrap();
        let transaction = Transaction::new(
            NetworkIdentifier::PrivateTest,
            EntityType::TRANSFER,
            KeyPair::from_bytes(&[3; 32]).get_public_key(),
            Amount::zero(),
            Timestamp(100),
            vec![1, 2, 3],
        );
        storage.notify_status(&transaction, &Hash::zero(), 7).unwrap();
        storage.notify_status(&transaction, &Hash::zero(), 8).unwrap();
        assert!(!temp.path().join(INDEX_FILENAME).exists());

        storage.flush().unwrap();
        storage.flush().unwrap();
        assert_eq!(
            IndexFile::new(temp.path().join(INDEX_FILENAME)).get().unwrap(),
            1
        );
    }
}
