// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! # General description
//!
//! Spool queues hand events of the node over to other processes through the filesystem.
//! A queue is a directory of message files named after their sequence number plus
//! index files: the producer bumps a writer index after each message, the commit
//! protocol bumps a committed index once the corresponding state is durable, and
//! consumers keep their own reader index. At all times
//! `reader index <= committed index <= writer index`.
//!
//! The subscriber traits are used on both sides: file storages implement them by
//! writing messages, and readers replay messages into them.

#![warn(missing_docs)]

mod error;
mod file_queue;
mod messages;
mod subscribers;
mod subscription_manager;

pub use error::SpoolingError;
pub use file_queue::{
    read_all, FileQueueReader, FileQueueWriter, QueueReadOptions, INDEX_BROKER_READER_FILENAME,
    INDEX_FILENAME, INDEX_SERVER_FILENAME, INDEX_SERVER_READER_FILENAME,
};
pub use messages::{
    read_next_block_change, read_next_finalization, read_next_state_change,
    read_next_transaction_status, BlockChangeMessage, BlockChangeMessageDeserializer,
    BlockChangeMessageSerializer, FinalizationMessage, FinalizationMessageDeserializer,
    FinalizationMessageSerializer, FinalizationRound, StateChangeInfo, StateChangeMessage,
    StateChangeMessageDeserializer, StateChangeMessageSerializer, TransactionStatusMessage,
    TransactionStatusMessageDeserializer, TransactionStatusMessageSerializer,
};
pub use subscribers::{
    AggregateBlockChangeSubscriber, AggregateFinalizationSubscriber,
    AggregateStateChangeSubscriber, AggregateSubscriber, AggregateTransactionStatusSubscriber,
    BlockChangeSubscriber, DualStateChangeSubscriber,
    FileBlockChangeStorage, FileFinalizationStorage, FileStateChangeStorage,
    FileTransactionStatusStorage, FinalizationSubscriber, StateChangeSubscriber,
    TransactionStatusSubscriber,
};
#[cfg(any(test, feature = "test-exports"))]
pub use subscribers::{
    MockBlockChangeSubscriber, MockFinalizationSubscriber, MockStateChangeSubscriber,
    MockTransactionStatusSubscriber,
};
pub use subscription_manager::SubscriptionManager;

/// Names of the spool queues
pub mod queues {
    /// blocks saved to and dropped from block storage
    pub const BLOCK_CHANGE: &str = "block_change";
    /// blocks staged by the commit protocol
    pub const BLOCK_SYNC: &str = "block_sync";
    /// blocks staged while recovering
    pub const BLOCK_RECOVER: &str = "block_recover";
    /// cache changes and chain score changes
    pub const STATE_CHANGE: &str = "state_change";
    /// finalized blocks
    pub const FINALIZATION: &str = "finalization";
    /// transaction statuses
    pub const TRANSACTION_STATUS: &str = "transaction_status";
    /// unconfirmed transaction changes
    pub const UNCONFIRMED_TRANSACTIONS_CHANGE: &str = "unconfirmed_transactions_change";
    /// partial transaction changes
    pub const PARTIAL_TRANSACTIONS_CHANGE: &str = "partial_transactions_change";
}
