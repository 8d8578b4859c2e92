// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::SpoolingError;
use crate::subscribers::{
    AggregateBlockChangeSubscriber, AggregateFinalizationSubscriber,
    AggregateStateChangeSubscriber, AggregateTransactionStatusSubscriber, BlockChangeSubscriber,
    FinalizationSubscriber, StateChangeSubscriber, TransactionStatusSubscriber,
};
use bitxor_hash::Hash;
use bitxor_models::transaction::Transaction;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubscriberKind {
    BlockChange = 0,
    Finalization = 1,
    TransactionStatus = 2,
    StateChange = 3,
}

/// Collects subscribers during startup and hands each kind out once as an aggregate
#[derive(Default)]
pub struct SubscriptionManager {
    block_change: Vec<Box<dyn BlockChangeSubscriber>>,
    finalization: Vec<Box<dyn FinalizationSubscriber>>,
    transaction_status: Vec<Box<dyn TransactionStatusSubscriber>>,
    state_change: Vec<Box<dyn StateChangeSubscriber>>,
    used: [bool; 4],
}

impl SubscriptionManager {
    /// Empty manager
    pub fn new() -> Self {
        Self::default()
    }

    fn require_unused(&self, kind: SubscriberKind) -> Result<(), SpoolingError> {
        if self.used[kind as usize] {
            return Err(SpoolingError::Subscriber(format!(
                "subscription aggregate has already been created for {:?}",
                kind
            )));
        }
        Ok(())
    }

    fn mark_used(&mut self, kind: SubscriberKind) -> Result<(), SpoolingError> {
        self.require_unused(kind)?;
        self.used[kind as usize] = true;
        Ok(())
    }

    /// Registers a block change subscriber
    pub fn add_block_change_subscriber(
        &mut self,
        subscriber: Box<dyn BlockChangeSubscriber>,
    ) -> Result<(), SpoolingError> {
        self.require_unused(SubscriberKind::BlockChange)?;
        self.block_change.push(subscriber);
        Ok(())
    }

    /// Registers a finalization subscriber
    pub fn add_finalization_subscriber(
        &mut self,
        subscriber: Box<dyn FinalizationSubscriber>,
    ) -> Result<(), SpoolingError> {
        self.require_unused(SubscriberKind::Finalization)?;
        self.finalization.push(subscriber);
        Ok(())
    }

    /// Registers a transaction status subscriber
    pub fn add_transaction_status_subscriber(
        &mut self,
        subscriber: Box<dyn TransactionStatusSubscriber>,
    ) -> Result<(), SpoolingError> {
        self.require_unused(SubscriberKind::TransactionStatus)?;
        self.transaction_status.push(subscriber);
        Ok(())
    }

    /// Registers a state change subscriber
    pub fn add_state_change_subscriber(
        &mut self,
        subscriber: Box<dyn StateChangeSubscriber>,
    ) -> Result<(), SpoolingError> {
        self.require_unused(SubscriberKind::StateChange)?;
        self.state_change.push(subscriber);
        Ok(())
    }

    /// Aggregate of the registered block change subscribers
    pub fn create_block_change_subscriber(
        &mut self,
    ) -> Result<AggregateBlockChangeSubscriber, SpoolingError> {
        self.mark_used(SubscriberKind::BlockChange)?;
        Ok(AggregateBlockChangeSubscriber::new(std::mem::take(
            &mut self.block_change,
        )))
    }

    /// Aggregate of the registered finalization subscribers
    pub fn create_finalization_subscriber(
        &mut self,
    ) -> Result<AggregateFinalizationSubscriber, SpoolingError> {
        self.mark_used(SubscriberKind::Finalization)?;
        Ok(AggregateFinalizationSubscriber::new(std::mem::take(
            &mut self.finalization,
        )))
    }

    /// Aggregate of the registered transaction status subscribers, followed by a subscriber
    /// tracing every status
    pub fn create_transaction_status_subscriber(
        &mut self,
    ) -> Result<AggregateTransactionStatusSubscriber, SpoolingError> {
        self.mark_used(SubscriberKind::TransactionStatus)?;
        let mut subscribers = std::mem::take(&mut self.transaction_status);
        subscribers.push(Box::new(LoggingTransactionStatusSubscriber));
        Ok(AggregateTransactionStatusSubscriber::new(subscribers))
    }

    /// Aggregate of the registered state change subscribers
    pub fn create_state_change_subscriber(
        &mut self,
    ) -> Result<AggregateStateChangeSubscriber, SpoolingError> {
        self.mark_used(SubscriberKind::StateChange)?;
        Ok(AggregateStateChangeSubscriber::new(std::mem::take(
            &mut self.state_change,
        )))
    }
}

struct LoggingTransactionStatusSubscriber;

impl TransactionStatusSubscriber for LoggingTransactionStatusSubscriber {
    fn notify_status(
        &mut self,
        transaction: &Transaction,
        hash: &Hash,
        status: u32,
    ) -> Result<(), SpoolingError> {
        trace!(
            "rejected tx {} due to result {:#010X} (deadline {})",
            hash,
            status,
            transaction.deadline.0
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpoolingError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::{MockStateChangeSubscriber, MockTransactionStatusSubscriber};
    use assert_matches::assert_matches;
    use bitxor_models::amount::ChainScore;

    #[test]
    fn aggregate_contains_registered_subscribers() {
        let mut manager = SubscriptionManager::new();
        let mut subscriber = MockStateChangeSubscriber::new();
        subscriber
            .expect_notify_score_change()
            .times(1)
            .returning(|_| Ok(()));
        manager
            .add_state_change_subscriber(Box::new(subscriber))
            .unwrap();

        let mut aggregate = manager.create_state_change_subscriber().unwrap();
        assert_eq!(aggregate.len(), 1);
        aggregate.notify_score_change(ChainScore::new(1)).unwrap();
    }

    #[test]
    fn subscribers_cannot_be_added_after_creation() {
        let mut manager = SubscriptionManager::new();
        manager.create_state_change_subscriber().unwrap();
        assert_matches!(
            manager.add_state_change_subscriber(Box::new(MockStateChangeSubscriber::new())),
            Err(SpoolingError::Subscriber(_))
        );
        assert_matches!(
            manager.create_state_change_subscriber(),
            Err(SpoolingError::Subscriber(_))
        );
        // other kinds are unaffected
        manager
            .add_transaction_status_subscriber(Box::new(MockTransactionStatusSubscriber::new()))
            .unwrap();
    }

    #[test]
    fn transaction_status_aggregate_appends_logging_subscriber() {
        let mut manager = SubscriptionManager::new();
        manager
            .add_transaction_status_subscriber(Box::new(MockTransactionStatusSubscriber::new()))
            .unwrap();
        let aggregate = manager.create_transaction_status_subscriber().unwrap();
        assert_eq!(aggregate.len(), 2);
        assert!(manager.create_block_change_subscriber().unwrap().is_empty());
    }
}
