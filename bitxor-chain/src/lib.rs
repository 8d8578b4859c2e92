// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! # General description
//!
//! Execution of blocks against the cache.
//!
//! Blocks and their transactions are turned into typed `Notification`s by a
//! `NotificationPublisher`. Stateless validators look at notifications alone, stateful
//! validators look at them against a `CacheDelta`, and observers apply them to the delta,
//! in commit or rollback mode, collecting receipts along the way.
//!
//! Transaction specific behavior lives in `TransactionPlugin`s registered in a
//! `PluginManager`, which also assembles the validator and observer aggregates.

#![warn(missing_docs)]

mod error;
mod notifications;
mod observers;
pub mod plugins;
mod processor;
mod publisher;
mod resolvers;
mod validation;

pub use error::ChainError;
pub use notifications::Notification;
pub use observers::{
    AggregateObserver, NotificationObserver, NotifyMode, ObserverContext,
};
pub use plugins::{PluginManager, PluginManagerBuilder, TransactionPlugin, TransactionRegistry};
pub use processor::{
    execute_block, observe, rollback_block, validate_and_execute_block, validate_and_observe,
    verify_block_hashes, ExecutionContext,
};
pub use publisher::{
    calculate_transaction_fee, extract_entity_infos, publish_block, BasicNotificationPublisher,
    Entity, EntityInfo, NotificationPublisher,
};
pub use resolvers::resolve_token_id;
pub use validation::{
    validate_stateless, AggregateStatefulValidator, AggregateStatelessValidator,
    StatefulValidator, StatelessValidator, ValidationFailure, ValidationResult, ValidatorContext,
};

#[cfg(any(test, feature = "test-exports"))]
pub mod test_exports;
