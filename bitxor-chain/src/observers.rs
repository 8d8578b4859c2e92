// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ChainError;
use crate::notifications::Notification;
use crate::resolvers::resolve_token_id;
use bitxor_cache::CacheDelta;
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::height::Height;
use bitxor_models::receipt::{BlockStatementBuilder, Receipt, ReceiptSource};
use bitxor_models::token::{TokenId, UnresolvedTokenId};

/// Direction in which notifications are applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyMode {
    /// apply
    Commit,
    /// undo
    Rollback,
}

/// Mutable state handed to observers
pub struct ObserverContext<'a> {
    /// cache being modified
    pub delta: &'a mut CacheDelta,
    /// height of the block being applied
    pub height: Height,
    /// direction
    pub mode: NotifyMode,
    /// network configuration
    pub config: &'a BlockchainConfiguration,
    /// receipts of the block, when they are collected
    pub statement_builder: Option<&'a mut BlockStatementBuilder>,
}

impl<'a> ObserverContext<'a> {
    /// Resolves a token id. Resolutions changing the value are recorded in commit mode.
    pub fn resolve(&mut self, unresolved: UnresolvedTokenId) -> Result<TokenId, ChainError> {
        let resolved = resolve_token_id(self.delta, unresolved)?
            .ok_or(ChainError::UnresolvableToken(unresolved))?;
        if unresolved.0 != resolved.0 && self.mode == NotifyMode::Commit {
            if let Some(builder) = self.statement_builder.as_deref_mut() {
                builder.add_resolution(unresolved, resolved);
            }
        }
        Ok(resolved)
    }

    /// Records a receipt in commit mode
    pub fn add_receipt(&mut self, receipt: Receipt) {
        if self.mode != NotifyMode::Commit {
            return;
        }
        if let Some(builder) = self.statement_builder.as_deref_mut() {
            builder.add_receipt(receipt);
        }
    }

    /// Changes the source of the following receipts
    pub fn set_source(&mut self, source: ReceiptSource) {
        if let Some(builder) = self.statement_builder.as_deref_mut() {
            builder.set_source(source);
        }
    }
}

/// Applies notifications to the cache
pub trait NotificationObserver: Send {
    /// observer name, for logs
    fn name(&self) -> &'static str;

    /// applies (or undoes, in rollback mode) `notification`
    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError>;
}

/// Runs every observer: in order on commit, in reverse order on rollback
pub struct AggregateObserver {
    observers: Vec<Box<dyn NotificationObserver>>,
}

impl AggregateObserver {
    /// Aggregates `observers`
    pub fn new(observers: Vec<Box<dyn NotificationObserver>>) -> Self {
        AggregateObserver { observers }
    }

    /// Names of the aggregated observers
    pub fn names(&self) -> Vec<&'static str> {
        self.observers.iter().map(|observer| observer.name()).collect()
    }
}

impl NotificationObserver for AggregateObserver {
    fn name(&self) -> &'static str {
        "AggregateObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        match context.mode {
            NotifyMode::Commit => {
                for observer in self.observers.iter_mut() {
                    observer.notify(notification, context)?;
                }
            }
            NotifyMode::Rollback => {
                for observer in self.observers.iter_mut().rev() {
                    observer.notify(notification, context)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_exports::create_test_configuration;
    use bitxor_cache::{CacheConfiguration, CoreCache};
    use std::sync::{Arc, Mutex};

    struct Recording(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl NotificationObserver for Recording {
        fn name(&self) -> &'static str {
            self.0
        }

        fn notify(
            &mut self,
            _: &Notification,
            _: &mut ObserverContext<'_>,
        ) -> Result<(), ChainError> {
            self.1.lock().unwrap().push(self.0);
            Ok(())
        }
    }

    fn run(mode: NotifyMode) -> Vec<&'static str> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut observer = AggregateObserver::new(vec![
            Box::new(Recording("a", calls.clone())),
            Box::new(Recording("b", calls.clone())),
        ]);
        let config = create_test_configuration();
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let mut context = ObserverContext {
            delta: &mut delta,
            height: Height(2),
            mode,
            config: &config,
            statement_builder: None,
        };
        observer
            .notify(
                &Notification::SourceChange {
                    primary_id: 0,
                    secondary_id: 0,
                },
                &mut context,
            )
            .unwrap();
        let calls = calls.lock().unwrap().clone();
        calls
    }

    #[test]
    fn rollback_runs_observers_in_reverse_order() {
        assert_eq!(run(NotifyMode::Commit), vec!["a", "b"]);
        assert_eq!(run(NotifyMode::Rollback), vec!["b", "a"]);
    }

    #[test]
    fn receipts_are_only_recorded_on_commit() {
        let config = create_test_configuration();
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let mut builder = BlockStatementBuilder::new();
        {
            let mut context = ObserverContext {
                delta: &mut delta,
                height: Height(2),
                mode: NotifyMode::Rollback,
                config: &config,
                statement_builder: Some(&mut builder),
            };
            context.add_receipt(Receipt::Inflation {
                token_id: TokenId(1),
                amount: bitxor_models::amount::Amount::from_raw(5),
            });
        }
        assert!(builder.build().transaction_statements.is_empty());
    }
}
