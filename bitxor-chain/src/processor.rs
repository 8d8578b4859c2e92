// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Block execution: notifications are published, validated and applied to a cache delta.

use crate::error::ChainError;
use crate::notifications::Notification;
use crate::observers::{NotificationObserver, NotifyMode, ObserverContext};
use crate::plugins::PluginManager;
use crate::publisher::publish_block;
use crate::validation::{
    validate_stateless, StatefulValidator, ValidationResult, ValidatorContext,
};
use bitxor_cache::CacheDelta;
use bitxor_models::block::BlockElement;
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::height::Height;
use bitxor_models::receipt::{BlockStatement, BlockStatementBuilder};
use bitxor_models::timestamp::Timestamp;
use bitxor_logging::bitxor_trace;
use tracing::debug;

/// Where and how notifications are applied
pub struct ExecutionContext<'a> {
    /// cache being modified
    pub delta: &'a mut CacheDelta,
    /// height of the block being executed
    pub height: Height,
    /// timestamp of the block being executed
    pub block_time: Timestamp,
    /// network configuration
    pub config: &'a BlockchainConfiguration,
    /// receipts of the block, when they are collected
    pub statement_builder: Option<&'a mut BlockStatementBuilder>,
}

/// Validates each notification against the current state, then applies it,
/// so that later notifications see the effects of earlier ones
pub fn validate_and_observe(
    notifications: &[Notification],
    validator: &dyn StatefulValidator,
    observer: &mut dyn NotificationObserver,
    context: &mut ExecutionContext<'_>,
) -> Result<(), ChainError> {
    for notification in notifications {
        let result = validator.validate(
            notification,
            &ValidatorContext {
                delta: &*context.delta,
                height: context.height,
                block_time: context.block_time,
                config: context.config,
            },
        )?;
        if let ValidationResult::Failure(failure) = result {
            bitxor_trace!("chain.validation_failure", {
                "height": context.height.0,
                "notification": notification.name(),
                "code": failure.code()
            });
            return Err(ChainError::ValidationFailed {
                description: format!("stateful {}", notification.name()),
                failure,
            });
        }

        let mut observer_context = ObserverContext {
            delta: &mut *context.delta,
            height: context.height,
            mode: NotifyMode::Commit,
            config: context.config,
            statement_builder: context.statement_builder.as_deref_mut(),
        };
        observer.notify(notification, &mut observer_context)?;
    }
    Ok(())
}

/// Applies `notifications` in `mode` without validating them. Rollbacks go in reverse order.
pub fn observe(
    notifications: &[Notification],
    observer: &mut dyn NotificationObserver,
    mode: NotifyMode,
    context: &mut ExecutionContext<'_>,
) -> Result<(), ChainError> {
    let mut observe_one = |notification: &Notification| {
        let mut observer_context = ObserverContext {
            delta: &mut *context.delta,
            height: context.height,
            mode,
            config: context.config,
            statement_builder: context.statement_builder.as_deref_mut(),
        };
        observer.notify(notification, &mut observer_context)
    };
    match mode {
        NotifyMode::Commit => notifications.iter().try_for_each(&mut observe_one),
        NotifyMode::Rollback => notifications.iter().rev().try_for_each(&mut observe_one),
    }
}

/// Executes an already validated block
pub fn execute_block(
    plugins: &PluginManager,
    block_element: &BlockElement,
    delta: &mut CacheDelta,
    statement_builder: Option<&mut BlockStatementBuilder>,
) -> Result<(), ChainError> {
    let notifications = publish_block(
        plugins.create_notification_publisher().as_ref(),
        block_element,
    )?;
    let mut observer = plugins.create_observer();
    observe(
        &notifications,
        &mut observer,
        NotifyMode::Commit,
        &mut ExecutionContext {
            delta,
            height: block_element.height(),
            block_time: block_element.block.header.timestamp,
            config: plugins.config(),
            statement_builder,
        },
    )
}

/// Undoes the execution of a block
pub fn rollback_block(
    plugins: &PluginManager,
    block_element: &BlockElement,
    delta: &mut CacheDelta,
) -> Result<(), ChainError> {
    let notifications = publish_block(
        plugins.create_notification_publisher().as_ref(),
        block_element,
    )?;
    let mut observer = plugins.create_observer();
    observe(
        &notifications,
        &mut observer,
        NotifyMode::Rollback,
        &mut ExecutionContext {
            delta,
            height: block_element.height(),
            block_time: block_element.block.header.timestamp,
            config: plugins.config(),
            statement_builder: None,
        },
    )
}

/// Validates and executes a block, returning its block statement
pub fn validate_and_execute_block(
    plugins: &PluginManager,
    block_element: &BlockElement,
    delta: &mut CacheDelta,
) -> Result<BlockStatement, ChainError> {
    let notifications = publish_block(
        plugins.create_notification_publisher().as_ref(),
        block_element,
    )?;
    validate_stateless(&plugins.create_stateless_validator(), &notifications)?;

    let mut statement_builder = BlockStatementBuilder::new();
    let mut observer = plugins.create_observer();
    validate_and_observe(
        &notifications,
        &plugins.create_stateful_validator(),
        &mut observer,
        &mut ExecutionContext {
            delta,
            height: block_element.height(),
            block_time: block_element.block.header.timestamp,
            config: plugins.config(),
            statement_builder: Some(&mut statement_builder),
        },
    )?;
    debug!(
        "executed block {} with {} notifications",
        block_element.height(),
        notifications.len()
    );
    Ok(statement_builder.build())
}

/// Checks the receipts hash and the state hash of an executed block, for the enabled
/// verifications. The state hash is always calculated so that the committed Merkle roots
/// stay current.
pub fn verify_block_hashes(
    config: &BlockchainConfiguration,
    block_element: &BlockElement,
    statement: &BlockStatement,
    delta: &mut CacheDelta,
) -> Result<(), ChainError> {
    let header = &block_element.block.header;
    if config.enable_verifiable_receipts {
        let receipts_hash = statement.merkle_hash();
        if receipts_hash != header.receipts_hash {
            return Err(ChainError::HashMismatch {
                name: "receipts hash",
                height: header.height,
                expected: header.receipts_hash,
                actual: receipts_hash,
            });
        }
    }

    let state_hash = delta.calculate_state_hash().state_hash;
    if config.enable_verifiable_state && state_hash != header.state_hash {
        return Err(ChainError::HashMismatch {
            name: "state hash",
            height: header.height,
            expected: header.state_hash,
            actual: state_hash,
        });
    }
    Ok(())
}
