// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Transaction plugins and the plugin manager.
//!
//! The manager is built once at startup, then only read. Every validator and observer
//! aggregate it creates is a fresh value owned by the caller.

mod base;
mod namespace;
mod token;
mod transfer;

pub use base::{
    AccountAddressObserver, AccountPublicKeyObserver, BalanceDebitObserver,
    BalanceTransferObserver, BalanceValidator, BlockStatisticObserver, DeadlineValidator,
    EntityVersionValidator, HarvestFeeObserver, MaxTransactionsValidator, NetworkValidator,
    SignatureValidator, SourceChangeObserver, TotalTransactionsObserver, TransactionFeeValidator,
};
pub use namespace::{
    is_valid_namespace_name, NamespaceAvailabilityValidator, NamespaceNameValidator, NamespaceObserver,
    NamespaceRegistrationPayload, NamespaceRegistrationPayloadDeserializer,
    NamespaceRegistrationPayloadSerializer, NamespaceRegistrationPlugin,
};
pub use token::{
    TokenAliasObserver, TokenAliasOwnershipValidator, TokenAliasPayload,
    TokenAliasPayloadDeserializer, TokenAliasPayloadSerializer, TokenAliasPlugin,
    TokenDefinitionObserver, TokenDefinitionPayload, TokenDefinitionPayloadDeserializer,
    TokenAvailabilityValidator, TokenDefinitionPayloadSerializer, TokenDefinitionPlugin, TokenDefinitionValidator,
};
pub use transfer::{
    TransferPayload, TransferPayloadDeserializer, TransferPayloadSerializer, TransferPlugin,
};

use crate::error::ChainError;
use crate::notifications::Notification;
use crate::observers::{AggregateObserver, NotificationObserver};
use crate::publisher::{BasicNotificationPublisher, NotificationPublisher};
use crate::validation::{
    AggregateStatefulValidator, AggregateStatelessValidator, StatefulValidator,
    StatelessValidator,
};
use bitxor_models::address::Address;
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::entity::EntityType;
use bitxor_models::transaction::Transaction;
use bitxor_serialization::{deserialize_exact, Deserializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Support for one transaction type
pub trait TransactionPlugin: Send + Sync {
    /// transaction type handled by the plugin
    fn entity_type(&self) -> EntityType;

    /// plugin name, for logs
    fn name(&self) -> &'static str;

    /// whether the transaction may appear directly in a block
    fn supports_top_level(&self) -> bool {
        true
    }

    /// appends the notifications specific to `transaction`, signed by `signer`
    fn publish(
        &self,
        transaction: &Transaction,
        signer: &Address,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError>;

    /// stateless validators of the transaction specific notifications
    fn stateless_validators(&self, _config: &BlockchainConfiguration) -> Vec<Box<dyn StatelessValidator>> {
        Vec::new()
    }

    /// stateful validators of the transaction specific notifications
    fn stateful_validators(&self, _config: &BlockchainConfiguration) -> Vec<Box<dyn StatefulValidator>> {
        Vec::new()
    }

    /// observers of the transaction specific notifications
    fn observers(&self, _config: &BlockchainConfiguration) -> Vec<Box<dyn NotificationObserver>> {
        Vec::new()
    }
}

/// Decodes a transaction payload, reporting failures against the transaction type
pub(crate) fn decode_payload<T, D: Deserializer<T>>(
    deserializer: &D,
    transaction: &Transaction,
) -> Result<T, ChainError> {
    deserialize_exact(deserializer, &transaction.payload).map_err(|reason| {
        ChainError::MalformedPayload {
            entity_type: transaction.entity_type,
            reason,
        }
    })
}

/// Transaction plugins indexed by type
#[derive(Default)]
pub struct TransactionRegistry {
    plugins: BTreeMap<EntityType, Box<dyn TransactionPlugin>>,
}

impl TransactionRegistry {
    /// Registers `plugin`, failing if its type is already registered
    pub fn register(&mut self, plugin: Box<dyn TransactionPlugin>) -> Result<(), ChainError> {
        let entity_type = plugin.entity_type();
        if self.plugins.contains_key(&entity_type) {
            return Err(ChainError::DuplicatePlugin(entity_type));
        }
        self.plugins.insert(entity_type, plugin);
        Ok(())
    }

    /// Plugin handling `entity_type`
    pub fn find(&self, entity_type: EntityType) -> Option<&dyn TransactionPlugin> {
        self.plugins.get(&entity_type).map(|plugin| plugin.as_ref())
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Registered plugins, by type
    pub fn iter(&self) -> impl Iterator<Item = &dyn TransactionPlugin> {
        self.plugins.values().map(|plugin| plugin.as_ref())
    }
}

/// Builds a `PluginManager`
pub struct PluginManagerBuilder {
    config: BlockchainConfiguration,
    registry: TransactionRegistry,
}

impl PluginManagerBuilder {
    /// Adds a transaction plugin
    pub fn add_transaction_plugin(
        mut self,
        plugin: Box<dyn TransactionPlugin>,
    ) -> Result<Self, ChainError> {
        self.registry.register(plugin)?;
        Ok(self)
    }

    /// Adds the transfer, namespace and token plugins
    pub fn add_builtin_plugins(self) -> Result<Self, ChainError> {
        self.add_transaction_plugin(Box::new(TransferPlugin))?
            .add_transaction_plugin(Box::new(NamespaceRegistrationPlugin))?
            .add_transaction_plugin(Box::new(TokenDefinitionPlugin))?
            .add_transaction_plugin(Box::new(TokenAliasPlugin))
    }

    /// Freezes the manager
    pub fn build(self) -> PluginManager {
        debug!(
            "plugin manager built with {} transaction plugins",
            self.registry.len()
        );
        PluginManager {
            config: Arc::new(self.config),
            registry: Arc::new(self.registry),
        }
    }
}

/// Network configuration and the plugins extending it
pub struct PluginManager {
    config: Arc<BlockchainConfiguration>,
    registry: Arc<TransactionRegistry>,
}

impl PluginManager {
    /// Starts building a manager for `config`
    pub fn builder(config: BlockchainConfiguration) -> PluginManagerBuilder {
        PluginManagerBuilder {
            config,
            registry: TransactionRegistry::default(),
        }
    }

    /// Manager with every built-in plugin
    pub fn with_builtin_plugins(config: BlockchainConfiguration) -> Result<Self, ChainError> {
        Ok(Self::builder(config).add_builtin_plugins()?.build())
    }

    /// Network configuration
    pub fn config(&self) -> &BlockchainConfiguration {
        &self.config
    }

    /// Transaction plugins
    pub fn transaction_registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Publisher of block and transaction notifications
    pub fn create_notification_publisher(&self) -> Box<dyn NotificationPublisher> {
        Box::new(BasicNotificationPublisher::new(
            self.registry.clone(),
            self.config.clone(),
        ))
    }

    /// Core stateless validators followed by the plugin ones
    pub fn create_stateless_validator(&self) -> AggregateStatelessValidator {
        let mut validators: Vec<Box<dyn StatelessValidator>> = vec![
            Box::new(NetworkValidator::new(self.config.network.identifier)),
            Box::new(EntityVersionValidator),
            Box::new(SignatureValidator),
            Box::new(MaxTransactionsValidator::new(
                self.config.max_transactions_per_block,
            )),
            Box::new(TransactionFeeValidator),
        ];
        for plugin in self.registry.iter() {
            validators.extend(plugin.stateless_validators(&self.config));
        }
        AggregateStatelessValidator::new(validators)
    }

    /// Core stateful validators followed by the plugin ones
    pub fn create_stateful_validator(&self) -> AggregateStatefulValidator {
        let mut validators: Vec<Box<dyn StatefulValidator>> =
            vec![Box::new(BalanceValidator), Box::new(DeadlineValidator)];
        for plugin in self.registry.iter() {
            validators.extend(plugin.stateful_validators(&self.config));
        }
        AggregateStatefulValidator::new(validators)
    }

    /// Core observers followed by the plugin ones
    pub fn create_observer(&self) -> AggregateObserver {
        let mut observers = self.create_core_observers();
        for plugin in self.registry.iter() {
            observers.extend(plugin.observers(&self.config));
        }
        AggregateObserver::new(observers)
    }

    fn create_core_observers(&self) -> Vec<Box<dyn NotificationObserver>> {
        vec![
            Box::new(SourceChangeObserver),
            Box::new(AccountAddressObserver),
            Box::new(AccountPublicKeyObserver),
            Box::new(BalanceTransferObserver),
            Box::new(BalanceDebitObserver),
            Box::new(BlockStatisticObserver),
            Box::new(TotalTransactionsObserver),
            Box::new(HarvestFeeObserver::new(
                self.config.currency_token_id,
                self.config.harvest_network_fee_sink_address,
                self.config.harvest_network_percentage,
            )),
        ]
    }
}
