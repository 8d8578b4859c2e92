// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Genesis block execution.
//!
//! The genesis block is checked against the network fingerprint, validated, executed at the
//! genesis height and finally checked against the network wide funding constraints and the
//! hashes it declares.

use crate::error::GenesisError;
use crate::funding::{GenesisFundingObserver, GenesisFundingState};
use crate::publisher::GenesisNotificationPublisher;
use bitxor_cache::{CacheDelta, CoreCache};
use bitxor_chain::{
    extract_entity_infos, validate_and_observe, AggregateObserver, ChainError, Entity,
    ExecutionContext, Notification, NotificationObserver, NotificationPublisher, NotifyMode,
    ObserverContext, PluginManager, StatelessValidator, TransactionRegistry, ValidationResult,
};
use bitxor_io::BlockStorageView;
use bitxor_logging::bitxor_trace;
use bitxor_models::address::Address;
use bitxor_models::amount::is_power_multiple;
use bitxor_models::block::{Block, BlockElement};
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::height::Height;
use bitxor_models::network::NetworkInfo;
use bitxor_models::receipt::{BlockStatement, BlockStatementBuilder};
use bitxor_hash::{Hash, Hash512};
use bitxor_signature::verify_vrf_proof;
use tracing::{debug, info};

/// Whether the state hash declared by the genesis block is checked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateHashVerification {
    /// the state hash is calculated but not compared
    Disabled,
    /// the state hash must match the genesis block
    Enabled,
}

/// Hashes a genesis block must declare
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisHashes {
    /// Merkle root of the block statement
    pub receipts_hash: Hash,
    /// state hash after execution
    pub state_hash: Hash,
    /// sub cache Merkle roots after execution
    pub sub_cache_merkle_roots: Vec<Hash>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Off,
    On,
}

/// Runs the funding observer ahead of the plugin observers
struct GenesisObserver<'a> {
    funding: &'a mut GenesisFundingObserver,
    plugins: AggregateObserver,
}

impl<'a> NotificationObserver for GenesisObserver<'a> {
    fn name(&self) -> &'static str {
        "GenesisObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        match context.mode {
            NotifyMode::Commit => {
                self.funding.notify(notification, context)?;
                self.plugins.notify(notification, context)
            }
            NotifyMode::Rollback => {
                self.plugins.notify(notification, context)?;
                self.funding.notify(notification, context)
            }
        }
    }
}

/// Loads the genesis block into a cache delta
pub struct GenesisBlockLoader<'a> {
    delta: &'a mut CacheDelta,
    plugins: &'a PluginManager,
}

impl<'a> GenesisBlockLoader<'a> {
    /// Loader executing into `delta` with the validators and observers of `plugins`
    pub fn new(delta: &'a mut CacheDelta, plugins: &'a PluginManager) -> Self {
        GenesisBlockLoader { delta, plugins }
    }

    /// Loads the genesis block from `storage` and executes it against the network of `plugins`
    pub fn execute(
        &mut self,
        storage: &BlockStorageView<'_>,
        verification: StateHashVerification,
    ) -> Result<GenesisFundingState, GenesisError> {
        let block_element = storage.load_block_element(Height::GENESIS)?;
        let plugins = self.plugins;
        self.execute_block(plugins.config(), &block_element, verification, Verbosity::On)
    }

    /// Executes `block_element` against an arbitrary network configuration, with every
    /// verification enabled
    pub fn execute_with_config(
        &mut self,
        config: &BlockchainConfiguration,
        block_element: &BlockElement,
    ) -> Result<GenesisFundingState, GenesisError> {
        self.execute_block(
            config,
            block_element,
            StateHashVerification::Enabled,
            Verbosity::Off,
        )
    }

    /// Executes the genesis block stored in `storage` and commits it into `cache` at the genesis height
    pub fn execute_and_commit(
        cache: &CoreCache,
        plugins: &PluginManager,
        storage: &BlockStorageView<'_>,
        verification: StateHashVerification,
    ) -> Result<GenesisFundingState, GenesisError> {
        let mut delta = cache.create_delta();
        let funding = GenesisBlockLoader::new(&mut delta, plugins).execute(storage, verification)?;
        cache.commit(delta, Height::GENESIS)?;
        info!("committed genesis block");
        Ok(funding)
    }

    /// Executes `block_element` against `config` and returns the hashes it should declare,
    /// without comparing them to the declared ones
    pub fn calculate_hashes(
        &mut self,
        config: &BlockchainConfiguration,
        block_element: &BlockElement,
    ) -> Result<GenesisHashes, GenesisError> {
        let (_, statement) = self.run(config, block_element, Verbosity::Off)?;
        let state_hash_info = self.delta.calculate_state_hash();
        Ok(GenesisHashes {
            receipts_hash: statement.merkle_hash(),
            state_hash: state_hash_info.state_hash,
            sub_cache_merkle_roots: state_hash_info.sub_cache_merkle_roots,
        })
    }

    fn execute_block(
        &mut self,
        config: &BlockchainConfiguration,
        block_element: &BlockElement,
        verification: StateHashVerification,
        verbosity: Verbosity,
    ) -> Result<GenesisFundingState, GenesisError> {
        let (funding, statement) = self.run(config, block_element, verbosity)?;
        self.check_hashes(block_element, &statement, verification)?;
        bitxor_trace!("genesis.executed", {
            "transactions": block_element.block.transactions.len(),
            "funded_tokens": funding.total_funded_tokens.len()
        });
        Ok(funding)
    }

    /// Structural checks, validation, observation and funding checks
    fn run(
        &mut self,
        config: &BlockchainConfiguration,
        block_element: &BlockElement,
        verbosity: Verbosity,
    ) -> Result<(GenesisFundingState, BlockStatement), GenesisError> {
        let block = &block_element.block;
        if verbosity == Verbosity::On {
            log_genesis_block_info(&config.network, block_element);
        }

        // 1. structural checks, before any mutation
        check_genesis_block_info(&config.network, block_element)?;
        check_transaction_types(self.plugins.transaction_registry(), block)?;
        if block.header.fee_multiplier != 0 {
            return Err(GenesisError::InvalidArgument(format!(
                "genesis block has non zero fee multiplier {}",
                block.header.fee_multiplier
            )));
        }

        // 2. stateless validation
        let genesis_address =
            Address::from_public_key(&block.header.signer_public_key, config.network.identifier);
        let publisher = GenesisNotificationPublisher::new(
            self.plugins.create_notification_publisher(),
            config.harvest_network_fee_sink_address,
        );
        let notifications = self.validate_stateless(&publisher, block_element)?;

        // 3. stateful validation and observation
        let mut statement_builder = config
            .enable_verifiable_receipts
            .then(BlockStatementBuilder::new);
        let mut funding_observer = GenesisFundingObserver::new(genesis_address);
        let mut observer = GenesisObserver {
            funding: &mut funding_observer,
            plugins: self.plugins.create_observer(),
        };
        let observed = validate_and_observe(
            &notifications,
            &self.plugins.create_stateful_validator(),
            &mut observer,
            &mut ExecutionContext {
                delta: &mut *self.delta,
                height: Height::GENESIS,
                block_time: block.header.timestamp,
                config,
                statement_builder: statement_builder.as_mut(),
            },
        );
        drop(observer);
        observed.map_err(|err| match err {
            ChainError::ValidationFailed { failure, .. } => GenesisError::ValidationFailed {
                description: "genesis block failed stateful validation".to_string(),
                result: failure,
            },
            err => GenesisError::Execution(err),
        })?;
        self.delta.dependent_state_mut().last_finalized_height = Height::GENESIS;

        let funding = funding_observer.into_state();
        if verbosity == Verbosity::On {
            log_funded_balances(config, &funding);
        }

        // 4. post conditions
        check_funding(config, &funding)?;
        let statement = statement_builder
            .map(BlockStatementBuilder::build)
            .unwrap_or_default();
        Ok((funding, statement))
    }

    fn validate_stateless(
        &self,
        publisher: &dyn NotificationPublisher,
        block_element: &BlockElement,
    ) -> Result<Vec<Notification>, GenesisError> {
        let validator = self.plugins.create_stateless_validator();
        let mut notifications = Vec::new();
        for entity_info in extract_entity_infos(block_element) {
            let first = notifications.len();
            publisher.publish(&entity_info, &mut notifications)?;
            for notification in &notifications[first..] {
                if let ValidationResult::Failure(failure) = validator.validate(notification) {
                    let entity = match entity_info.entity {
                        Entity::Block(_) => "block".to_string(),
                        Entity::Transaction(_) => format!("transaction {}", entity_info.hash),
                    };
                    return Err(GenesisError::ValidationFailed {
                        description: format!("genesis {} failed stateless validation", entity),
                        result: failure,
                    });
                }
            }
        }
        debug!("genesis block published {} notifications", notifications.len());
        Ok(notifications)
    }

    fn check_hashes(
        &mut self,
        block_element: &BlockElement,
        statement: &BlockStatement,
        verification: StateHashVerification,
    ) -> Result<(), GenesisError> {
        let header = &block_element.block.header;
        let receipts_hash = statement.merkle_hash();
        if receipts_hash != header.receipts_hash {
            return Err(GenesisError::HashMismatch {
                description: "genesis block receipts hash",
                expected: header.receipts_hash,
                calculated: receipts_hash,
            });
        }

        // always calculated: it populates the state roots committed with the delta
        let state_hash = self.delta.calculate_state_hash().state_hash;
        if verification == StateHashVerification::Enabled && state_hash != header.state_hash {
            return Err(GenesisError::HashMismatch {
                description: "genesis block state hash",
                expected: header.state_hash,
                calculated: state_hash,
            });
        }
        Ok(())
    }
}

/// The generation hash is the first half of the proof hash
pub fn generation_hash_from_proof_hash(proof_hash: &Hash512) -> Hash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&proof_hash.to_bytes()[..32]);
    Hash::from_bytes(&bytes)
}

fn log_genesis_block_info(network: &NetworkInfo, block_element: &BlockElement) {
    info!("       network: {}", network.identifier);
    info!("     signer pk: {}", block_element.block.header.signer_public_key);
    info!("generation hash: {}", block_element.generation_hash);
}

fn log_funded_balances(config: &BlockchainConfiguration, funding: &GenesisFundingState) {
    let marker = |token_id| {
        if token_id == config.currency_token_id {
            "C"
        } else if token_id == config.harvesting_token_id {
            "H"
        } else {
            " "
        }
    };
    for (token_id, amount) in funding.total_funded_tokens.iter() {
        info!("{} {}: {}", marker(*token_id), token_id, amount);
    }
}

fn check_genesis_block_info(
    network: &NetworkInfo,
    block_element: &BlockElement,
) -> Result<(), GenesisError> {
    let header = &block_element.block.header;
    if header.network != network.identifier {
        return Err(GenesisError::InvalidArgument(format!(
            "genesis network {} does not match configured network {}",
            header.network, network.identifier
        )));
    }
    if header.signer_public_key != network.genesis_signer_public_key {
        return Err(GenesisError::InvalidArgument(format!(
            "genesis signer {} does not match configured signer {}",
            header.signer_public_key, network.genesis_signer_public_key
        )));
    }

    let proof_hash = verify_vrf_proof(
        &header.generation_hash_proof,
        &header.signer_public_key,
        network.generation_hash_seed.to_bytes(),
    );
    if proof_hash.is_zero() {
        return Err(GenesisError::InvalidArgument(
            "genesis block has invalid generation hash proof".to_string(),
        ));
    }
    let expected = generation_hash_from_proof_hash(&proof_hash);
    if expected != block_element.generation_hash {
        return Err(GenesisError::InvalidArgument(format!(
            "genesis generation hash {} does not match calculated generation hash {}",
            block_element.generation_hash, expected
        )));
    }
    Ok(())
}

fn check_transaction_types(
    registry: &TransactionRegistry,
    block: &Block,
) -> Result<(), GenesisError> {
    for transaction in block.transactions.iter() {
        match registry.find(transaction.entity_type) {
            Some(plugin) if plugin.supports_top_level() => {}
            Some(_) => {
                return Err(GenesisError::InvalidArgument(format!(
                    "genesis block contains transaction of type {} not supported at top level",
                    transaction.entity_type
                )))
            }
            None => {
                return Err(GenesisError::InvalidArgument(format!(
                    "genesis block contains transaction of unknown type {}",
                    transaction.entity_type
                )))
            }
        }
    }
    Ok(())
}

fn check_funding(
    config: &BlockchainConfiguration,
    funding: &GenesisFundingState,
) -> Result<(), GenesisError> {
    let harvesting = funding.funded(config.harvesting_token_id);
    if !is_power_multiple(config.total_chain_importance.0, harvesting.to_raw(), 10) {
        return Err(GenesisError::Consistency(format!(
            "harvesting balance {} is incompatible with total chain importance {}",
            harvesting, config.total_chain_importance.0
        )));
    }

    let currency = funding.funded(config.currency_token_id);
    if currency != config.initial_currency_atomic_units {
        return Err(GenesisError::Consistency(format!(
            "currency balance {} does not match initial currency atomic units {}",
            currency, config.initial_currency_atomic_units
        )));
    }

    for (token_id, amount) in funding.total_funded_tokens.iter() {
        if *amount > config.max_token_atomic_units {
            return Err(GenesisError::Consistency(format!(
                "balance {} of token {} exceeds max token atomic units {}",
                amount, token_id, config.max_token_atomic_units
            )));
        }
    }
    Ok(())
}
