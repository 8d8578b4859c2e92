// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ChainError;
use crate::notifications::Notification;
use crate::plugins::TransactionRegistry;
use bitxor_hash::Hash;
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::block::{Block, BlockElement};
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::transaction::Transaction;
use std::sync::Arc;

/// Entity whose notifications are published
#[derive(Clone, Copy, Debug)]
pub enum Entity<'a> {
    /// block header
    Block(&'a Block),
    /// top level transaction
    Transaction(&'a Transaction),
}

/// An entity of a block along with its hash and position
#[derive(Clone, Copy, Debug)]
pub struct EntityInfo<'a> {
    /// entity
    pub entity: Entity<'a>,
    /// entity hash
    pub hash: Hash,
    /// block containing the entity
    pub block: &'a Block,
    /// receipt source primary id: transaction index + 1, 0 for the block
    pub primary_id: u32,
}

/// Every entity of a block: transactions in order, then the block itself
pub fn extract_entity_infos(block_element: &BlockElement) -> Vec<EntityInfo<'_>> {
    let block = &block_element.block;
    let mut infos: Vec<EntityInfo<'_>> = block_element
        .transactions
        .iter()
        .enumerate()
        .map(|(index, element)| EntityInfo {
            entity: Entity::Transaction(&element.transaction),
            hash: element.entity_hash,
            block,
            primary_id: index as u32 + 1,
        })
        .collect();
    infos.push(EntityInfo {
        entity: Entity::Block(block),
        hash: block_element.entity_hash,
        block,
        primary_id: 0,
    });
    infos
}

/// Translates entities into notifications
pub trait NotificationPublisher: Send + Sync {
    /// appends the notifications of `entity_info` to `sink`
    fn publish(
        &self,
        entity_info: &EntityInfo<'_>,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError>;
}

/// Notifications of every entity of `block_element`, in execution order
pub fn publish_block(
    publisher: &dyn NotificationPublisher,
    block_element: &BlockElement,
) -> Result<Vec<Notification>, ChainError> {
    let mut notifications = Vec::new();
    for entity_info in extract_entity_infos(block_element) {
        publisher.publish(&entity_info, &mut notifications)?;
    }
    Ok(notifications)
}

/// Fee paid by `transaction` in a block using `fee_multiplier`
pub fn calculate_transaction_fee(
    transaction: &Transaction,
    fee_multiplier: u32,
) -> Result<Amount, ChainError> {
    let size = Block::transaction_size(transaction)?;
    Amount::from_raw(size)
        .checked_mul_u64(fee_multiplier as u64)
        .ok_or_else(|| ChainError::AmountOverflow("transaction fee".to_string()))
}

/// Publishes the basic notifications of blocks and transactions, delegating the
/// transaction specific ones to the registered plugins
pub struct BasicNotificationPublisher {
    registry: Arc<TransactionRegistry>,
    config: Arc<BlockchainConfiguration>,
}

impl BasicNotificationPublisher {
    /// Publisher using the plugins of `registry`
    pub fn new(registry: Arc<TransactionRegistry>, config: Arc<BlockchainConfiguration>) -> Self {
        BasicNotificationPublisher { registry, config }
    }

    fn publish_block(&self, block: &Block, sink: &mut Vec<Notification>) -> Result<(), ChainError> {
        let header = &block.header;
        let harvester = Address::from_public_key(&header.signer_public_key, header.network);
        let mut total_fee = Amount::zero();
        for transaction in block.transactions.iter() {
            total_fee = total_fee
                .checked_add(calculate_transaction_fee(transaction, header.fee_multiplier)?)
                .ok_or_else(|| ChainError::AmountOverflow("block fee".to_string()))?;
        }
        let signing_bytes = block.signing_bytes()?;

        sink.push(Notification::SourceChange {
            primary_id: 0,
            secondary_id: 0,
        });
        sink.push(Notification::AccountPublicKey {
            public_key: header.signer_public_key,
        });
        if header.beneficiary_address != harvester {
            sink.push(Notification::AccountAddress {
                address: header.beneficiary_address,
            });
        }
        sink.push(Notification::BlockType {
            block_type: header.block_type,
            height: header.height,
        });
        sink.push(Notification::Entity {
            network: header.network,
            entity_type: header.block_type,
            version: header.version,
        });
        sink.push(Notification::Block {
            harvester,
            beneficiary: header.beneficiary_address,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
            fee_multiplier: header.fee_multiplier,
            total_fee,
            num_transactions: block.transactions.len() as u32,
        });
        sink.push(Notification::Signature {
            signer: header.signer_public_key,
            signature: header.signature,
            data: Hash::compute_from(&signing_bytes),
        });
        Ok(())
    }

    fn publish_transaction(
        &self,
        entity_info: &EntityInfo<'_>,
        transaction: &Transaction,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        let plugin = self
            .registry
            .find(transaction.entity_type)
            .ok_or(ChainError::UnknownTransactionType(transaction.entity_type))?;
        let signer = Address::from_public_key(&transaction.signer_public_key, transaction.network);
        let fee_multiplier = entity_info.block.header.fee_multiplier;
        let fee = calculate_transaction_fee(transaction, fee_multiplier)?;
        let signing_bytes = transaction.signing_bytes()?;

        sink.push(Notification::SourceChange {
            primary_id: entity_info.primary_id,
            secondary_id: 0,
        });
        sink.push(Notification::AccountPublicKey {
            public_key: transaction.signer_public_key,
        });
        sink.push(Notification::Entity {
            network: transaction.network,
            entity_type: transaction.entity_type,
            version: transaction.version,
        });
        sink.push(Notification::Transaction {
            signer,
            hash: entity_info.hash,
            entity_type: transaction.entity_type,
            deadline: transaction.deadline,
        });
        sink.push(Notification::TransactionDeadline {
            deadline: transaction.deadline,
            max_lifetime_ms: self.config.max_transaction_lifetime_ms,
        });
        sink.push(Notification::TransactionFee {
            transaction_size: Block::transaction_size(transaction)?,
            fee,
            max_fee: transaction.max_fee,
        });

        plugin.publish(transaction, &signer, sink)?;

        sink.push(Notification::BalanceDebit {
            sender: signer,
            token_id: self.config.currency_token_id.unresolve(),
            amount: fee,
        });
        sink.push(Notification::Signature {
            signer: transaction.signer_public_key,
            signature: transaction.signature,
            data: Hash::compute_from(&signing_bytes),
        });
        Ok(())
    }
}

impl NotificationPublisher for BasicNotificationPublisher {
    fn publish(
        &self,
        entity_info: &EntityInfo<'_>,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        match entity_info.entity {
            Entity::Block(block) => self.publish_block(block, sink),
            Entity::Transaction(transaction) => {
                self.publish_transaction(entity_info, transaction, sink)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_exports::{
        create_test_configuration, create_test_plugin_manager, create_transfer, TEST_KEYPAIR_SEED,
    };
    use bitxor_models::entity::EntityType;
    use bitxor_models::height::Height;
    use bitxor_models::timestamp::Timestamp;
    use bitxor_signature::{KeyPair, Signature, VrfProof};

    fn block_with(transactions: Vec<Transaction>, fee_multiplier: u32) -> BlockElement {
        let config = create_test_configuration();
        let keypair = KeyPair::from_bytes(&TEST_KEYPAIR_SEED);
        let network = config.network.identifier;
        let mut block = Block {
            header: bitxor_models::block::BlockHeader {
                version: 1,
                network,
                block_type: EntityType::BLOCK_NORMAL,
                height: Height(2),
                timestamp: Timestamp(10_000),
                difficulty: 100,
                generation_hash_proof: VrfProof::default(),
                previous_block_hash: Hash::zero(),
                transactions_hash: Hash::zero(),
                receipts_hash: Hash::zero(),
                state_hash: Hash::zero(),
                beneficiary_address: Address::from_public_key(
                    &KeyPair::from_bytes(&[9; 32]).get_public_key(),
                    network,
                ),
                fee_multiplier,
                signer_public_key: keypair.get_public_key(),
                signature: Signature::zero(),
            },
            transactions,
        };
        block.sign(&keypair).unwrap();
        BlockElement::new(block).unwrap()
    }

    #[test]
    fn transactions_are_extracted_before_the_block() {
        let keypair = KeyPair::from_bytes(&TEST_KEYPAIR_SEED);
        let recipient = KeyPair::from_bytes(&[2; 32]).get_public_key();
        let config = create_test_configuration();
        let block_element = block_with(
            vec![
                create_transfer(&keypair, &recipient, config.currency_token_id, 10),
                create_transfer(&keypair, &recipient, config.currency_token_id, 20),
            ],
            0,
        );
        let infos = extract_entity_infos(&block_element);
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].primary_id, 1);
        assert_eq!(infos[1].primary_id, 2);
        assert_eq!(infos[2].primary_id, 0);
        assert!(matches!(infos[2].entity, Entity::Block(_)));
        assert_eq!(infos[2].hash, block_element.entity_hash);
    }

    #[test]
    fn transaction_notifications_follow_the_publication_order() {
        let keypair = KeyPair::from_bytes(&TEST_KEYPAIR_SEED);
        let recipient = KeyPair::from_bytes(&[2; 32]).get_public_key();
        let config = create_test_configuration();
        let block_element = block_with(
            vec![create_transfer(&keypair, &recipient, config.currency_token_id, 10)],
            3,
        );
        let plugins = create_test_plugin_manager();
        let notifications =
            publish_block(plugins.create_notification_publisher().as_ref(), &block_element)
                .unwrap();
        let names: Vec<&str> = notifications.iter().map(Notification::name).collect();
        assert_eq!(
            names,
            vec![
                "SourceChange",
                "AccountPublicKey",
                "Entity",
                "Transaction",
                "TransactionDeadline",
                "TransactionFee",
                "AccountAddress",
                "BalanceTransfer",
                "BalanceDebit",
                "Signature",
                "SourceChange",
                "AccountPublicKey",
                "AccountAddress",
                "BlockType",
                "Entity",
                "Block",
                "Signature",
            ]
        );

        let size = Block::transaction_size(&block_element.block.transactions[0]).unwrap();
        assert!(notifications.contains(&Notification::BalanceDebit {
            sender: Address::from_public_key(&keypair.get_public_key(), config.network.identifier),
            token_id: config.currency_token_id.unresolve(),
            amount: Amount::from_raw(size * 3),
        }));
    }

    #[test]
    fn unknown_transaction_type_is_rejected() {
        let keypair = KeyPair::from_bytes(&TEST_KEYPAIR_SEED);
        let config = create_test_configuration();
        let mut transaction = Transaction::new(
            config.network.identifier,
            EntityType(0x4199),
            keypair.get_public_key(),
            Amount::zero(),
            Timestamp(20_000),
            Vec::new(),
        );
        transaction.sign(&keypair).unwrap();
        let block_element = block_with(vec![transaction], 0);
        let plugins = create_test_plugin_manager();
        assert!(matches!(
            publish_block(plugins.create_notification_publisher().as_ref(), &block_element),
            Err(ChainError::UnknownTransactionType(EntityType(0x4199)))
        ));
    }
}
