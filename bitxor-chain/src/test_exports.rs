// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Configuration, plugins and entities shared by tests

use crate::plugins::{PluginManager, TransferPayload, TransferPayloadSerializer};
use bitxor_hash::Hash;
use bitxor_models::address::Address;
use bitxor_models::amount::{Amount, Importance};
use bitxor_models::block::{Block, BlockElement, BlockHeader};
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::entity::EntityType;
use bitxor_models::height::Height;
use bitxor_models::network::{NetworkIdentifier, NetworkInfo};
use bitxor_models::timestamp::Timestamp;
use bitxor_models::token::TokenId;
use bitxor_models::transaction::Transaction;
use bitxor_serialization::Serializer;
use bitxor_signature::{KeyPair, PublicKey, Signature, VrfProof};

/// Seed of the key pair signing the test genesis block
pub const TEST_KEYPAIR_SEED: [u8; 32] = [0x42; 32];

/// Private test network configuration, verifications disabled
pub fn create_test_configuration() -> BlockchainConfiguration {
    BlockchainConfiguration {
        network: NetworkInfo {
            identifier: NetworkIdentifier::PrivateTest,
            genesis_signer_public_key: KeyPair::from_bytes(&TEST_KEYPAIR_SEED).get_public_key(),
            generation_hash_seed: Hash::compute_from(b"bitxor private test network"),
            epoch_adjustment_ms: 1_637_848_847_000,
        },
        enable_verifiable_state: false,
        enable_verifiable_receipts: false,
        currency_token_id: TokenId(0x6BED_913F_A202_23F8),
        harvesting_token_id: TokenId(0x3C0F_3DE5_298C_ED2D),
        importance_grouping: 4,
        max_rollback_blocks: 10,
        initial_currency_atomic_units: Amount::from_raw(8_998_999_998_000_000),
        max_token_atomic_units: Amount::from_raw(9_000_000_000_000_000),
        total_chain_importance: Importance(15_000_000),
        max_transactions_per_block: 200,
        max_transaction_lifetime_ms: 86_400_000,
        default_dynamic_fee_multiplier: 10_000,
        harvest_network_fee_sink_address: None,
        harvest_network_percentage: 0,
    }
}

/// Plugin manager with every built-in plugin over the test configuration
pub fn create_test_plugin_manager() -> PluginManager {
    PluginManager::with_builtin_plugins(create_test_configuration())
        .expect("built-in plugins have distinct types")
}

/// Signed transfer of `amount` of `token_id` to the account of `recipient`
pub fn create_transfer(
    keypair: &KeyPair,
    recipient: &PublicKey,
    token_id: TokenId,
    amount: u64,
) -> Transaction {
    let network = NetworkIdentifier::PrivateTest;
    let mut payload = Vec::new();
    TransferPayloadSerializer::new()
        .serialize(
            &TransferPayload {
                recipient: Address::from_public_key(recipient, network),
                tokens: vec![(token_id.unresolve(), Amount::from_raw(amount))],
                message: Vec::new(),
            },
            &mut payload,
        )
        .expect("transfer payloads are always serializable");
    let mut transaction = Transaction::new(
        network,
        EntityType::TRANSFER,
        keypair.get_public_key(),
        Amount::from_raw(1_000_000),
        Timestamp(60_000),
        payload,
    );
    transaction
        .sign(keypair)
        .expect("transaction signing bytes are always serializable");
    transaction
}

/// Block at `height` signed by `keypair`, with zero fee multiplier and zero hashes
pub fn create_signed_block(
    keypair: &KeyPair,
    height: Height,
    transactions: Vec<Transaction>,
) -> BlockElement {
    let network = NetworkIdentifier::PrivateTest;
    let mut block = Block {
        header: BlockHeader {
            version: 1,
            network,
            block_type: if height == Height::GENESIS {
                EntityType::BLOCK_GENESIS
            } else {
                EntityType::BLOCK_NORMAL
            },
            height,
            timestamp: Timestamp(height.0 * 1_000),
            difficulty: 100,
            generation_hash_proof: VrfProof::default(),
            previous_block_hash: Hash::zero(),
            transactions_hash: Hash::zero(),
            receipts_hash: Hash::zero(),
            state_hash: Hash::zero(),
            beneficiary_address: Address::from_public_key(&keypair.get_public_key(), network),
            fee_multiplier: 0,
            signer_public_key: keypair.get_public_key(),
            signature: Signature::zero(),
        },
        transactions,
    };
    block.header.transactions_hash = block
        .calculate_transactions_hash()
        .expect("test transactions are always serializable");
    block
        .sign(keypair)
        .expect("block signing bytes are always serializable");
    BlockElement::new(block).expect("block hashes are always computable")
}
