// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Helpers to build block storage fixtures

use bitxor_hash::Hash;
use bitxor_models::address::Address;
use bitxor_models::block::{Block, BlockElement, BlockHeader};
use bitxor_models::entity::EntityType;
use bitxor_models::height::Height;
use bitxor_models::network::NetworkIdentifier;
use bitxor_models::timestamp::Timestamp;
use bitxor_signature::{KeyPair, Signature, VrfProof};

/// Deterministic signed empty block element at `height`
pub fn create_block_element(height: u64) -> BlockElement {
    let keypair = KeyPair::from_bytes(&[7; 32]);
    let network = NetworkIdentifier::PrivateTest;
    let block_type = if height == 1 {
        EntityType::BLOCK_GENESIS
    } else {
        EntityType::BLOCK_NORMAL
    };
    let mut block = Block {
        header: BlockHeader {
            version: 1,
            network,
            block_type,
            height: Height(height),
            timestamp: Timestamp(height * 1000),
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
        transactions: Vec::new(),
    };
    block
        .sign(&keypair)
        .expect("block signing bytes are always serializable");
    BlockElement::new(block).expect("block hashes are always computable")
}
