// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_hash::Hash;
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::entity::EntityType;
use bitxor_models::height::Height;
use bitxor_models::network::NetworkIdentifier;
use bitxor_models::timestamp::Timestamp;
use bitxor_models::token::{NamespaceId, TokenId, UnresolvedTokenId};
use bitxor_signature::{PublicKey, Signature};

/// Typed event extracted from a block or a transaction.
///
/// Validators check notifications, observers apply them to the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// following notifications are produced by a new receipt source
    SourceChange {
        /// primary source id
        primary_id: u32,
        /// secondary source id
        secondary_id: u32,
    },
    /// an account public key is revealed
    AccountPublicKey {
        /// public key
        public_key: PublicKey,
    },
    /// an account address becomes known
    AccountAddress {
        /// address
        address: Address,
    },
    /// basic entity information
    Entity {
        /// network
        network: NetworkIdentifier,
        /// entity type
        entity_type: EntityType,
        /// entity version
        version: u8,
    },
    /// a block is executed
    Block {
        /// harvester address
        harvester: Address,
        /// beneficiary address
        beneficiary: Address,
        /// block timestamp
        timestamp: Timestamp,
        /// block difficulty
        difficulty: u64,
        /// fee multiplier
        fee_multiplier: u32,
        /// fees paid by all transactions
        total_fee: Amount,
        /// number of top level transactions
        num_transactions: u32,
    },
    /// block type and height
    BlockType {
        /// block type
        block_type: EntityType,
        /// height
        height: Height,
    },
    /// a transaction is executed
    Transaction {
        /// signer address
        signer: Address,
        /// transaction hash
        hash: Hash,
        /// transaction type
        entity_type: EntityType,
        /// deadline
        deadline: Timestamp,
    },
    /// transaction deadline
    TransactionDeadline {
        /// deadline
        deadline: Timestamp,
        /// maximum lifetime allowed
        max_lifetime_ms: u64,
    },
    /// transaction fee
    TransactionFee {
        /// transaction size
        transaction_size: u64,
        /// fee charged
        fee: Amount,
        /// maximum fee accepted by the signer
        max_fee: Amount,
    },
    /// tokens move between two accounts
    BalanceTransfer {
        /// sender
        sender: Address,
        /// recipient
        recipient: Address,
        /// token
        token_id: UnresolvedTokenId,
        /// amount
        amount: Amount,
    },
    /// tokens are taken from an account
    BalanceDebit {
        /// debited account
        sender: Address,
        /// token
        token_id: UnresolvedTokenId,
        /// amount
        amount: Amount,
    },
    /// a signature must be verified
    Signature {
        /// signer
        signer: PublicKey,
        /// signature
        signature: Signature,
        /// signed data hash
        data: Hash,
    },
    /// a root namespace is registered
    NamespaceRegistration {
        /// owner
        owner: Address,
        /// namespace id derived from the name
        namespace_id: NamespaceId,
        /// name
        name: String,
    },
    /// a token is defined
    TokenDefinition {
        /// owner
        owner: Address,
        /// token id derived from the owner and nonce
        token_id: TokenId,
        /// nonce
        nonce: u32,
        /// divisibility
        divisibility: u8,
        /// initial supply, credited to the owner
        supply: Amount,
    },
    /// a namespace becomes an alias of a token
    TokenAlias {
        /// alias owner
        owner: Address,
        /// namespace
        namespace_id: NamespaceId,
        /// aliased token
        token_id: TokenId,
    },
}

impl Notification {
    /// Short name of the notification kind
    pub fn name(&self) -> &'static str {
        match self {
            Notification::SourceChange { .. } => "SourceChange",
            Notification::AccountPublicKey { .. } => "AccountPublicKey",
            Notification::AccountAddress { .. } => "AccountAddress",
            Notification::Entity { .. } => "Entity",
            Notification::Block { .. } => "Block",
            Notification::BlockType { .. } => "BlockType",
            Notification::Transaction { .. } => "Transaction",
            Notification::TransactionDeadline { .. } => "TransactionDeadline",
            Notification::TransactionFee { .. } => "TransactionFee",
            Notification::BalanceTransfer { .. } => "BalanceTransfer",
            Notification::BalanceDebit { .. } => "BalanceDebit",
            Notification::Signature { .. } => "Signature",
            Notification::NamespaceRegistration { .. } => "NamespaceRegistration",
            Notification::TokenDefinition { .. } => "TokenDefinition",
            Notification::TokenAlias { .. } => "TokenAlias",
        }
    }
}
