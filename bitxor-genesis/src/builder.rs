// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::GenesisError;
use crate::loader::{generation_hash_from_proof_hash, GenesisBlockLoader};
use bitxor_cache::{CacheConfiguration, CoreCache};
use bitxor_chain::plugins::{
    NamespaceRegistrationPayload, NamespaceRegistrationPayloadSerializer, TokenAliasPayload,
    TokenAliasPayloadSerializer, TokenDefinitionPayload, TokenDefinitionPayloadSerializer,
    TransferPayload, TransferPayloadSerializer,
};
use bitxor_chain::PluginManager;
use bitxor_hash::Hash;
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::block::{Block, BlockElement, BlockHeader};
use bitxor_models::entity::EntityType;
use bitxor_models::height::Height;
use bitxor_models::timestamp::Timestamp;
use bitxor_models::token::{NamespaceId, TokenId, UnresolvedTokenId};
use bitxor_models::transaction::Transaction;
use bitxor_models::ModelsError;
use bitxor_serialization::Serializer;
use bitxor_signature::{generate_vrf_proof, verify_vrf_proof, KeyPair, Signature};
use tracing::debug;

/// Lifetime of the genesis transactions
const GENESIS_TRANSACTION_LIFETIME_MS: u64 = 3_600_000;

/// Builds and signs a genesis block declaring the hashes its execution produces
pub struct GenesisBlockBuilder<'a> {
    plugins: &'a PluginManager,
    keypair: &'a KeyPair,
    timestamp: Timestamp,
    difficulty: u64,
    transactions: Vec<(EntityType, Vec<u8>)>,
}

impl<'a> GenesisBlockBuilder<'a> {
    /// Builder for the network of `plugins`. `keypair` must be the configured genesis signer.
    pub fn new(plugins: &'a PluginManager, keypair: &'a KeyPair) -> Result<Self, GenesisError> {
        let network = &plugins.config().network;
        if keypair.get_public_key() != network.genesis_signer_public_key {
            return Err(GenesisError::InvalidArgument(format!(
                "key pair {} is not the genesis signer {}",
                keypair.get_public_key(),
                network.genesis_signer_public_key
            )));
        }
        Ok(GenesisBlockBuilder {
            plugins,
            keypair,
            timestamp: Timestamp(0),
            difficulty: 100_000_000_000_000,
            transactions: Vec::new(),
        })
    }

    /// Sets the block timestamp
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the block difficulty
    pub fn difficulty(mut self, difficulty: u64) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Address of the genesis account
    pub fn genesis_address(&self) -> Address {
        Address::from_public_key(
            &self.keypair.get_public_key(),
            self.plugins.config().network.identifier,
        )
    }

    /// Transfers `tokens` from the genesis account to `recipient`
    pub fn add_transfer(
        &mut self,
        recipient: Address,
        tokens: Vec<(UnresolvedTokenId, Amount)>,
    ) -> Result<&mut Self, GenesisError> {
        let payload = TransferPayload {
            recipient,
            tokens,
            message: Vec::new(),
        };
        self.push(EntityType::TRANSFER, &TransferPayloadSerializer::new(), &payload)
    }

    /// Registers the root namespace `name`, owned by the genesis account
    pub fn add_namespace_registration(
        &mut self,
        name: &str,
    ) -> Result<NamespaceId, GenesisError> {
        let payload = NamespaceRegistrationPayload {
            name: name.to_string(),
        };
        self.push(
            EntityType::NAMESPACE_REGISTRATION,
            &NamespaceRegistrationPayloadSerializer::new(),
            &payload,
        )?;
        Ok(NamespaceId::from_name(name))
    }

    /// Defines a token owned by the genesis account, which receives the whole supply
    pub fn add_token_definition(
        &mut self,
        nonce: u32,
        divisibility: u8,
        supply: Amount,
    ) -> Result<TokenId, GenesisError> {
        let payload = TokenDefinitionPayload {
            nonce,
            divisibility,
            supply,
        };
        self.push(
            EntityType::TOKEN_DEFINITION,
            &TokenDefinitionPayloadSerializer::new(),
            &payload,
        )?;
        Ok(TokenId::generate(self.genesis_address().to_bytes(), nonce))
    }

    /// Links `namespace_id` to `token_id`
    pub fn add_token_alias(
        &mut self,
        namespace_id: NamespaceId,
        token_id: TokenId,
    ) -> Result<&mut Self, GenesisError> {
        let payload = TokenAliasPayload {
            namespace_id,
            token_id,
        };
        self.push(EntityType::TOKEN_ALIAS, &TokenAliasPayloadSerializer::new(), &payload)
    }

    fn push<T, S: Serializer<T>>(
        &mut self,
        entity_type: EntityType,
        serializer: &S,
        payload: &T,
    ) -> Result<&mut Self, GenesisError> {
        let mut bytes = Vec::new();
        serializer
            .serialize(payload, &mut bytes)
            .map_err(ModelsError::from)?;
        self.transactions.push((entity_type, bytes));
        Ok(self)
    }

    /// Signs the transactions and the block. The block is executed on a scratch cache to
    /// compute the receipts hash, the state hash and the sub cache roots it declares.
    pub fn build(&self) -> Result<BlockElement, GenesisError> {
        let config = self.plugins.config();
        let network = config.network.identifier;
        let signer = self.keypair.get_public_key();
        let deadline = Timestamp(self.timestamp.0 + GENESIS_TRANSACTION_LIFETIME_MS);

        let mut transactions = Vec::with_capacity(self.transactions.len());
        for (entity_type, payload) in self.transactions.iter() {
            let mut transaction = Transaction::new(
                network,
                *entity_type,
                signer,
                Amount::zero(),
                deadline,
                payload.clone(),
            );
            transaction.sign(self.keypair)?;
            transactions.push(transaction);
        }

        let seed = config.network.generation_hash_seed;
        let generation_hash_proof = generate_vrf_proof(seed.to_bytes(), self.keypair);
        let proof_hash = verify_vrf_proof(&generation_hash_proof, &signer, seed.to_bytes());
        let mut block = Block {
            header: BlockHeader {
                version: 1,
                network,
                block_type: EntityType::BLOCK_GENESIS,
                height: Height::GENESIS,
                timestamp: self.timestamp,
                difficulty: self.difficulty,
                generation_hash_proof,
                previous_block_hash: Hash::zero(),
                transactions_hash: Hash::zero(),
                receipts_hash: Hash::zero(),
                state_hash: Hash::zero(),
                beneficiary_address: self.genesis_address(),
                fee_multiplier: 0,
                signer_public_key: signer,
                signature: Signature::zero(),
            },
            transactions,
        };
        block.header.transactions_hash = block.calculate_transactions_hash()?;
        block.sign(self.keypair)?;

        let mut element = BlockElement::new(block.clone())?;
        element.generation_hash = generation_hash_from_proof_hash(&proof_hash);
        let cache = CoreCache::new(CacheConfiguration {
            enable_verifiable_state: config.enable_verifiable_state,
            database: None,
        });
        let mut delta = cache.create_delta();
        let hashes =
            GenesisBlockLoader::new(&mut delta, self.plugins).calculate_hashes(config, &element)?;
        debug!(
            "genesis block receipts hash {}, state hash {}",
            hashes.receipts_hash, hashes.state_hash
        );

        block.header.receipts_hash = hashes.receipts_hash;
        block.header.state_hash = hashes.state_hash;
        block.sign(self.keypair)?;
        let mut element = BlockElement::new(block)?;
        element.generation_hash = generation_hash_from_proof_hash(&proof_hash);
        element.sub_cache_merkle_roots = hashes.sub_cache_merkle_roots;
        Ok(element)
    }
}
