// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::address::{Address, AddressDeserializer, AddressSerializer};
use crate::entity::EntityType;
use crate::error::ModelsError;
use crate::height::{Height, HeightDeserializer, HeightSerializer};
use crate::network::NetworkIdentifier;
use crate::timestamp::Timestamp;
use crate::transaction::{
    network_byte, Transaction, TransactionDeserializer, TransactionElement, TransactionSerializer,
};
use bitxor_hash::{Hash, HashDeserializer, HashSerializer, MerkleHashBuilder};
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
    U64VarIntDeserializer, U64VarIntSerializer,
};
use bitxor_signature::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer, VrfProof, VrfProofDeserializer, VrfProofSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::number::complete::{le_u16, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum number of transactions a serialized block may carry
pub const MAX_BLOCK_TRANSACTIONS: u32 = 100_000;

/// Block header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// entity version
    pub version: u8,
    /// network
    pub network: NetworkIdentifier,
    /// block type (genesis, normal, importance)
    pub block_type: EntityType,
    /// height
    pub height: Height,
    /// timestamp
    pub timestamp: Timestamp,
    /// difficulty
    pub difficulty: u64,
    /// proof of the generation hash
    pub generation_hash_proof: VrfProof,
    /// hash of the parent block
    pub previous_block_hash: Hash,
    /// Merkle root of the transaction hashes
    pub transactions_hash: Hash,
    /// Merkle root of the block receipts
    pub receipts_hash: Hash,
    /// state hash after the block is executed
    pub state_hash: Hash,
    /// beneficiary of the harvest fees
    pub beneficiary_address: Address,
    /// fee multiplier applied to transaction sizes
    pub fee_multiplier: u32,
    /// signer (harvester)
    pub signer_public_key: PublicKey,
    /// signature over the header
    pub signature: Signature,
}

/// Block: header and top level transactions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// header
    pub header: BlockHeader,
    /// transactions
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Bytes covered by the signature
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ModelsError> {
        let mut buffer = Vec::new();
        BlockSerializer::new().serialize_header_signed_part(&self.header, &mut buffer)?;
        Ok(buffer)
    }

    /// Entity hash identifying the block
    pub fn entity_hash(&self) -> Result<Hash, ModelsError> {
        let signing_bytes = self.signing_bytes()?;
        Ok(Hash::compute_from_tuple(&[
            self.header.signature.to_bytes().as_slice(),
            self.header.signer_public_key.to_bytes().as_slice(),
            signing_bytes.as_slice(),
        ]))
    }

    /// Merkle root of the transaction entity hashes, in block order
    pub fn calculate_transactions_hash(&self) -> Result<Hash, ModelsError> {
        let mut builder = MerkleHashBuilder::with_capacity(self.transactions.len());
        for transaction in self.transactions.iter() {
            builder.update(transaction.entity_hash()?);
        }
        Ok(builder.final_hash())
    }

    /// Signs the block in place, updating the signer
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ModelsError> {
        self.header.signer_public_key = keypair.get_public_key();
        let signing_hash = Hash::compute_from(&self.signing_bytes()?);
        self.header.signature = keypair.sign(&signing_hash);
        Ok(())
    }

    /// Checks the signature
    pub fn verify_signature(&self) -> Result<(), ModelsError> {
        let signing_hash = Hash::compute_from(&self.signing_bytes()?);
        self.header
            .signer_public_key
            .verify_signature(&signing_hash, &self.header.signature)?;
        Ok(())
    }

    /// Total size in bytes, used for fee calculation
    pub fn transaction_size(transaction: &Transaction) -> Result<u64, ModelsError> {
        let mut buffer = Vec::new();
        TransactionSerializer::new().serialize(transaction, &mut buffer)?;
        Ok(buffer.len() as u64)
    }
}

/// A block along with derived data computed when it was executed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockElement {
    /// block
    pub block: Block,
    /// entity hash of the block
    pub entity_hash: Hash,
    /// generation hash derived from the proof
    pub generation_hash: Hash,
    /// transactions with their hashes
    pub transactions: Vec<TransactionElement>,
    /// sub cache Merkle roots after the block was executed
    pub sub_cache_merkle_roots: Vec<Hash>,
}

impl BlockElement {
    /// Wraps a block, computing its entity and transaction hashes
    pub fn new(block: Block) -> Result<Self, ModelsError> {
        let entity_hash = block.entity_hash()?;
        let transactions = block
            .transactions
            .iter()
            .cloned()
            .map(TransactionElement::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BlockElement {
            block,
            entity_hash,
            generation_hash: Hash::zero(),
            transactions,
            sub_cache_merkle_roots: Vec::new(),
        })
    }

    /// Height of the block
    pub fn height(&self) -> Height {
        self.block.header.height
    }
}

/// Serializer for `Block`
#[derive(Clone, Debug, Default)]
pub struct BlockSerializer {
    height_serializer: HeightSerializer,
    u64_serializer: U64VarIntSerializer,
    u32_serializer: U32VarIntSerializer,
    hash_serializer: HashSerializer,
    proof_serializer: VrfProofSerializer,
    address_serializer: AddressSerializer,
    public_key_serializer: PublicKeySerializer,
    signature_serializer: SignatureSerializer,
    transaction_serializer: TransactionSerializer,
}

impl BlockSerializer {
    /// Creates a `BlockSerializer`
    pub const fn new() -> Self {
        Self {
            height_serializer: HeightSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            hash_serializer: HashSerializer::new(),
            proof_serializer: VrfProofSerializer::new(),
            address_serializer: AddressSerializer::new(),
            public_key_serializer: PublicKeySerializer::new(),
            signature_serializer: SignatureSerializer::new(),
            transaction_serializer: TransactionSerializer::new(),
        }
    }

    fn serialize_header_signed_part(
        &self,
        header: &BlockHeader,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        buffer.push(header.version);
        buffer.push(header.network.to_byte());
        buffer.extend_from_slice(&header.block_type.0.to_le_bytes());
        self.height_serializer.serialize(&header.height, buffer)?;
        self.u64_serializer.serialize(&header.timestamp.0, buffer)?;
        self.u64_serializer.serialize(&header.difficulty, buffer)?;
        self.proof_serializer
            .serialize(&header.generation_hash_proof, buffer)?;
        self.hash_serializer
            .serialize(&header.previous_block_hash, buffer)?;
        self.hash_serializer
            .serialize(&header.transactions_hash, buffer)?;
        self.hash_serializer.serialize(&header.receipts_hash, buffer)?;
        self.hash_serializer.serialize(&header.state_hash, buffer)?;
        self.address_serializer
            .serialize(&header.beneficiary_address, buffer)?;
        self.u32_serializer.serialize(&header.fee_multiplier, buffer)?;
        self.public_key_serializer
            .serialize(&header.signer_public_key, buffer)
    }
}

impl Serializer<Block> for BlockSerializer {
    fn serialize(&self, value: &Block, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.signature_serializer
            .serialize(&value.header.signature, buffer)?;
        self.serialize_header_signed_part(&value.header, buffer)?;
        let count: u32 = value.transactions.len().try_into().map_err(|_| {
            SerializeError::NumberTooBig("too many transactions in block".to_string())
        })?;
        self.u32_serializer.serialize(&count, buffer)?;
        for transaction in value.transactions.iter() {
            self.transaction_serializer.serialize(transaction, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `Block`
#[derive(Clone, Debug)]
pub struct BlockDeserializer {
    height_deserializer: HeightDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    u32_deserializer: U32VarIntDeserializer,
    count_deserializer: U32VarIntDeserializer,
    hash_deserializer: HashDeserializer,
    proof_deserializer: VrfProofDeserializer,
    address_deserializer: AddressDeserializer,
    public_key_deserializer: PublicKeyDeserializer,
    signature_deserializer: SignatureDeserializer,
    transaction_deserializer: TransactionDeserializer,
}

impl BlockDeserializer {
    /// Creates a `BlockDeserializer`
    pub const fn new() -> Self {
        Self {
            height_deserializer: HeightDeserializer::new(),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_BLOCK_TRANSACTIONS),
            ),
            hash_deserializer: HashDeserializer::new(),
            proof_deserializer: VrfProofDeserializer::new(),
            address_deserializer: AddressDeserializer::new(),
            public_key_deserializer: PublicKeyDeserializer::new(),
            signature_deserializer: SignatureDeserializer::new(),
            transaction_deserializer: TransactionDeserializer::new(),
        }
    }

    fn deserialize_header<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeader, E> {
        let (rest, (signature, version, network, block_type, height, timestamp, difficulty)) =
            tuple((
                context("Failed signature deserialization", |input| {
                    self.signature_deserializer.deserialize(input)
                }),
                context("Failed version deserialization", le_u8),
                context("Failed network deserialization", network_byte),
                context("Failed block type deserialization", le_u16),
                context("Failed height deserialization", |input| {
                    self.height_deserializer.deserialize(input)
                }),
                context("Failed timestamp deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
                context("Failed difficulty deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
            ))(buffer)?;
        let (
            rest,
            (
                generation_hash_proof,
                previous_block_hash,
                transactions_hash,
                receipts_hash,
                state_hash,
                beneficiary_address,
                fee_multiplier,
                signer_public_key,
            ),
        ) = tuple((
            context("Failed proof deserialization", |input| {
                self.proof_deserializer.deserialize(input)
            }),
            context("Failed previous hash deserialization", |input| {
                self.hash_deserializer.deserialize(input)
            }),
            context("Failed transactions hash deserialization", |input| {
                self.hash_deserializer.deserialize(input)
            }),
            context("Failed receipts hash deserialization", |input| {
                self.hash_deserializer.deserialize(input)
            }),
            context("Failed state hash deserialization", |input| {
                self.hash_deserializer.deserialize(input)
            }),
            context("Failed beneficiary deserialization", |input| {
                self.address_deserializer.deserialize(input)
            }),
            context("Failed fee multiplier deserialization", |input| {
                self.u32_deserializer.deserialize(input)
            }),
            context("Failed signer deserialization", |input| {
                self.public_key_deserializer.deserialize(input)
            }),
        ))(rest)?;
        Ok((
            rest,
            BlockHeader {
                version,
                network,
                block_type: EntityType(block_type),
                height,
                timestamp: Timestamp(timestamp),
                difficulty,
                generation_hash_proof,
                previous_block_hash,
                transactions_hash,
                receipts_hash,
                state_hash,
                beneficiary_address,
                fee_multiplier,
                signer_public_key,
                signature,
            },
        ))
    }
}

impl Default for BlockDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Block> for BlockDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Block, E> {
        context(
            "Failed Block deserialization",
            tuple((
                |input| self.deserialize_header(input),
                length_count(
                    context("Failed transaction count deserialization", |input| {
                        self.count_deserializer.deserialize(input)
                    }),
                    |input| self.transaction_deserializer.deserialize(input),
                ),
            )),
        )(buffer)
        .map(|(rest, (header, transactions))| {
            (
                rest,
                Block {
                    header,
                    transactions,
                },
            )
        })
    }
}

/// Serializer for `BlockElement`, as written in block storage
#[derive(Clone, Debug, Default)]
pub struct BlockElementSerializer {
    block_serializer: BlockSerializer,
    hash_serializer: HashSerializer,
    u32_serializer: U32VarIntSerializer,
}

impl BlockElementSerializer {
    /// Creates a `BlockElementSerializer`
    pub const fn new() -> Self {
        Self {
            block_serializer: BlockSerializer::new(),
            hash_serializer: HashSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<BlockElement> for BlockElementSerializer {
    fn serialize(&self, value: &BlockElement, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.block_serializer.serialize(&value.block, buffer)?;
        self.hash_serializer
            .serialize(&value.generation_hash, buffer)?;
        let count: u32 = value
            .sub_cache_merkle_roots
            .len()
            .try_into()
            .map_err(|_| SerializeError::NumberTooBig("too many merkle roots".to_string()))?;
        self.u32_serializer.serialize(&count, buffer)?;
        for root in value.sub_cache_merkle_roots.iter() {
            self.hash_serializer.serialize(root, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `BlockElement`. Entity hashes are recomputed.
#[derive(Clone, Debug)]
pub struct BlockElementDeserializer {
    block_deserializer: BlockDeserializer,
    hash_deserializer: HashDeserializer,
    count_deserializer: U32VarIntDeserializer,
}

impl BlockElementDeserializer {
    /// Creates a `BlockElementDeserializer`
    pub const fn new() -> Self {
        Self {
            block_deserializer: BlockDeserializer::new(),
            hash_deserializer: HashDeserializer::new(),
            count_deserializer: U32VarIntDeserializer::new(Included(0), Included(256)),
        }
    }
}

impl Default for BlockElementDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockElement> for BlockElementDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockElement, E> {
        let (rest, (block, generation_hash, sub_cache_merkle_roots)) = context(
            "Failed BlockElement deserialization",
            tuple((
                |input| self.block_deserializer.deserialize(input),
                |input| self.hash_deserializer.deserialize(input),
                length_count(
                    |input| self.count_deserializer.deserialize(input),
                    |input| self.hash_deserializer.deserialize(input),
                ),
            )),
        )(buffer)?;
        let mut element = BlockElement::new(block).map_err(|_| {
            nom::Err::Error(ParseError::from_error_kind(
                buffer,
                nom::error::ErrorKind::Fail,
            ))
        })?;
        element.generation_hash = generation_hash;
        element.sub_cache_merkle_roots = sub_cache_merkle_roots;
        Ok((rest, element))
    }
}
