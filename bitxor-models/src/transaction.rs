// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::amount::Amount;
use crate::entity::EntityType;
use crate::error::ModelsError;
use crate::network::NetworkIdentifier;
use crate::timestamp::Timestamp;
use bitxor_hash::Hash;
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
    VecU8Deserializer, VecU8Serializer,
};
use bitxor_signature::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::{le_u16, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum size of a transaction payload
pub const MAX_TRANSACTION_PAYLOAD_SIZE: u64 = 1024 * 1024;

/// A signed transaction. The payload is interpreted by the plugin registered for `entity_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// entity version
    pub version: u8,
    /// network the transaction is meant for
    pub network: NetworkIdentifier,
    /// transaction type
    pub entity_type: EntityType,
    /// signer
    pub signer_public_key: PublicKey,
    /// signature over `signing_bytes`
    pub signature: Signature,
    /// maximum fee the signer accepts to pay
    pub max_fee: Amount,
    /// deadline after which the transaction is rejected
    pub deadline: Timestamp,
    /// type specific payload
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Creates an unsigned transaction
    pub fn new(
        network: NetworkIdentifier,
        entity_type: EntityType,
        signer_public_key: PublicKey,
        max_fee: Amount,
        deadline: Timestamp,
        payload: Vec<u8>,
    ) -> Self {
        Transaction {
            version: 1,
            network,
            entity_type,
            signer_public_key,
            signature: Signature::zero(),
            max_fee,
            deadline,
            payload,
        }
    }

    /// Bytes covered by the signature
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ModelsError> {
        let mut buffer = Vec::new();
        TransactionSerializer::new().serialize_signed_part(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Signs the transaction in place
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ModelsError> {
        self.signer_public_key = keypair.get_public_key();
        let signing_hash = Hash::compute_from(&self.signing_bytes()?);
        self.signature = keypair.sign(&signing_hash);
        Ok(())
    }

    /// Checks the signature
    pub fn verify_signature(&self) -> Result<(), ModelsError> {
        let signing_hash = Hash::compute_from(&self.signing_bytes()?);
        self.signer_public_key
            .verify_signature(&signing_hash, &self.signature)?;
        Ok(())
    }

    /// Entity hash, identifying the transaction
    pub fn entity_hash(&self) -> Result<Hash, ModelsError> {
        let signing_bytes = self.signing_bytes()?;
        Ok(Hash::compute_from_tuple(&[
            self.signature.to_bytes().as_slice(),
            self.signer_public_key.to_bytes().as_slice(),
            signing_bytes.as_slice(),
        ]))
    }
}

/// A transaction along with its hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionElement {
    /// transaction
    pub transaction: Transaction,
    /// its entity hash
    pub entity_hash: Hash,
}

impl TransactionElement {
    /// Wraps a transaction, computing its hash
    pub fn new(transaction: Transaction) -> Result<Self, ModelsError> {
        let entity_hash = transaction.entity_hash()?;
        Ok(TransactionElement {
            transaction,
            entity_hash,
        })
    }
}

/// Serializer for `Transaction`
#[derive(Clone, Default, Debug)]
pub struct TransactionSerializer {
    u64_serializer: U64VarIntSerializer,
    payload_serializer: VecU8Serializer,
    public_key_serializer: PublicKeySerializer,
    signature_serializer: SignatureSerializer,
}

impl TransactionSerializer {
    /// Creates a `TransactionSerializer`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
            payload_serializer: VecU8Serializer::new(),
            public_key_serializer: PublicKeySerializer::new(),
            signature_serializer: SignatureSerializer::new(),
        }
    }

    fn serialize_signed_part(
        &self,
        value: &Transaction,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        buffer.push(value.version);
        buffer.push(value.network.to_byte());
        buffer.extend_from_slice(&value.entity_type.0.to_le_bytes());
        self.public_key_serializer
            .serialize(&value.signer_public_key, buffer)?;
        self.u64_serializer.serialize(&value.max_fee.to_raw(), buffer)?;
        self.u64_serializer.serialize(&value.deadline.0, buffer)?;
        self.payload_serializer.serialize(&value.payload, buffer)
    }
}

impl Serializer<Transaction> for TransactionSerializer {
    fn serialize(&self, value: &Transaction, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.signature_serializer.serialize(&value.signature, buffer)?;
        self.serialize_signed_part(value, buffer)
    }
}

/// Deserializer for `Transaction`
#[derive(Clone, Debug)]
pub struct TransactionDeserializer {
    u64_deserializer: U64VarIntDeserializer,
    payload_deserializer: VecU8Deserializer,
    public_key_deserializer: PublicKeyDeserializer,
    signature_deserializer: SignatureDeserializer,
}

impl TransactionDeserializer {
    /// Creates a `TransactionDeserializer`
    pub const fn new() -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            payload_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(MAX_TRANSACTION_PAYLOAD_SIZE),
            ),
            public_key_deserializer: PublicKeyDeserializer::new(),
            signature_deserializer: SignatureDeserializer::new(),
        }
    }
}

impl Default for TransactionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn network_byte<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], NetworkIdentifier, E> {
    let (rest, byte) = le_u8(input)?;
    let network = NetworkIdentifier::try_from(byte).map_err(|_| {
        nom::Err::Error(ParseError::from_error_kind(
            input,
            nom::error::ErrorKind::Verify,
        ))
    })?;
    Ok((rest, network))
}

impl Deserializer<Transaction> for TransactionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Transaction, E> {
        context(
            "Failed Transaction deserialization",
            tuple((
                context("Failed signature deserialization", |input| {
                    self.signature_deserializer.deserialize(input)
                }),
                context("Failed version deserialization", le_u8),
                context("Failed network deserialization", network_byte),
                context("Failed type deserialization", le_u16),
                context("Failed signer deserialization", |input| {
                    self.public_key_deserializer.deserialize(input)
                }),
                context("Failed max_fee deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
                context("Failed deadline deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
                context("Failed payload deserialization", |input| {
                    self.payload_deserializer.deserialize(input)
                }),
            )),
        )(buffer)
        .map(
            |(rest, (signature, version, network, entity_type, signer, max_fee, deadline, payload))| {
                (
                    rest,
                    Transaction {
                        version,
                        network,
                        entity_type: EntityType(entity_type),
                        signer_public_key: signer,
                        signature,
                        max_fee: Amount::from_raw(max_fee),
                        deadline: Timestamp(deadline),
                        payload,
                    },
                )
            },
        )
    }
}
