// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use super::{decode_payload, TransactionPlugin};
use crate::error::ChainError;
use crate::notifications::Notification;
use bitxor_models::address::{Address, AddressDeserializer, AddressSerializer};
use bitxor_models::amount::Amount;
use bitxor_models::entity::EntityType;
use bitxor_models::token::{IdentifierSerializer, UnresolvedTokenId, UnresolvedTokenIdDeserializer};
use bitxor_models::transaction::Transaction;
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
    U64VarIntDeserializer, U64VarIntSerializer, VecU8Deserializer, VecU8Serializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum number of tokens moved by a transfer
pub const MAX_TRANSFER_TOKENS: u32 = 256;
/// Maximum size of a transfer message
pub const MAX_TRANSFER_MESSAGE_SIZE: u64 = 1024;

/// Payload of a transfer transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPayload {
    /// credited account
    pub recipient: Address,
    /// tokens and amounts, in order
    pub tokens: Vec<(UnresolvedTokenId, Amount)>,
    /// free form message
    pub message: Vec<u8>,
}

/// Serializer for `TransferPayload`
#[derive(Clone, Default)]
pub struct TransferPayloadSerializer {
    address_serializer: AddressSerializer,
    identifier_serializer: IdentifierSerializer,
    u32_serializer: U32VarIntSerializer,
    u64_serializer: U64VarIntSerializer,
    message_serializer: VecU8Serializer,
}

impl TransferPayloadSerializer {
    /// Creates a `TransferPayloadSerializer`
    pub const fn new() -> Self {
        Self {
            address_serializer: AddressSerializer::new(),
            identifier_serializer: IdentifierSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            message_serializer: VecU8Serializer::new(),
        }
    }
}

impl Serializer<TransferPayload> for TransferPayloadSerializer {
    fn serialize(&self, value: &TransferPayload, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.address_serializer.serialize(&value.recipient, buffer)?;
        let count: u32 = value.tokens.len().try_into().map_err(|_| {
            SerializeError::NumberTooBig(format!("{} transfer tokens", value.tokens.len()))
        })?;
        self.u32_serializer.serialize(&count, buffer)?;
        for (token_id, amount) in value.tokens.iter() {
            self.identifier_serializer.serialize(token_id, buffer)?;
            self.u64_serializer.serialize(&amount.to_raw(), buffer)?;
        }
        self.message_serializer.serialize(&value.message, buffer)
    }
}

/// Deserializer for `TransferPayload`
#[derive(Clone)]
pub struct TransferPayloadDeserializer {
    address_deserializer: AddressDeserializer,
    token_id_deserializer: UnresolvedTokenIdDeserializer,
    count_deserializer: U32VarIntDeserializer,
    amount_deserializer: U64VarIntDeserializer,
    message_deserializer: VecU8Deserializer,
}

impl TransferPayloadDeserializer {
    /// Creates a `TransferPayloadDeserializer`
    pub const fn new() -> Self {
        Self {
            address_deserializer: AddressDeserializer::new(),
            token_id_deserializer: UnresolvedTokenIdDeserializer::new(),
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_TRANSFER_TOKENS),
            ),
            amount_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            message_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(MAX_TRANSFER_MESSAGE_SIZE),
            ),
        }
    }
}

impl Default for TransferPayloadDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<TransferPayload> for TransferPayloadDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TransferPayload, E> {
        context(
            "Failed TransferPayload deserialization",
            tuple((
                context("Failed recipient deserialization", |input| {
                    self.address_deserializer.deserialize(input)
                }),
                context(
                    "Failed tokens deserialization",
                    length_count(
                        |input| self.count_deserializer.deserialize(input),
                        tuple((
                            |input| self.token_id_deserializer.deserialize(input),
                            |input| self.amount_deserializer.deserialize(input),
                        )),
                    ),
                ),
                context("Failed message deserialization", |input| {
                    self.message_deserializer.deserialize(input)
                }),
            )),
        )(buffer)
        .map(|(rest, (recipient, tokens, message))| {
            (
                rest,
                TransferPayload {
                    recipient,
                    tokens: tokens
                        .into_iter()
                        .map(|(token_id, amount)| (token_id, Amount::from_raw(amount)))
                        .collect(),
                    message,
                },
            )
        })
    }
}

/// Moves tokens from the signer to a recipient
pub struct TransferPlugin;

impl TransactionPlugin for TransferPlugin {
    fn entity_type(&self) -> EntityType {
        EntityType::TRANSFER
    }

    fn name(&self) -> &'static str {
        "TransferPlugin"
    }

    fn publish(
        &self,
        transaction: &Transaction,
        signer: &Address,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        let payload = decode_payload(&TransferPayloadDeserializer::new(), transaction)?;
        sink.push(Notification::AccountAddress {
            address: payload.recipient,
        });
        for (token_id, amount) in payload.tokens {
            sink.push(Notification::BalanceTransfer {
                sender: *signer,
                recipient: payload.recipient,
                token_id,
                amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_models::timestamp::Timestamp;
    use bitxor_serialization::deserialize_exact;
    use bitxor_signature::KeyPair;

    fn recipient() -> Address {
        Address::from_public_key(
            &KeyPair::from_bytes(&[3; 32]).get_public_key(),
            NetworkIdentifier::PrivateTest,
        )
    }

    #[test]
    fn payload_keeps_token_order() {
        let payload = TransferPayload {
            recipient: recipient(),
            tokens: vec![
                (UnresolvedTokenId(9), Amount::from_raw(1)),
                (UnresolvedTokenId(2), Amount::from_raw(300)),
            ],
            message: b"hello".to_vec(),
        };
        let mut buffer = Vec::new();
        TransferPayloadSerializer::new()
            .serialize(&payload, &mut buffer)
            .unwrap();
        let decoded = deserialize_exact(&TransferPayloadDeserializer::new(), &buffer).unwrap();
        assert_eq!(decoded, payload);

        buffer.push(0);
        assert!(deserialize_exact(&TransferPayloadDeserializer::new(), &buffer).is_err());
    }

    #[test]
    fn malformed_payload_is_reported() {
        let keypair = KeyPair::from_bytes(&[1; 32]);
        let transaction = Transaction::new(
            NetworkIdentifier::PrivateTest,
            EntityType::TRANSFER,
            keypair.get_public_key(),
            Amount::zero(),
            Timestamp(1),
            vec![1, 2, 3],
        );
        let signer = Address::from_public_key(&keypair.get_public_key(), NetworkIdentifier::PrivateTest);
        assert_matches!(
            TransferPlugin.publish(&transaction, &signer, &mut Vec::new()),
            Err(ChainError::MalformedPayload {
                entity_type: EntityType::TRANSFER,
                ..
            })
        );
    }
}
