// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::CacheError;
use crate::sub_cache::{deserialization_error, SubCacheDescriptor, SubCacheId};
use bitxor_models::address::{Address, AddressDeserializer, AddressSerializer};
use bitxor_models::amount::Amount;
use bitxor_models::height::{Height, HeightDeserializer, HeightSerializer};
use bitxor_models::token::{IdentifierSerializer, TokenId, TokenIdDeserializer};
use bitxor_serialization::{
    deserialize_exact, Deserializer, SerializeError, Serializer, U32VarIntDeserializer,
    U32VarIntSerializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::le_u8;
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Token definition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenEntry {
    /// identifier
    pub id: TokenId,
    /// owner
    pub owner: Address,
    /// height of the definition
    pub definition_height: Height,
    /// current supply
    pub supply: Amount,
    /// number of decimal places
    pub divisibility: u8,
    /// nonce used to derive the identifier
    pub nonce: u32,
}

/// Serializer for `TokenEntry`
#[derive(Clone, Default)]
pub struct TokenEntrySerializer {
    identifier_serializer: IdentifierSerializer,
    address_serializer: AddressSerializer,
    height_serializer: HeightSerializer,
    u64_serializer: U64VarIntSerializer,
    u32_serializer: U32VarIntSerializer,
}

impl TokenEntrySerializer {
    /// Creates a `TokenEntrySerializer`
    pub const fn new() -> Self {
        Self {
            identifier_serializer: IdentifierSerializer::new(),
            address_serializer: AddressSerializer::new(),
            height_serializer: HeightSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<TokenEntry> for TokenEntrySerializer {
    fn serialize(&self, value: &TokenEntry, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.identifier_serializer.serialize(&value.id, buffer)?;
        self.address_serializer.serialize(&value.owner, buffer)?;
        self.height_serializer
            .serialize(&value.definition_height, buffer)?;
        self.u64_serializer
            .serialize(&value.supply.to_raw(), buffer)?;
        buffer.push(value.divisibility);
        self.u32_serializer.serialize(&value.nonce, buffer)
    }
}

/// Deserializer for `TokenEntry`
#[derive(Clone)]
pub struct TokenEntryDeserializer {
    token_id_deserializer: TokenIdDeserializer,
    address_deserializer: AddressDeserializer,
    height_deserializer: HeightDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    u32_deserializer: U32VarIntDeserializer,
}

impl TokenEntryDeserializer {
    /// Creates a `TokenEntryDeserializer`
    pub const fn new() -> Self {
        Self {
            token_id_deserializer: TokenIdDeserializer::new(),
            address_deserializer: AddressDeserializer::new(),
            height_deserializer: HeightDeserializer::new(),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
        }
    }
}

impl Default for TokenEntryDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<TokenEntry> for TokenEntryDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TokenEntry, E> {
        context(
            "Failed TokenEntry deserialization",
            tuple((
                |input| self.token_id_deserializer.deserialize(input),
                |input| self.address_deserializer.deserialize(input),
                |input| self.height_deserializer.deserialize(input),
                |input| self.u64_deserializer.deserialize(input),
                le_u8,
                |input| self.u32_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(
            |(rest, (id, owner, definition_height, supply, divisibility, nonce))| {
                (
                    rest,
                    TokenEntry {
                        id,
                        owner,
                        definition_height,
                        supply: Amount::from_raw(supply),
                        divisibility,
                        nonce,
                    },
                )
            },
        )
    }
}

/// Token definitions keyed by id
pub struct TokenCache;

impl SubCacheDescriptor for TokenCache {
    const ID: SubCacheId = SubCacheId::Token;
    type Key = TokenId;
    type Value = TokenEntry;

    fn key_of(value: &TokenEntry) -> TokenId {
        value.id
    }

    fn serialize_key(key: &TokenId) -> Result<Vec<u8>, CacheError> {
        Ok(key.0.to_be_bytes().to_vec())
    }

    fn deserialize_key(bytes: &[u8]) -> Result<TokenId, CacheError> {
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| deserialization_error::<Self>("invalid token key".to_string()))?;
        Ok(TokenId(u64::from_be_bytes(bytes)))
    }

    fn serialize_value(value: &TokenEntry) -> Result<Vec<u8>, CacheError> {
        let mut buffer = Vec::new();
        TokenEntrySerializer::new().serialize(value, &mut buffer)?;
        Ok(buffer)
    }

    fn deserialize_value(bytes: &[u8]) -> Result<TokenEntry, CacheError> {
        deserialize_exact(&TokenEntryDeserializer::new(), bytes)
            .map_err(deserialization_error::<Self>)
    }
}
