// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::CacheError;
use crate::sub_cache::{deserialization_error, SubCacheDescriptor, SubCacheId};
use bitxor_models::address::{Address, AddressDeserializer, AddressSerializer};
use bitxor_models::height::{Height, HeightDeserializer, HeightSerializer};
use bitxor_models::token::{
    IdentifierSerializer, NamespaceId, NamespaceIdDeserializer, TokenId, TokenIdDeserializer,
};
use bitxor_serialization::{
    deserialize_exact, Deserializer, SerializeError, Serializer, VecU8Deserializer,
    VecU8Serializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::le_u8;
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum length of a namespace name
pub const MAX_NAMESPACE_NAME_SIZE: u64 = 64;

/// Registered namespace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// identifier, derived from the name
    pub id: NamespaceId,
    /// name
    pub name: String,
    /// owner
    pub owner: Address,
    /// height of the registration
    pub registration_height: Height,
    /// token the namespace is an alias of
    pub alias: Option<TokenId>,
}

/// Serializer for `NamespaceEntry`
#[derive(Clone, Default)]
pub struct NamespaceEntrySerializer {
    identifier_serializer: IdentifierSerializer,
    name_serializer: VecU8Serializer,
    address_serializer: AddressSerializer,
    height_serializer: HeightSerializer,
}

impl NamespaceEntrySerializer {
    /// Creates a `NamespaceEntrySerializer`
    pub const fn new() -> Self {
        Self {
            identifier_serializer: IdentifierSerializer::new(),
            name_serializer: VecU8Serializer::new(),
            address_serializer: AddressSerializer::new(),
            height_serializer: HeightSerializer::new(),
        }
    }
}

impl Serializer<NamespaceEntry> for NamespaceEntrySerializer {
    fn serialize(
        &self,
        value: &NamespaceEntry,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.identifier_serializer.serialize(&value.id, buffer)?;
        self.name_serializer
            .serialize(&value.name.as_bytes().to_vec(), buffer)?;
        self.address_serializer.serialize(&value.owner, buffer)?;
        self.height_serializer
            .serialize(&value.registration_height, buffer)?;
        match &value.alias {
            Some(token_id) => {
                buffer.push(1);
                self.identifier_serializer.serialize(token_id, buffer)
            }
            None => {
                buffer.push(0);
                Ok(())
            }
        }
    }
}

/// Deserializer for `NamespaceEntry`
#[derive(Clone)]
pub struct NamespaceEntryDeserializer {
    id_deserializer: NamespaceIdDeserializer,
    name_deserializer: VecU8Deserializer,
    address_deserializer: AddressDeserializer,
    height_deserializer: HeightDeserializer,
    token_id_deserializer: TokenIdDeserializer,
}

impl NamespaceEntryDeserializer {
    /// Creates a `NamespaceEntryDeserializer`
    pub const fn new() -> Self {
        Self {
            id_deserializer: NamespaceIdDeserializer::new(),
            name_deserializer: VecU8Deserializer::new(
                Included(1),
                Included(MAX_NAMESPACE_NAME_SIZE),
            ),
            address_deserializer: AddressDeserializer::new(),
            height_deserializer: HeightDeserializer::new(),
            token_id_deserializer: TokenIdDeserializer::new(),
        }
    }

    fn deserialize_alias<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Option<TokenId>, E> {
        let (rest, flag) = le_u8(buffer)?;
        match flag {
            0 => Ok((rest, None)),
            1 => self
                .token_id_deserializer
                .deserialize(rest)
                .map(|(rest, token_id)| (rest, Some(token_id))),
            _ => Err(nom::Err::Error(ParseError::from_error_kind(
                buffer,
                nom::error::ErrorKind::Switch,
            ))),
        }
    }

    fn deserialize_name<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        let (rest, bytes) = self.name_deserializer.deserialize(buffer)?;
        let name = String::from_utf8(bytes).map_err(|_| {
            nom::Err::Error(ParseError::from_error_kind(
                buffer,
                nom::error::ErrorKind::Char,
            ))
        })?;
        Ok((rest, name))
    }
}

impl Default for NamespaceEntryDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<NamespaceEntry> for NamespaceEntryDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], NamespaceEntry, E> {
        context(
            "Failed NamespaceEntry deserialization",
            tuple((
                |input| self.id_deserializer.deserialize(input),
                |input| self.deserialize_name(input),
                |input| self.address_deserializer.deserialize(input),
                |input| self.height_deserializer.deserialize(input),
                |input| self.deserialize_alias(input),
            )),
        )(buffer)
        .map(|(rest, (id, name, owner, registration_height, alias))| {
            (
                rest,
                NamespaceEntry {
                    id,
                    name,
                    owner,
                    registration_height,
                    alias,
                },
            )
        })
    }
}

/// Namespaces keyed by id
pub struct NamespaceCache;

impl SubCacheDescriptor for NamespaceCache {
    const ID: SubCacheId = SubCacheId::Namespace;
    type Key = NamespaceId;
    type Value = NamespaceEntry;

    fn key_of(value: &NamespaceEntry) -> NamespaceId {
        value.id
    }

    fn serialize_key(key: &NamespaceId) -> Result<Vec<u8>, CacheError> {
        Ok(key.0.to_be_bytes().to_vec())
    }

    fn deserialize_key(bytes: &[u8]) -> Result<NamespaceId, CacheError> {
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| deserialization_error::<Self>("invalid namespace key".to_string()))?;
        Ok(NamespaceId(u64::from_be_bytes(bytes)))
    }

    fn serialize_value(value: &NamespaceEntry) -> Result<Vec<u8>, CacheError> {
        let mut buffer = Vec::new();
        NamespaceEntrySerializer::new().serialize(value, &mut buffer)?;
        Ok(buffer)
    }

    fn deserialize_value(bytes: &[u8]) -> Result<NamespaceEntry, CacheError> {
        deserialize_exact(&NamespaceEntryDeserializer::new(), bytes)
            .map_err(deserialization_error::<Self>)
    }
}
