// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::CacheError;
use crate::sub_cache::{deserialization_error, SubCacheDescriptor, SubCacheId};
use bitxor_models::height::{Height, HeightDeserializer, HeightSerializer};
use bitxor_models::timestamp::Timestamp;
use bitxor_serialization::{
    deserialize_exact, Deserializer, SerializeError, Serializer, U32VarIntDeserializer,
    U32VarIntSerializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Statistics of a block, used for difficulty and fee multiplier calculations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockStatistic {
    /// block height
    pub height: Height,
    /// block timestamp
    pub timestamp: Timestamp,
    /// block difficulty
    pub difficulty: u64,
    /// block fee multiplier
    pub fee_multiplier: u32,
}

/// Serializer for `BlockStatistic`
#[derive(Clone, Default)]
pub struct BlockStatisticSerializer {
    height_serializer: HeightSerializer,
    u64_serializer: U64VarIntSerializer,
    u32_serializer: U32VarIntSerializer,
}

impl BlockStatisticSerializer {
    /// Creates a `BlockStatisticSerializer`
    pub const fn new() -> Self {
        Self {
            height_serializer: HeightSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<BlockStatistic> for BlockStatisticSerializer {
    fn serialize(
        &self,
        value: &BlockStatistic,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.height_serializer.serialize(&value.height, buffer)?;
        self.u64_serializer.serialize(&value.timestamp.0, buffer)?;
        self.u64_serializer.serialize(&value.difficulty, buffer)?;
        self.u32_serializer.serialize(&value.fee_multiplier, buffer)
    }
}

/// Deserializer for `BlockStatistic`
#[derive(Clone)]
pub struct BlockStatisticDeserializer {
    height_deserializer: HeightDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    u32_deserializer: U32VarIntDeserializer,
}

impl BlockStatisticDeserializer {
    /// Creates a `BlockStatisticDeserializer`
    pub const fn new() -> Self {
        Self {
            height_deserializer: HeightDeserializer::new(),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
        }
    }
}

impl Default for BlockStatisticDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockStatistic> for BlockStatisticDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockStatistic, E> {
        context(
            "Failed BlockStatistic deserialization",
            tuple((
                |input| self.height_deserializer.deserialize(input),
                |input| self.u64_deserializer.deserialize(input),
                |input| self.u64_deserializer.deserialize(input),
                |input| self.u32_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(|(rest, (height, timestamp, difficulty, fee_multiplier))| {
            (
                rest,
                BlockStatistic {
                    height,
                    timestamp: Timestamp(timestamp),
                    difficulty,
                    fee_multiplier,
                },
            )
        })
    }
}

/// Block statistics keyed by height
pub struct BlockStatisticCache;

impl SubCacheDescriptor for BlockStatisticCache {
    const ID: SubCacheId = SubCacheId::BlockStatistic;
    type Key = Height;
    type Value = BlockStatistic;

    fn key_of(value: &BlockStatistic) -> Height {
        value.height
    }

    fn serialize_key(key: &Height) -> Result<Vec<u8>, CacheError> {
        // big endian keeps entries in height order
        Ok(key.0.to_be_bytes().to_vec())
    }

    fn deserialize_key(bytes: &[u8]) -> Result<Height, CacheError> {
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| deserialization_error::<Self>("invalid height key".to_string()))?;
        Ok(Height(u64::from_be_bytes(bytes)))
    }

    fn serialize_value(value: &BlockStatistic) -> Result<Vec<u8>, CacheError> {
        let mut buffer = Vec::new();
        BlockStatisticSerializer::new().serialize(value, &mut buffer)?;
        Ok(buffer)
    }

    fn deserialize_value(bytes: &[u8]) -> Result<BlockStatistic, CacheError> {
        deserialize_exact(&BlockStatisticDeserializer::new(), bytes)
            .map_err(deserialization_error::<Self>)
    }
}
