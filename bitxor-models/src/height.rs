// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;

/// Height of a block in the chain. The genesis block is at height 1, an empty chain has height 0.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Height(pub u64);

impl Height {
    /// Height of the genesis block
    pub const GENESIS: Height = Height(1);

    /// Next height
    #[must_use]
    pub fn next(self) -> Height {
        Height(self.0.saturating_add(1))
    }

    /// Previous height, saturating at zero
    #[must_use]
    pub fn prev(self) -> Height {
        Height(self.0.saturating_sub(1))
    }

    /// Iterate over `start..=end`
    pub fn range_inclusive(start: Height, end: Height) -> impl DoubleEndedIterator<Item = Height> {
        (start.0..=end.0).map(Height)
    }
}

impl std::fmt::Display for Height {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serializer for `Height`
#[derive(Clone, Default, Debug)]
pub struct HeightSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl HeightSerializer {
    /// Creates a `HeightSerializer`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Height> for HeightSerializer {
    fn serialize(&self, value: &Height, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `Height`
#[derive(Clone, Debug)]
pub struct HeightDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

impl HeightDeserializer {
    /// Creates a `HeightDeserializer`
    pub const fn new() -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for HeightDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Height> for HeightDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Height, E> {
        context("Failed Height deserialization", |input| {
            self.u64_deserializer.deserialize(input)
        })(buffer)
        .map(|(rest, value)| (rest, Height(value)))
    }
}
