// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_models::amount::ChainScore;
use bitxor_models::height::{Height, HeightDeserializer, HeightSerializer};
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
    U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::le_u64;
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Aggregate values versioned together with the cache content
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DependentState {
    /// height of the last importance recalculation
    pub last_recalculation_height: Height,
    /// height of the last finalized block
    pub last_finalized_height: Height,
    /// dynamic fee multiplier
    pub dynamic_fee_multiplier: u32,
    /// number of transactions confirmed so far
    pub num_total_transactions: u64,
}

impl Default for DependentState {
    fn default() -> Self {
        DependentState {
            last_recalculation_height: Height(0),
            last_finalized_height: Height(0),
            dynamic_fee_multiplier: 1,
            num_total_transactions: 0,
        }
    }
}

/// Dependent state and chain score, saved as a single unit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupplementalData {
    /// dependent state of the cache
    pub state: DependentState,
    /// chain score
    pub chain_score: ChainScore,
}

/// Serializer for `DependentState`
#[derive(Clone, Default)]
pub struct DependentStateSerializer {
    height_serializer: HeightSerializer,
    u32_serializer: U32VarIntSerializer,
    u64_serializer: U64VarIntSerializer,
}

impl DependentStateSerializer {
    /// Creates a `DependentStateSerializer`
    pub const fn new() -> Self {
        Self {
            height_serializer: HeightSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<DependentState> for DependentStateSerializer {
    fn serialize(
        &self,
        value: &DependentState,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.height_serializer
            .serialize(&value.last_recalculation_height, buffer)?;
        self.height_serializer
            .serialize(&value.last_finalized_height, buffer)?;
        self.u32_serializer
            .serialize(&value.dynamic_fee_multiplier, buffer)?;
        self.u64_serializer
            .serialize(&value.num_total_transactions, buffer)
    }
}

/// Deserializer for `DependentState`
#[derive(Clone)]
pub struct DependentStateDeserializer {
    height_deserializer: HeightDeserializer,
    u32_deserializer: U32VarIntDeserializer,
    u64_deserializer: U64VarIntDeserializer,
}

impl DependentStateDeserializer {
    /// Creates a `DependentStateDeserializer`
    pub const fn new() -> Self {
        Self {
            height_deserializer: HeightDeserializer::new(),
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for DependentStateDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<DependentState> for DependentStateDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], DependentState, E> {
        context(
            "Failed DependentState deserialization",
            tuple((
                |input| self.height_deserializer.deserialize(input),
                |input| self.height_deserializer.deserialize(input),
                |input| self.u32_deserializer.deserialize(input),
                |input| self.u64_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(
            |(
                rest,
                (
                    last_recalculation_height,
                    last_finalized_height,
                    dynamic_fee_multiplier,
                    num_total_transactions,
                ),
            )| {
                (
                    rest,
                    DependentState {
                        last_recalculation_height,
                        last_finalized_height,
                        dynamic_fee_multiplier,
                        num_total_transactions,
                    },
                )
            },
        )
    }
}

/// Serializer for the content of `supplemental.dat`: supplemental data and the cache height
#[derive(Clone, Default)]
pub struct SupplementalDataSerializer {
    state_serializer: DependentStateSerializer,
}

impl SupplementalDataSerializer {
    /// Creates a `SupplementalDataSerializer`
    pub const fn new() -> Self {
        Self {
            state_serializer: DependentStateSerializer::new(),
        }
    }
}

impl Serializer<(SupplementalData, Height)> for SupplementalDataSerializer {
    fn serialize(
        &self,
        (data, height): &(SupplementalData, Height),
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.state_serializer.serialize(&data.state, buffer)?;
        let (high, low) = data.chain_score.to_parts();
        buffer.extend_from_slice(&high.to_le_bytes());
        buffer.extend_from_slice(&low.to_le_bytes());
        buffer.extend_from_slice(&height.0.to_le_bytes());
        Ok(())
    }
}

/// Deserializer for the content of `supplemental.dat`
#[derive(Clone, Default)]
pub struct SupplementalDataDeserializer {
    state_deserializer: DependentStateDeserializer,
}

impl SupplementalDataDeserializer {
    /// Creates a `SupplementalDataDeserializer`
    pub const fn new() -> Self {
        Self {
            state_deserializer: DependentStateDeserializer::new(),
        }
    }
}

impl Deserializer<(SupplementalData, Height)> for SupplementalDataDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], (SupplementalData, Height), E> {
        context(
            "Failed SupplementalData deserialization",
            tuple((
                |input| self.state_deserializer.deserialize(input),
                le_u64,
                le_u64,
                le_u64,
            )),
        )(buffer)
        .map(|(rest, (state, high, low, height))| {
            (
                rest,
                (
                    SupplementalData {
                        state,
                        chain_score: ChainScore::from_parts(high, low),
                    },
                    Height(height),
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_serialization::{deserialize_exact, DeserializeError};

    #[test]
    fn supplemental_data_is_restored_byte_for_byte() {
        let data = SupplementalData {
            state: DependentState {
                last_recalculation_height: Height(360),
                last_finalized_height: Height(355),
                dynamic_fee_multiplier: 17,
                num_total_transactions: 12_345,
            },
            chain_score: ChainScore::from_parts(3, u64::MAX - 1),
        };
        let mut buffer = Vec::new();
        SupplementalDataSerializer::new()
            .serialize(&(data, Height(361)), &mut buffer)
            .unwrap();

        let restored = deserialize_exact(&SupplementalDataDeserializer::new(), &buffer).unwrap();
        assert_eq!(restored, (data, Height(361)));

        let mut again = Vec::new();
        SupplementalDataSerializer::new()
            .serialize(&restored, &mut again)
            .unwrap();
        assert_eq!(again, buffer);
    }

    #[test]
    fn truncated_supplemental_data_fails() {
        let mut buffer = Vec::new();
        SupplementalDataSerializer::new()
            .serialize(&(SupplementalData::default(), Height(1)), &mut buffer)
            .unwrap();
        buffer.pop();
        assert!(SupplementalDataDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .is_err());
    }
}
