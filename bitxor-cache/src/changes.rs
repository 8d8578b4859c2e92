// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::dependent_state::{DependentState, DependentStateDeserializer, DependentStateSerializer};
use crate::error::CacheError;
use crate::sub_cache::{SubCacheDescriptor, SubCacheEntries, SubCacheId, SubCacheOverlay};
use bitxor_db_exports::ColumnBatch;
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
    VecU8Deserializer, VecU8Serializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum number of changed entries per kind in a single sub cache change set
pub const MAX_CHANGED_ENTRIES: u64 = 10_000_000;

/// Serialized entries changed by a delta in one sub cache
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubCacheChanges {
    /// entries that did not exist before
    pub added: Vec<(Vec<u8>, Vec<u8>)>,
    /// entries whose value changed
    pub modified: Vec<(Vec<u8>, Vec<u8>)>,
    /// keys that were removed
    pub removed: Vec<Vec<u8>>,
}

impl SubCacheChanges {
    pub(crate) fn from_overlay(base: &SubCacheEntries, overlay: &SubCacheOverlay) -> Self {
        let mut changes = SubCacheChanges::default();
        for (key, value) in overlay.iter() {
            match (value, base.contains_key(key)) {
                (Some(value), false) => changes.added.push((key.clone(), value.clone())),
                (Some(value), true) => changes.modified.push((key.clone(), value.clone())),
                (None, true) => changes.removed.push(key.clone()),
                (None, false) => {}
            }
        }
        changes
    }

    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Database batch equivalent to these changes
    pub(crate) fn to_column_batch(&self) -> ColumnBatch {
        let mut batch = ColumnBatch::new();
        for (key, value) in self.added.iter().chain(self.modified.iter()) {
            batch.insert(key.clone(), Some(value.clone()));
        }
        for key in self.removed.iter() {
            batch.insert(key.clone(), None);
        }
        batch
    }

    /// Added and modified values, decoded
    pub fn upserted_values<D: SubCacheDescriptor>(&self) -> Result<Vec<D::Value>, CacheError> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .map(|(_, value)| D::deserialize_value(value))
            .collect()
    }

    /// Removed keys, decoded
    pub fn removed_keys<D: SubCacheDescriptor>(&self) -> Result<Vec<D::Key>, CacheError> {
        self.removed
            .iter()
            .map(|key| D::deserialize_key(key))
            .collect()
    }
}

/// Every change carried by a delta: one change set per sub cache plus the dependent state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheChanges {
    /// change sets indexed by `SubCacheId::index`
    pub sub_caches: Vec<SubCacheChanges>,
    /// dependent state after the changes
    pub dependent_state: DependentState,
}

impl CacheChanges {
    /// Change set of sub cache `id`
    pub fn sub(&self, id: SubCacheId) -> Option<&SubCacheChanges> {
        self.sub_caches.get(id.index())
    }

    /// Whether no sub cache changed
    pub fn is_empty(&self) -> bool {
        self.sub_caches.iter().all(SubCacheChanges::is_empty)
    }
}

/// Serializer for `CacheChanges`, as written to the state change queue
#[derive(Clone, Default)]
pub struct CacheChangesSerializer {
    bytes_serializer: VecU8Serializer,
    u64_serializer: U64VarIntSerializer,
    state_serializer: DependentStateSerializer,
}

impl CacheChangesSerializer {
    /// Creates a `CacheChangesSerializer`
    pub const fn new() -> Self {
        Self {
            bytes_serializer: VecU8Serializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            state_serializer: DependentStateSerializer::new(),
        }
    }

    fn serialize_count(&self, count: usize, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let count: u64 = count
            .try_into()
            .map_err(|_| SerializeError::NumberTooBig("too many changed entries".to_string()))?;
        self.u64_serializer.serialize(&count, buffer)
    }

    fn serialize_pairs(
        &self,
        pairs: &[(Vec<u8>, Vec<u8>)],
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.serialize_count(pairs.len(), buffer)?;
        for (key, value) in pairs {
            self.bytes_serializer.serialize(key, buffer)?;
            self.bytes_serializer.serialize(value, buffer)?;
        }
        Ok(())
    }
}

impl Serializer<CacheChanges> for CacheChangesSerializer {
    fn serialize(&self, value: &CacheChanges, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.serialize_count(value.sub_caches.len(), buffer)?;
        for changes in value.sub_caches.iter() {
            self.serialize_pairs(&changes.added, buffer)?;
            self.serialize_pairs(&changes.modified, buffer)?;
            self.serialize_count(changes.removed.len(), buffer)?;
            for key in changes.removed.iter() {
                self.bytes_serializer.serialize(key, buffer)?;
            }
        }
        self.state_serializer
            .serialize(&value.dependent_state, buffer)
    }
}

/// Deserializer for `CacheChanges`
#[derive(Clone)]
pub struct CacheChangesDeserializer {
    sub_cache_count_deserializer: U64VarIntDeserializer,
    entry_count_deserializer: U64VarIntDeserializer,
    bytes_deserializer: VecU8Deserializer,
    state_deserializer: DependentStateDeserializer,
}

impl CacheChangesDeserializer {
    /// Creates a `CacheChangesDeserializer`
    pub const fn new() -> Self {
        Self {
            sub_cache_count_deserializer: U64VarIntDeserializer::new(
                Included(0),
                Included(SubCacheId::ALL.len() as u64),
            ),
            entry_count_deserializer: U64VarIntDeserializer::new(
                Included(0),
                Included(MAX_CHANGED_ENTRIES),
            ),
            bytes_deserializer: VecU8Deserializer::new(Included(0), Included(u32::MAX as u64)),
            state_deserializer: DependentStateDeserializer::new(),
        }
    }

    fn deserialize_pairs<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<(Vec<u8>, Vec<u8>)>, E> {
        length_count(
            |input| self.entry_count_deserializer.deserialize(input),
            tuple((
                |input| self.bytes_deserializer.deserialize(input),
                |input| self.bytes_deserializer.deserialize(input),
            )),
        )(buffer)
    }

    fn deserialize_sub_cache<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], SubCacheChanges, E> {
        tuple((
            |input| self.deserialize_pairs(input),
            |input| self.deserialize_pairs(input),
            length_count(
                |input| self.entry_count_deserializer.deserialize(input),
                |input| self.bytes_deserializer.deserialize(input),
            ),
        ))(buffer)
        .map(|(rest, (added, modified, removed))| {
            (
                rest,
                SubCacheChanges {
                    added,
                    modified,
                    removed,
                },
            )
        })
    }
}

impl Default for CacheChangesDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<CacheChanges> for CacheChangesDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], CacheChanges, E> {
        context(
            "Failed CacheChanges deserialization",
            tuple((
                length_count(
                    |input| self.sub_cache_count_deserializer.deserialize(input),
                    |input| self.deserialize_sub_cache(input),
                ),
                |input| self.state_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(|(rest, (sub_caches, dependent_state))| {
            (
                rest,
                CacheChanges {
                    sub_caches,
                    dependent_state,
                },
            )
        })
    }
}
