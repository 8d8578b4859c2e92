// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::SpoolingError;
use crate::subscribers::{
    BlockChangeSubscriber, FinalizationSubscriber, StateChangeSubscriber,
    TransactionStatusSubscriber,
};
use bitxor_cache::{CacheChanges, CacheChangesDeserializer, CacheChangesSerializer};
use bitxor_hash::{Hash, HashDeserializer, HashSerializer};
use bitxor_models::amount::ChainScore;
use bitxor_models::block::{BlockElement, BlockElementDeserializer, BlockElementSerializer};
use bitxor_models::height::{Height, HeightDeserializer, HeightSerializer};
use bitxor_models::transaction::{Transaction, TransactionDeserializer, TransactionSerializer};
use bitxor_serialization::{deserialize_exact, Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::number::complete::{le_u32, le_u64, le_u8};
use nom::sequence::tuple;
use nom::IResult;

const BLOCK_CHANGE_BLOCK: u8 = 0;
const BLOCK_CHANGE_DROP_BLOCKS_AFTER: u8 = 1;
const STATE_CHANGE_SCORE: u8 = 0;
const STATE_CHANGE_STATE: u8 = 1;

fn unknown_operation<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    input: &'a [u8],
    ctx: &'static str,
) -> nom::Err<E> {
    nom::Err::Error(E::add_context(
        input,
        ctx,
        E::from_error_kind(input, ErrorKind::Tag),
    ))
}

fn write_score(score: ChainScore, buffer: &mut Vec<u8>) {
    let (high, low) = score.to_parts();
    buffer.extend_from_slice(&high.to_le_bytes());
    buffer.extend_from_slice(&low.to_le_bytes());
}

fn read_score<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], ChainScore, E> {
    context("Failed ChainScore deserialization", tuple((le_u64, le_u64)))(input)
        .map(|(rest, (high, low))| (rest, ChainScore::from_parts(high, low)))
}

/// Block change queue message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockChangeMessage {
    /// a block was saved
    Block(BlockElement),
    /// blocks after a height were dropped
    DropBlocksAfter(Height),
}

/// Serializer for `BlockChangeMessage`
#[derive(Clone, Default)]
pub struct BlockChangeMessageSerializer {
    block_serializer: BlockElementSerializer,
    height_serializer: HeightSerializer,
}

impl BlockChangeMessageSerializer {
    /// Creates a `BlockChangeMessageSerializer`
    pub const fn new() -> Self {
        Self {
            block_serializer: BlockElementSerializer::new(),
            height_serializer: HeightSerializer::new(),
        }
    }
}

impl Serializer<BlockChangeMessage> for BlockChangeMessageSerializer {
    fn serialize(
        &self,
        value: &BlockChangeMessage,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        match value {
            BlockChangeMessage::Block(block_element) => {
                buffer.push(BLOCK_CHANGE_BLOCK);
                self.block_serializer.serialize(block_element, buffer)
            }
            BlockChangeMessage::DropBlocksAfter(height) => {
                buffer.push(BLOCK_CHANGE_DROP_BLOCKS_AFTER);
                self.height_serializer.serialize(height, buffer)
            }
        }
    }
}

/// Deserializer for `BlockChangeMessage`
#[derive(Clone, Default)]
pub struct BlockChangeMessageDeserializer {
    block_deserializer: BlockElementDeserializer,
    height_deserializer: HeightDeserializer,
}

impl BlockChangeMessageDeserializer {
    /// Creates a `BlockChangeMessageDeserializer`
    pub const fn new() -> Self {
        Self {
            block_deserializer: BlockElementDeserializer::new(),
            height_deserializer: HeightDeserializer::new(),
        }
    }
}

impl Deserializer<BlockChangeMessage> for BlockChangeMessageDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockChangeMessage, E> {
        let (rest, operation) = context("Failed block change operation", le_u8)(buffer)?;
        match operation {
            BLOCK_CHANGE_BLOCK => self
                .block_deserializer
                .deserialize(rest)
                .map(|(rest, block)| (rest, BlockChangeMessage::Block(block))),
            BLOCK_CHANGE_DROP_BLOCKS_AFTER => self
                .height_deserializer
                .deserialize(rest)
                .map(|(rest, height)| (rest, BlockChangeMessage::DropBlocksAfter(height))),
            _ => Err(unknown_operation(buffer, "Unknown block change operation")),
        }
    }
}

/// Finalization round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FinalizationRound {
    /// epoch
    pub epoch: u32,
    /// point within the epoch
    pub point: u32,
}

/// Finalization queue message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizationMessage {
    /// round that finalized the block
    pub round: FinalizationRound,
    /// finalized height
    pub height: Height,
    /// finalized block hash
    pub hash: Hash,
}

/// Serializer for `FinalizationMessage`
#[derive(Clone, Default)]
pub struct FinalizationMessageSerializer {
    height_serializer: HeightSerializer,
    hash_serializer: HashSerializer,
}

impl FinalizationMessageSerializer {
    /// Creates a `FinalizationMessageSerializer`
    pub const fn new() -> Self {
        Self {
            height_serializer: HeightSerializer::new(),
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<FinalizationMessage> for FinalizationMessageSerializer {
    fn serialize(
        &self,
        value: &FinalizationMessage,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.round.epoch.to_le_bytes());
        buffer.extend_from_slice(&value.round.point.to_le_bytes());
        self.height_serializer.serialize(&value.height, buffer)?;
        self.hash_serializer.serialize(&value.hash, buffer)
    }
}

/// Deserializer for `FinalizationMessage`
#[derive(Clone, Default)]
pub struct FinalizationMessageDeserializer {
    height_deserializer: HeightDeserializer,
    hash_deserializer: HashDeserializer,
}

impl FinalizationMessageDeserializer {
    /// Creates a `FinalizationMessageDeserializer`
    pub const fn new() -> Self {
        Self {
            height_deserializer: HeightDeserializer::new(),
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<FinalizationMessage> for FinalizationMessageDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], FinalizationMessage, E> {
        context(
            "Failed FinalizationMessage deserialization",
            tuple((
                le_u32,
                le_u32,
                |input| self.height_deserializer.deserialize(input),
                |input| self.hash_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(|(rest, (epoch, point, height, hash))| {
            (
                rest,
                FinalizationMessage {
                    round: FinalizationRound { epoch, point },
                    height,
                    hash,
                },
            )
        })
    }
}

/// Transaction status queue message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionStatusMessage {
    /// transaction hash
    pub hash: Hash,
    /// raw validation result
    pub status: u32,
    /// transaction
    pub transaction: Transaction,
}

/// Serializer for `TransactionStatusMessage`
#[derive(Clone, Default)]
pub struct TransactionStatusMessageSerializer {
    hash_serializer: HashSerializer,
    transaction_serializer: TransactionSerializer,
}

impl TransactionStatusMessageSerializer {
    /// Creates a `TransactionStatusMessageSerializer`
    pub const fn new() -> Self {
        Self {
            hash_serializer: HashSerializer::new(),
            transaction_serializer: TransactionSerializer::new(),
        }
    }
}

impl Serializer<TransactionStatusMessage> for TransactionStatusMessageSerializer {
    fn serialize(
        &self,
        value: &TransactionStatusMessage,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.hash_serializer.serialize(&value.hash, buffer)?;
        buffer.extend_from_slice(&value.status.to_le_bytes());
        self.transaction_serializer
            .serialize(&value.transaction, buffer)
    }
}

/// Deserializer for `TransactionStatusMessage`
#[derive(Clone, Default)]
pub struct TransactionStatusMessageDeserializer {
    hash_deserializer: HashDeserializer,
    transaction_deserializer: TransactionDeserializer,
}

impl TransactionStatusMessageDeserializer {
    /// Creates a `TransactionStatusMessageDeserializer`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
            transaction_deserializer: TransactionDeserializer::new(),
        }
    }
}

impl Deserializer<TransactionStatusMessage> for TransactionStatusMessageDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TransactionStatusMessage, E> {
        context(
            "Failed TransactionStatusMessage deserialization",
            tuple((
                |input| self.hash_deserializer.deserialize(input),
                le_u32,
                |input| self.transaction_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(|(rest, (hash, status, transaction))| {
            (
                rest,
                TransactionStatusMessage {
                    hash,
                    status,
                    transaction,
                },
            )
        })
    }
}

/// Changes of a single committed block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChangeInfo {
    /// cache changes
    pub cache_changes: CacheChanges,
    /// score added by the block
    pub score_delta: ChainScore,
    /// height the changes were committed at
    pub height: Height,
}

/// State change queue message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChangeMessage {
    /// the chain score was set to an absolute value
    ScoreChange(ChainScore),
    /// a block was committed
    StateChange(StateChangeInfo),
}

/// Serializer for `StateChangeMessage`
#[derive(Clone, Default)]
pub struct StateChangeMessageSerializer {
    height_serializer: HeightSerializer,
    changes_serializer: CacheChangesSerializer,
}

impl StateChangeMessageSerializer {
    /// Creates a `StateChangeMessageSerializer`
    pub const fn new() -> Self {
        Self {
            height_serializer: HeightSerializer::new(),
            changes_serializer: CacheChangesSerializer::new(),
        }
    }
}

impl Serializer<StateChangeMessage> for StateChangeMessageSerializer {
    fn serialize(
        &self,
        value: &StateChangeMessage,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        match value {
            StateChangeMessage::ScoreChange(score) => {
                buffer.push(STATE_CHANGE_SCORE);
                write_score(*score, buffer);
                Ok(())
            }
            StateChangeMessage::StateChange(info) => {
                buffer.push(STATE_CHANGE_STATE);
                write_score(info.score_delta, buffer);
                self.height_serializer.serialize(&info.height, buffer)?;
                self.changes_serializer
                    .serialize(&info.cache_changes, buffer)
            }
        }
    }
}

/// Deserializer for `StateChangeMessage`
#[derive(Clone)]
pub struct StateChangeMessageDeserializer {
    height_deserializer: HeightDeserializer,
    changes_deserializer: CacheChangesDeserializer,
}

impl StateChangeMessageDeserializer {
    /// Creates a `StateChangeMessageDeserializer`
    pub const fn new() -> Self {
        Self {
            height_deserializer: HeightDeserializer::new(),
            changes_deserializer: CacheChangesDeserializer::new(),
        }
    }
}

impl Default for StateChangeMessageDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<StateChangeMessage> for StateChangeMessageDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], StateChangeMessage, E> {
        let (rest, operation) = context("Failed state change operation", le_u8)(buffer)?;
        match operation {
            STATE_CHANGE_SCORE => read_score(rest)
                .map(|(rest, score)| (rest, StateChangeMessage::ScoreChange(score))),
            STATE_CHANGE_STATE => tuple((
                read_score,
                |input| self.height_deserializer.deserialize(input),
                |input| self.changes_deserializer.deserialize(input),
            ))(rest)
            .map(|(rest, (score_delta, height, cache_changes))| {
                (
                    rest,
                    StateChangeMessage::StateChange(StateChangeInfo {
                        cache_changes,
                        score_delta,
                        height,
                    }),
                )
            }),
            _ => Err(unknown_operation(buffer, "Unknown state change operation")),
        }
    }
}

/// Decodes a block change message and forwards it to `subscriber`
pub fn read_next_block_change<S: BlockChangeSubscriber + ?Sized>(
    bytes: &[u8],
    subscriber: &mut S,
) -> Result<(), SpoolingError> {
    match deserialize_exact(&BlockChangeMessageDeserializer::new(), bytes)
        .map_err(SpoolingError::Serialization)?
    {
        BlockChangeMessage::Block(block_element) => subscriber.notify_block(&block_element),
        BlockChangeMessage::DropBlocksAfter(height) => subscriber.notify_drop_blocks_after(height),
    }
}

/// Decodes a finalization message and forwards it to `subscriber`
pub fn read_next_finalization<S: FinalizationSubscriber + ?Sized>(
    bytes: &[u8],
    subscriber: &mut S,
) -> Result<(), SpoolingError> {
    let message = deserialize_exact(&FinalizationMessageDeserializer::new(), bytes)
        .map_err(SpoolingError::Serialization)?;
    subscriber.notify_finalized_block(message.round, message.height, &message.hash)
}

/// Decodes a transaction status message and forwards it to `subscriber`
pub fn read_next_transaction_status<S: TransactionStatusSubscriber + ?Sized>(
    bytes: &[u8],
    subscriber: &mut S,
) -> Result<(), SpoolingError> {
    let message = deserialize_exact(&TransactionStatusMessageDeserializer::new(), bytes)
        .map_err(SpoolingError::Serialization)?;
    subscriber.notify_status(&message.transaction, &message.hash, message.status)
}

/// Decodes a state change message and forwards it to `subscriber`
pub fn read_next_state_change<S: StateChangeSubscriber + ?Sized>(
    bytes: &[u8],
    subscriber: &mut S,
) -> Result<(), SpoolingError> {
    match deserialize_exact(&StateChangeMessageDeserializer::new(), bytes)
        .map_err(SpoolingError::Serialization)?
    {
        StateChangeMessage::ScoreChange(score) => subscriber.notify_score_change(score),
        StateChangeMessage::StateChange(info) => subscriber.notify_state_change(&info),
    }
}
