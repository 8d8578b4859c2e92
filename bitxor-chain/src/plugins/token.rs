// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use super::base::{credit_account, debit_account};
use super::{decode_payload, TransactionPlugin};
use crate::error::ChainError;
use crate::notifications::Notification;
use crate::observers::{NotificationObserver, NotifyMode, ObserverContext};
use crate::validation::{
    StatefulValidator, StatelessValidator, ValidationFailure, ValidationResult, ValidatorContext,
};
use bitxor_cache::{NamespaceCache, TokenCache, TokenEntry};
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::entity::EntityType;
use bitxor_models::token::{
    IdentifierSerializer, NamespaceId, NamespaceIdDeserializer, TokenId, TokenIdDeserializer,
};
use bitxor_models::transaction::Transaction;
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::{le_u32, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum token divisibility
pub const MAX_TOKEN_DIVISIBILITY: u8 = 6;

/// Payload of a token definition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenDefinitionPayload {
    /// nonce, combined with the owner into the token id
    pub nonce: u32,
    /// number of decimal places
    pub divisibility: u8,
    /// supply credited to the owner
    pub supply: Amount,
}

/// Serializer for `TokenDefinitionPayload`
#[derive(Clone, Default)]
pub struct TokenDefinitionPayloadSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl TokenDefinitionPayloadSerializer {
    /// Creates a `TokenDefinitionPayloadSerializer`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<TokenDefinitionPayload> for TokenDefinitionPayloadSerializer {
    fn serialize(
        &self,
        value: &TokenDefinitionPayload,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.nonce.to_le_bytes());
        buffer.push(value.divisibility);
        self.u64_serializer.serialize(&value.supply.to_raw(), buffer)
    }
}

/// Deserializer for `TokenDefinitionPayload`
#[derive(Clone)]
pub struct TokenDefinitionPayloadDeserializer {
    supply_deserializer: U64VarIntDeserializer,
}

impl TokenDefinitionPayloadDeserializer {
    /// Creates a `TokenDefinitionPayloadDeserializer`
    pub const fn new() -> Self {
        Self {
            supply_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for TokenDefinitionPayloadDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<TokenDefinitionPayload> for TokenDefinitionPayloadDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TokenDefinitionPayload, E> {
        context(
            "Failed TokenDefinitionPayload deserialization",
            tuple((
                context("Failed nonce deserialization", le_u32),
                context("Failed divisibility deserialization", le_u8),
                context("Failed supply deserialization", |input| {
                    self.supply_deserializer.deserialize(input)
                }),
            )),
        )(buffer)
        .map(|(rest, (nonce, divisibility, supply))| {
            (
                rest,
                TokenDefinitionPayload {
                    nonce,
                    divisibility,
                    supply: Amount::from_raw(supply),
                },
            )
        })
    }
}

/// Payload of a token alias
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAliasPayload {
    /// aliasing namespace
    pub namespace_id: NamespaceId,
    /// aliased token
    pub token_id: TokenId,
}

/// Serializer for `TokenAliasPayload`
#[derive(Clone, Default)]
pub struct TokenAliasPayloadSerializer {
    identifier_serializer: IdentifierSerializer,
}

impl TokenAliasPayloadSerializer {
    /// Creates a `TokenAliasPayloadSerializer`
    pub const fn new() -> Self {
        Self {
            identifier_serializer: IdentifierSerializer::new(),
        }
    }
}

impl Serializer<TokenAliasPayload> for TokenAliasPayloadSerializer {
    fn serialize(&self, value: &TokenAliasPayload, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.identifier_serializer.serialize(&value.namespace_id, buffer)?;
        self.identifier_serializer.serialize(&value.token_id, buffer)
    }
}

/// Deserializer for `TokenAliasPayload`
#[derive(Clone, Default)]
pub struct TokenAliasPayloadDeserializer {
    namespace_id_deserializer: NamespaceIdDeserializer,
    token_id_deserializer: TokenIdDeserializer,
}

impl TokenAliasPayloadDeserializer {
    /// Creates a `TokenAliasPayloadDeserializer`
    pub const fn new() -> Self {
        Self {
            namespace_id_deserializer: NamespaceIdDeserializer::new(),
            token_id_deserializer: TokenIdDeserializer::new(),
        }
    }
}

impl Deserializer<TokenAliasPayload> for TokenAliasPayloadDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TokenAliasPayload, E> {
        context(
            "Failed TokenAliasPayload deserialization",
            tuple((
                |input| self.namespace_id_deserializer.deserialize(input),
                |input| self.token_id_deserializer.deserialize(input),
            )),
        )(buffer)
        .map(|(rest, (namespace_id, token_id))| {
            (
                rest,
                TokenAliasPayload {
                    namespace_id,
                    token_id,
                },
            )
        })
    }
}

/// Defines tokens owned by the signer
pub struct TokenDefinitionPlugin;

impl TransactionPlugin for TokenDefinitionPlugin {
    fn entity_type(&self) -> EntityType {
        EntityType::TOKEN_DEFINITION
    }

    fn name(&self) -> &'static str {
        "TokenDefinitionPlugin"
    }

    fn publish(
        &self,
        transaction: &Transaction,
        signer: &Address,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        let payload = decode_payload(&TokenDefinitionPayloadDeserializer::new(), transaction)?;
        sink.push(Notification::TokenDefinition {
            owner: *signer,
            token_id: TokenId::generate(signer.to_bytes(), payload.nonce),
            nonce: payload.nonce,
            divisibility: payload.divisibility,
            supply: payload.supply,
        });
        Ok(())
    }

    fn stateless_validators(
        &self,
        config: &BlockchainConfiguration,
    ) -> Vec<Box<dyn StatelessValidator>> {
        vec![Box::new(TokenDefinitionValidator::new(
            config.max_token_atomic_units,
        ))]
    }

    fn stateful_validators(
        &self,
        _config: &BlockchainConfiguration,
    ) -> Vec<Box<dyn StatefulValidator>> {
        vec![Box::new(TokenAvailabilityValidator)]
    }

    fn observers(&self, _config: &BlockchainConfiguration) -> Vec<Box<dyn NotificationObserver>> {
        vec![Box::new(TokenDefinitionObserver)]
    }
}

/// Links a namespace to a token
pub struct TokenAliasPlugin;

impl TransactionPlugin for TokenAliasPlugin {
    fn entity_type(&self) -> EntityType {
        EntityType::TOKEN_ALIAS
    }

    fn name(&self) -> &'static str {
        "TokenAliasPlugin"
    }

    fn publish(
        &self,
        transaction: &Transaction,
        signer: &Address,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        let payload = decode_payload(&TokenAliasPayloadDeserializer::new(), transaction)?;
        sink.push(Notification::TokenAlias {
            owner: *signer,
            namespace_id: payload.namespace_id,
            token_id: payload.token_id,
        });
        Ok(())
    }

    fn stateful_validators(
        &self,
        _config: &BlockchainConfiguration,
    ) -> Vec<Box<dyn StatefulValidator>> {
        vec![Box::new(TokenAliasOwnershipValidator)]
    }

    fn observers(&self, _config: &BlockchainConfiguration) -> Vec<Box<dyn NotificationObserver>> {
        vec![Box::new(TokenAliasObserver)]
    }
}

/// Checks divisibility and supply of new tokens
pub struct TokenDefinitionValidator {
    max_supply: Amount,
}

impl TokenDefinitionValidator {
    /// Validator accepting supplies up to `max_supply`
    pub fn new(max_supply: Amount) -> Self {
        TokenDefinitionValidator { max_supply }
    }
}

impl StatelessValidator for TokenDefinitionValidator {
    fn name(&self) -> &'static str {
        "TokenDefinitionValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::TokenDefinition {
                divisibility,
                supply,
                ..
            } => {
                if *divisibility > MAX_TOKEN_DIVISIBILITY {
                    return ValidationResult::Failure(ValidationFailure::InvalidDivisibility);
                }
                ValidationResult::check(
                    *supply <= self.max_supply,
                    ValidationFailure::InvalidTokenSupply,
                )
            }
            _ => ValidationResult::Success,
        }
    }
}

/// Rejects definitions of existing tokens
pub struct TokenAvailabilityValidator;

impl StatefulValidator for TokenAvailabilityValidator {
    fn name(&self) -> &'static str {
        "TokenAvailabilityValidator"
    }

    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError> {
        match notification {
            Notification::TokenDefinition { token_id, .. } => Ok(ValidationResult::check(
                !context.delta.sub::<TokenCache>().contains(token_id)?,
                ValidationFailure::TokenAlreadyExists,
            )),
            _ => Ok(ValidationResult::Success),
        }
    }
}

/// Checks that an alias is set by the namespace owner, on an unaliased namespace,
/// to an existing token
pub struct TokenAliasOwnershipValidator;

impl StatefulValidator for TokenAliasOwnershipValidator {
    fn name(&self) -> &'static str {
        "TokenAliasOwnershipValidator"
    }

    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError> {
        let Notification::TokenAlias {
            owner,
            namespace_id,
            token_id,
        } = notification
        else {
            return Ok(ValidationResult::Success);
        };
        let Some(namespace) = context.delta.sub::<NamespaceCache>().find(namespace_id)? else {
            return Ok(ValidationResult::Failure(ValidationFailure::UnknownNamespace));
        };
        if namespace.owner != *owner {
            return Ok(ValidationResult::Failure(
                ValidationFailure::NamespaceOwnerConflict,
            ));
        }
        if namespace.alias.is_some() {
            return Ok(ValidationResult::Failure(ValidationFailure::AliasAlreadyExists));
        }
        Ok(ValidationResult::check(
            context.delta.sub::<TokenCache>().contains(token_id)?,
            ValidationFailure::UnknownToken,
        ))
    }
}

/// Adds tokens and credits their supply to the owner
pub struct TokenDefinitionObserver;

impl NotificationObserver for TokenDefinitionObserver {
    fn name(&self) -> &'static str {
        "TokenDefinitionObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::TokenDefinition {
            owner,
            token_id,
            nonce,
            divisibility,
            supply,
        } = notification
        else {
            return Ok(());
        };
        match context.mode {
            NotifyMode::Commit => {
                let height = context.height;
                context.delta.sub_mut::<TokenCache>().insert(&TokenEntry {
                    id: *token_id,
                    owner: *owner,
                    definition_height: height,
                    supply: *supply,
                    divisibility: *divisibility,
                    nonce: *nonce,
                })?;
                credit_account(context, *owner, *token_id, *supply)
            }
            NotifyMode::Rollback => {
                debit_account(context, *owner, *token_id, *supply, self.name())?;
                context.delta.sub_mut::<TokenCache>().remove(token_id)?;
                Ok(())
            }
        }
    }
}

/// Sets and clears namespace aliases
pub struct TokenAliasObserver;

impl NotificationObserver for TokenAliasObserver {
    fn name(&self) -> &'static str {
        "TokenAliasObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::TokenAlias {
            namespace_id,
            token_id,
            ..
        } = notification
        else {
            return Ok(());
        };
        let mut namespaces = context.delta.sub_mut::<NamespaceCache>();
        let mut entry = namespaces
            .find(namespace_id)?
            .ok_or_else(|| ChainError::InvalidObservation {
                observer: "TokenAliasObserver",
                reason: format!("unknown namespace {}", namespace_id),
            })?;
        entry.alias = match context.mode {
            NotifyMode::Commit => Some(*token_id),
            NotifyMode::Rollback => None,
        };
        namespaces.insert(&entry)?;
        Ok(())
    }
}
