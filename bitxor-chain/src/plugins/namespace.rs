// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use super::{decode_payload, TransactionPlugin};
use crate::error::ChainError;
use crate::notifications::Notification;
use crate::observers::{NotificationObserver, NotifyMode, ObserverContext};
use crate::validation::{
    StatefulValidator, StatelessValidator, ValidationFailure, ValidationResult, ValidatorContext,
};
use bitxor_cache::{NamespaceCache, NamespaceEntry};
use bitxor_models::address::Address;
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::entity::EntityType;
use bitxor_models::token::NamespaceId;
use bitxor_models::transaction::Transaction;
use bitxor_serialization::{
    Deserializer, SerializeError, Serializer, VecU8Deserializer, VecU8Serializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use std::ops::Bound::Included;

/// Maximum length of a namespace name
pub const MAX_NAMESPACE_NAME_SIZE: u64 = 64;

/// Whether `name` is usable as a root namespace name: lowercase alphanumerics, `-` and `_`,
/// starting with an alphanumeric
pub fn is_valid_namespace_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() as u64 <= MAX_NAMESPACE_NAME_SIZE
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Payload of a namespace registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceRegistrationPayload {
    /// namespace name
    pub name: String,
}

/// Serializer for `NamespaceRegistrationPayload`
#[derive(Clone, Default)]
pub struct NamespaceRegistrationPayloadSerializer {
    name_serializer: VecU8Serializer,
}

impl NamespaceRegistrationPayloadSerializer {
    /// Creates a `NamespaceRegistrationPayloadSerializer`
    pub const fn new() -> Self {
        Self {
            name_serializer: VecU8Serializer::new(),
        }
    }
}

impl Serializer<NamespaceRegistrationPayload> for NamespaceRegistrationPayloadSerializer {
    fn serialize(
        &self,
        value: &NamespaceRegistrationPayload,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.name_serializer
            .serialize(&value.name.as_bytes().to_vec(), buffer)
    }
}

/// Deserializer for `NamespaceRegistrationPayload`
#[derive(Clone)]
pub struct NamespaceRegistrationPayloadDeserializer {
    name_deserializer: VecU8Deserializer,
}

impl NamespaceRegistrationPayloadDeserializer {
    /// Creates a `NamespaceRegistrationPayloadDeserializer`
    pub const fn new() -> Self {
        Self {
            name_deserializer: VecU8Deserializer::new(
                Included(1),
                Included(MAX_NAMESPACE_NAME_SIZE),
            ),
        }
    }
}

impl Default for NamespaceRegistrationPayloadDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<NamespaceRegistrationPayload> for NamespaceRegistrationPayloadDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], NamespaceRegistrationPayload, E> {
        context(
            "Failed NamespaceRegistrationPayload deserialization",
            |input: &'a [u8]| {
                let (rest, bytes) = self.name_deserializer.deserialize(input)?;
                let name = String::from_utf8(bytes).map_err(|_| {
                    nom::Err::Error(ParseError::from_error_kind(
                        input,
                        nom::error::ErrorKind::Verify,
                    ))
                })?;
                Ok((rest, NamespaceRegistrationPayload { name }))
            },
        )(buffer)
    }
}

/// Registers root namespaces
pub struct NamespaceRegistrationPlugin;

impl TransactionPlugin for NamespaceRegistrationPlugin {
    fn entity_type(&self) -> EntityType {
        EntityType::NAMESPACE_REGISTRATION
    }

    fn name(&self) -> &'static str {
        "NamespaceRegistrationPlugin"
    }

    fn publish(
        &self,
        transaction: &Transaction,
        signer: &Address,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        let payload = decode_payload(&NamespaceRegistrationPayloadDeserializer::new(), transaction)?;
        sink.push(Notification::NamespaceRegistration {
            owner: *signer,
            namespace_id: NamespaceId::from_name(&payload.name),
            name: payload.name,
        });
        Ok(())
    }

    fn stateless_validators(
        &self,
        _config: &BlockchainConfiguration,
    ) -> Vec<Box<dyn StatelessValidator>> {
        vec![Box::new(NamespaceNameValidator)]
    }

    fn stateful_validators(
        &self,
        _config: &BlockchainConfiguration,
    ) -> Vec<Box<dyn StatefulValidator>> {
        vec![Box::new(NamespaceAvailabilityValidator)]
    }

    fn observers(&self, _config: &BlockchainConfiguration) -> Vec<Box<dyn NotificationObserver>> {
        vec![Box::new(NamespaceObserver)]
    }
}

/// Checks namespace names and the ids derived from them
pub struct NamespaceNameValidator;

impl StatelessValidator for NamespaceNameValidator {
    fn name(&self) -> &'static str {
        "NamespaceNameValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::NamespaceRegistration {
                namespace_id, name, ..
            } => ValidationResult::check(
                is_valid_namespace_name(name) && *namespace_id == NamespaceId::from_name(name),
                ValidationFailure::InvalidNamespaceName,
            ),
            _ => ValidationResult::Success,
        }
    }
}

/// Rejects registrations of existing namespaces
pub struct NamespaceAvailabilityValidator;

impl StatefulValidator for NamespaceAvailabilityValidator {
    fn name(&self) -> &'static str {
        "NamespaceAvailabilityValidator"
    }

    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError> {
        match notification {
            Notification::NamespaceRegistration { namespace_id, .. } => {
                Ok(ValidationResult::check(
                    !context.delta.sub::<NamespaceCache>().contains(namespace_id)?,
                    ValidationFailure::NamespaceAlreadyExists,
                ))
            }
            _ => Ok(ValidationResult::Success),
        }
    }
}

/// Adds and removes namespaces
pub struct NamespaceObserver;

impl NotificationObserver for NamespaceObserver {
    fn name(&self) -> &'static str {
        "NamespaceObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::NamespaceRegistration {
            owner,
            namespace_id,
            name,
        } = notification
        else {
            return Ok(());
        };
        let height = context.height;
        let mut namespaces = context.delta.sub_mut::<NamespaceCache>();
        match context.mode {
            NotifyMode::Commit => namespaces.insert(&NamespaceEntry {
                id: *namespace_id,
                name: name.clone(),
                owner: *owner,
                registration_height: height,
                alias: None,
            })?,
            NotifyMode::Rollback => {
                namespaces.remove(namespace_id)?;
            }
        }
        Ok(())
    }
}
