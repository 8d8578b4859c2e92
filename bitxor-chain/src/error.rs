// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::validation::ValidationFailure;
use bitxor_cache::CacheError;
use bitxor_hash::Hash;
use bitxor_models::entity::EntityType;
use bitxor_models::height::Height;
use bitxor_models::token::UnresolvedTokenId;
use bitxor_models::ModelsError;
use displaydoc::Display;
use thiserror::Error;

/// chain error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ChainError {
    /// {description} failed validation with {failure}
    ValidationFailed {
        /// what was validated
        description: String,
        /// first failure
        failure: ValidationFailure,
    },
    /// unknown transaction type {0}
    UnknownTransactionType(EntityType),
    /// a plugin is already registered for {0}
    DuplicatePlugin(EntityType),
    /// malformed {entity_type} payload: {reason}
    MalformedPayload {
        /// transaction type
        entity_type: EntityType,
        /// what is wrong
        reason: String,
    },
    /// token id {0} cannot be resolved
    UnresolvableToken(UnresolvedTokenId),
    /// {observer} cannot apply notification: {reason}
    InvalidObservation {
        /// observer name
        observer: &'static str,
        /// what is wrong
        reason: String,
    },
    /// {name} mismatch at height {height}: block has {expected}, execution gives {actual}
    HashMismatch {
        /// which hash
        name: &'static str,
        /// block height
        height: Height,
        /// hash in the block header
        expected: Hash,
        /// calculated hash
        actual: Hash,
    },
    /// amount overflow while computing {0}
    AmountOverflow(String),
    /// cache error: {0}
    Cache(#[from] CacheError),
    /// models error: {0}
    Models(#[from] ModelsError),
}
