// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use displaydoc::Display;
use thiserror::Error;

/// models result
pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

/// models error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ModelsError {
    /// Serialization error: {0}
    SerializeError(String),
    /// Deserialization error: {0}
    DeserializeError(String),
    /// bitxor_hash error: {0}
    BitxorHashError(#[from] bitxor_hash::BitxorHashError),
    /// bitxor_signature error: {0}
    BitxorSignatureError(#[from] bitxor_signature::BitxorSignatureError),
    /// identifier parse error: {0}
    IdentifierParseError(String),
    /// address parse error: {0}
    AddressParseError(String),
    /// unknown network: {0}
    UnknownNetwork(String),
    /// Amount overflow
    AmountOverflowError,
}

impl From<bitxor_serialization::SerializeError> for ModelsError {
    fn from(err: bitxor_serialization::SerializeError) -> Self {
        ModelsError::SerializeError(err.to_string())
    }
}
