// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ModelsError;
use bitxor_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::le_u64;
use nom::IResult;
use std::str::FromStr;

const NAMESPACE_FLAG: u64 = 1 << 63;

fn parse_hex_u64(s: &str) -> Result<u64, ModelsError> {
    let cleaned: String = s
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| *c != '\'' && *c != '_')
        .collect();
    u64::from_str_radix(&cleaned, 16)
        .map_err(|err| ModelsError::IdentifierParseError(format!("{}: {}", s, err)))
}

macro_rules! hex_identifier {
    ($($name:ident, $doc:literal);*) => {
        $(
            #[doc = $doc]
            #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
            pub struct $name(pub u64);

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{:016X}", self.0)
                }
            }

            impl std::fmt::Debug for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}({:016X})", stringify!($name), self.0)
                }
            }

            impl FromStr for $name {
                type Err = ModelsError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    parse_hex_u64(s).map($name)
                }
            }
        )*
    };
}

hex_identifier! {
    TokenId, "Resolved token identifier";
    UnresolvedTokenId, "Token identifier as written in a transaction, possibly a namespace alias";
    NamespaceId, "Namespace identifier"
}

impl TokenId {
    /// Derives a token id from its owner and a nonce. The namespace flag bit is always cleared.
    pub fn generate(owner: &[u8], nonce: u32) -> TokenId {
        let hash = bitxor_hash::Hash::compute_from_tuple(&[nonce.to_le_bytes().as_slice(), owner]);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.to_bytes()[..8]);
        TokenId(u64::from_le_bytes(bytes) & !NAMESPACE_FLAG)
    }

    /// The same value, unresolved
    pub fn unresolve(self) -> UnresolvedTokenId {
        UnresolvedTokenId(self.0)
    }
}

impl UnresolvedTokenId {
    /// Whether this id refers to a namespace whose alias must be resolved
    pub fn is_namespace_alias(&self) -> bool {
        self.0 & NAMESPACE_FLAG != 0
    }

    /// The namespace referred to by this id
    pub fn as_namespace(&self) -> NamespaceId {
        NamespaceId(self.0)
    }
}

impl NamespaceId {
    /// Derives a root namespace id from its name. The namespace flag bit is always set.
    pub fn from_name(name: &str) -> NamespaceId {
        let hash = bitxor_hash::Hash::compute_from(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.to_bytes()[..8]);
        NamespaceId(u64::from_le_bytes(bytes) | NAMESPACE_FLAG)
    }

    /// The same value, as an unresolved token id
    pub fn as_unresolved_token(self) -> UnresolvedTokenId {
        UnresolvedTokenId(self.0)
    }
}

/// Serializer for the fixed size identifiers
#[derive(Clone, Default)]
pub struct IdentifierSerializer;

impl IdentifierSerializer {
    /// Creates an `IdentifierSerializer`
    pub const fn new() -> Self {
        Self
    }
}

macro_rules! identifier_codec {
    ($($name:ident, $deserializer:ident);*) => {
        $(
            impl Serializer<$name> for IdentifierSerializer {
                fn serialize(&self, value: &$name, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
                    buffer.extend_from_slice(&value.0.to_le_bytes());
                    Ok(())
                }
            }

            #[doc = concat!("Deserializer for `", stringify!($name), "`")]
            #[derive(Clone, Default)]
            pub struct $deserializer;

            impl $deserializer {
                #[doc = concat!("Creates a deserializer for `", stringify!($name), "`")]
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Deserializer<$name> for $deserializer {
                fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
                    &self,
                    buffer: &'a [u8],
                ) -> IResult<&'a [u8], $name, E> {
                    context(concat!("Failed ", stringify!($name), " deserialization"), le_u64)(buffer)
                        .map(|(rest, value)| (rest, $name(value)))
                }
            }
        )*
    };
}

identifier_codec! {
    TokenId, TokenIdDeserializer;
    UnresolvedTokenId, UnresolvedTokenIdDeserializer;
    NamespaceId, NamespaceIdDeserializer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_parses_hex_with_separators() {
        let token = TokenId::from_str("0x6BED'913F'A202'23F8").unwrap();
        assert_eq!(token, TokenId(0x6BED_913F_A202_23F8));
        assert_eq!(token.to_string(), "6BED913FA20223F8");
    }

    #[test]
    fn namespace_ids_are_aliases() {
        let namespace = NamespaceId::from_name("bitxor");
        assert!(namespace.as_unresolved_token().is_namespace_alias());
        assert!(!TokenId::generate(b"owner", 1).unresolve().is_namespace_alias());
    }
}
