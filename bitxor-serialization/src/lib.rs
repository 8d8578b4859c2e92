// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Binary serialization traits shared by every crate of the node.
//!
//! Values are written into a caller provided buffer and read back with `nom` parsers so that
//! deserializers compose: a block deserializer is built out of header, transaction and hash
//! deserializers and every layer reports its own context on failure.

#![warn(missing_docs)]
use displaydoc::Display;
use nom::error::{ContextError, ErrorKind, ParseError};
use nom::IResult;
use std::ops::{Bound, RangeBounds};
use thiserror::Error;

/// Errors raised while serializing a value
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// General error {0}
    GeneralError(String),
}

/// Serialize a value of type `T` by appending its bytes to a buffer
pub trait Serializer<T> {
    /// Append the serialized form of `value` to `buffer`
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

/// Deserialize a value of type `T` from the front of a buffer
pub trait Deserializer<T> {
    /// Parse a value from `buffer`, returning the remaining bytes
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

/// Error type accumulating the parser stack of a failed deserialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeError<'a> {
    errors: Vec<(&'a [u8], String)>,
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        DeserializeError {
            errors: vec![(input, kind.description().to_string())],
        }
    }

    fn append(input: &'a [u8], kind: ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, kind.description().to_string()));
        other
    }
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx.to_string()));
        other
    }
}

impl<'a> std::fmt::Display for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        // innermost error first, outer contexts afterwards
        for (input, message) in self.errors.iter() {
            if !first {
                write!(f, " / ")?;
            }
            write!(f, "{} ({} bytes left)", message, input.len())?;
            first = false;
        }
        Ok(())
    }
}

/// Deserialize the whole `buffer` and fail if bytes are left over.
///
/// Returns the rendered error stack so that callers can wrap it into their own error type.
pub fn deserialize_exact<T, D: Deserializer<T>>(
    deserializer: &D,
    buffer: &[u8],
) -> Result<T, String> {
    let (rest, value) = deserializer
        .deserialize::<DeserializeError>(buffer)
        .map_err(|err| err.to_string())?;
    if !rest.is_empty() {
        return Err(format!("{} trailing bytes after value", rest.len()));
    }
    Ok(value)
}

fn check_bounds<T: PartialOrd>(value: &T, range: &(Bound<T>, Bound<T>)) -> bool {
    range.contains(value)
}

macro_rules! gen_varint {
    ($($type:ident, $s:ident, $d:ident, $encode:path, $buffer:path, $decode:path, $doc:literal);*) => {
        $(
            #[doc = concat!("Serializer for ", $doc, " in a varint form")]
            #[derive(Clone, Debug, Default)]
            pub struct $s;

            impl $s {
                #[doc = concat!("Creates a varint serializer for ", $doc)]
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Serializer<$type> for $s {
                fn serialize(&self, value: &$type, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
                    buffer.extend_from_slice($encode(*value, &mut $buffer()));
                    Ok(())
                }
            }

            #[doc = concat!("Deserializer for ", $doc, " in a varint form, with bounds")]
            #[derive(Clone, Debug)]
            pub struct $d {
                range: (Bound<$type>, Bound<$type>),
            }

            impl $d {
                #[doc = concat!("Creates a varint deserializer for ", $doc, " accepting values within the given bounds")]
                pub const fn new(min: Bound<$type>, max: Bound<$type>) -> Self {
                    Self { range: (min, max) }
                }
            }

            impl Deserializer<$type> for $d {
                fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
                    &self,
                    buffer: &'a [u8],
                ) -> IResult<&'a [u8], $type, E> {
                    let (value, rest) = $decode(buffer).map_err(|_| {
                        nom::Err::Error(E::add_context(
                            buffer,
                            concat!("Failed ", $doc, " varint deserialization"),
                            E::from_error_kind(buffer, ErrorKind::Fail),
                        ))
                    })?;
                    if !check_bounds(&value, &self.range) {
                        return Err(nom::Err::Error(E::add_context(
                            buffer,
                            concat!($doc, " out of bounds"),
                            E::from_error_kind(buffer, ErrorKind::Verify),
                        )));
                    }
                    Ok((rest, value))
                }
            }
        )*
    };
}

gen_varint! {
    u64, U64VarIntSerializer, U64VarIntDeserializer, unsigned_varint::encode::u64, unsigned_varint::encode::u64_buffer, unsigned_varint::decode::u64, "u64";
    u32, U32VarIntSerializer, U32VarIntDeserializer, unsigned_varint::encode::u32, unsigned_varint::encode::u32_buffer, unsigned_varint::decode::u32, "u32";
    u16, U16VarIntSerializer, U16VarIntDeserializer, unsigned_varint::encode::u16, unsigned_varint::encode::u16_buffer, unsigned_varint::decode::u16, "u16"
}

/// Serializer for a length-prefixed byte vector
#[derive(Clone, Default, Debug)]
pub struct VecU8Serializer {
    len_serializer: U64VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a length-prefixed byte vector serializer
    pub const fn new() -> Self {
        Self {
            len_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u64 = value.len().try_into().map_err(|err| {
            SerializeError::NumberTooBig(format!("too many bytes in vector: {}", err))
        })?;
        self.len_serializer.serialize(&len, buffer)?;
        buffer.extend_from_slice(value);
        Ok(())
    }
}

/// Deserializer for a length-prefixed byte vector
#[derive(Clone, Debug)]
pub struct VecU8Deserializer {
    len_deserializer: U64VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a length-prefixed byte vector deserializer with bounds on the length
    pub const fn new(min_length: Bound<u64>, max_length: Bound<u64>) -> Self {
        Self {
            len_deserializer: U64VarIntDeserializer::new(min_length, max_length),
        }
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        let (rest, len) = self.len_deserializer.deserialize(buffer)?;
        let len = len as usize;
        if rest.len() < len {
            return Err(nom::Err::Error(E::add_context(
                rest,
                "Failed byte vector deserialization",
                E::from_error_kind(rest, ErrorKind::Eof),
            )));
        }
        Ok((&rest[len..], rest[..len].to_vec()))
    }
}
