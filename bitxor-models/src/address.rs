// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ModelsError;
use crate::network::NetworkIdentifier;
use bitxor_hash::Hash;
use bitxor_serialization::{Deserializer, SerializeError, Serializer};
use bitxor_signature::PublicKey;
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use std::str::FromStr;

/// Size of an address
pub const ADDRESS_SIZE_BYTES: usize = 24;

/// Account address: network byte, 20 bytes of public key hash, 3 bytes of checksum
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_SIZE_BYTES]);

impl Address {
    /// Derives the address of a public key on a network
    pub fn from_public_key(public_key: &PublicKey, network: NetworkIdentifier) -> Address {
        let key_hash = Hash::compute_from(&public_key.to_bytes());
        let mut bytes = [0u8; ADDRESS_SIZE_BYTES];
        bytes[0] = network.to_byte();
        bytes[1..21].copy_from_slice(&key_hash.to_bytes()[..20]);
        let checksum = Hash::compute_from(&bytes[..21]);
        bytes[21..].copy_from_slice(&checksum.to_bytes()[..3]);
        Address(bytes)
    }

    /// Raw bytes
    pub fn to_bytes(&self) -> &[u8; ADDRESS_SIZE_BYTES] {
        &self.0
    }

    /// Builds an address from raw bytes, checking the checksum and the network byte
    pub fn from_bytes(bytes: &[u8; ADDRESS_SIZE_BYTES]) -> Result<Address, ModelsError> {
        NetworkIdentifier::try_from(bytes[0])
            .map_err(|err| ModelsError::AddressParseError(err.to_string()))?;
        let checksum = Hash::compute_from(&bytes[..21]);
        if checksum.to_bytes()[..3] != bytes[21..] {
            return Err(ModelsError::AddressParseError(
                "invalid address checksum".to_string(),
            ));
        }
        Ok(Address(*bytes))
    }

    /// Network the address belongs to
    pub fn network(&self) -> Result<NetworkIdentifier, ModelsError> {
        NetworkIdentifier::try_from(self.0[0])
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|err| ModelsError::AddressParseError(err.to_string()))?;
        let bytes: [u8; ADDRESS_SIZE_BYTES] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| ModelsError::AddressParseError(format!("wrong size: {}", s)))?;
        Address::from_bytes(&bytes)
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Address, D::Error> {
        let encoded = String::deserialize(d)?;
        Address::from_str(&encoded).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Serializer for `Address`
#[derive(Clone, Default, Debug)]
pub struct AddressSerializer;

impl AddressSerializer {
    /// Creates an `AddressSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Address> for AddressSerializer {
    fn serialize(&self, value: &Address, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Address`
#[derive(Clone, Default, Debug)]
pub struct AddressDeserializer;

impl AddressDeserializer {
    /// Creates an `AddressDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Address> for AddressDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Address, E> {
        context("Failed Address deserialization", |input: &'a [u8]| {
            if input.len() < ADDRESS_SIZE_BYTES {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::LengthValue,
                )));
            }
            let mut bytes = [0u8; ADDRESS_SIZE_BYTES];
            bytes.copy_from_slice(&input[..ADDRESS_SIZE_BYTES]);
            let address = Address::from_bytes(&bytes).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Verify,
                ))
            })?;
            Ok((&input[ADDRESS_SIZE_BYTES..], address))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_signature::KeyPair;

    #[test]
    fn address_string_round_trip() {
        let public_key = KeyPair::generate().get_public_key();
        let address = Address::from_public_key(&public_key, NetworkIdentifier::PrivateTest);
        assert_eq!(Address::from_str(&address.to_string()).unwrap(), address);
        assert_eq!(address.network().unwrap(), NetworkIdentifier::PrivateTest);
    }

    #[test]
    fn corrupted_address_is_rejected() {
        let public_key = KeyPair::generate().get_public_key();
        let address = Address::from_public_key(&public_key, NetworkIdentifier::Mainnet);
        let mut bytes = *address.to_bytes();
        bytes[5] ^= 1;
        assert!(Address::from_bytes(&bytes).is_err());
    }

    #[test]
    fn same_key_differs_across_networks() {
        let public_key = KeyPair::generate().get_public_key();
        assert_ne!(
            Address::from_public_key(&public_key, NetworkIdentifier::Mainnet),
            Address::from_public_key(&public_key, NetworkIdentifier::Testnet)
        );
    }
}
