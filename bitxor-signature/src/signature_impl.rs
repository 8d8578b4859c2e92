// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::BitxorSignatureError;
use bitxor_hash::Hash;
use bitxor_serialization::{Deserializer, SerializeError, Serializer};
use ed25519_dalek::{Signer, Verifier};
use nom::{
    error::{context, ContextError, ParseError},
    IResult,
};
use std::str::FromStr;

/// Size of a public key
pub const PUBLIC_KEY_SIZE_BYTES: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;
/// Size of a secret key
pub const SECRET_KEY_SIZE_BYTES: usize = ed25519_dalek::SECRET_KEY_LENGTH;
/// Size of a signature
pub const SIGNATURE_SIZE_BYTES: usize = ed25519_dalek::SIGNATURE_LENGTH;

fn decode_bs58<const N: usize>(data: &str) -> Result<[u8; N], BitxorSignatureError> {
    let decoded = bs58::decode(data)
        .with_check(None)
        .into_vec()
        .map_err(|err| BitxorSignatureError::ParsingError(err.to_string()))?;
    decoded.as_slice().try_into().map_err(|_| {
        BitxorSignatureError::ParsingError(format!(
            "expected {} bytes, got {}",
            N,
            decoded.len()
        ))
    })
}

pub(crate) fn take_array<'a, const N: usize, E: ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], [u8; N], E> {
    if input.len() < N {
        return Err(nom::Err::Error(ParseError::from_error_kind(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&input[..N]);
    Ok((&input[N..], bytes))
}

/// `KeyPair` is used for signature and decryption
#[derive(Clone)]
pub struct KeyPair(ed25519_dalek::SigningKey);

impl std::fmt::Display for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "KeyPair({})", self.get_public_key())
    }
}

impl FromStr for KeyPair {
    type Err = BitxorSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPair::from_bs58_check(s)
    }
}

impl KeyPair {
    /// Generate a new `KeyPair`
    ///
    /// # Example
    /// ```
    /// # use bitxor_signature::KeyPair;
    /// # use bitxor_hash::Hash;
    /// let keypair = KeyPair::generate();
    /// let data = Hash::compute_from("Hello World!".as_bytes());
    /// let signature = keypair.sign(&data);
    /// assert!(keypair.get_public_key().verify_signature(&data, &signature).is_ok());
    /// ```
    pub fn generate() -> KeyPair {
        let mut rng = rand::rngs::OsRng;
        KeyPair(ed25519_dalek::SigningKey::generate(&mut rng))
    }

    /// Returns the Signature produced by signing data bytes with a `KeyPair`.
    pub fn sign(&self, hash: &Hash) -> Signature {
        Signature(self.0.sign(hash.to_bytes()))
    }

    /// Signs arbitrary bytes, used by the generation hash proof
    pub(crate) fn sign_bytes(&self, data: &[u8]) -> ed25519_dalek::Signature {
        self.0.sign(data)
    }

    /// Return the bytes representing the secret part of the keypair
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Create a keypair from its secret bytes
    pub fn from_bytes(data: &[u8; SECRET_KEY_SIZE_BYTES]) -> Self {
        KeyPair(ed25519_dalek::SigningKey::from_bytes(data))
    }

    /// Get the public key of the keypair
    pub fn get_public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Encode the secret key using `bs58` with checksum
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Decode a secret key encoded with `bs58` and a checksum
    pub fn from_bs58_check(data: &str) -> Result<Self, BitxorSignatureError> {
        Ok(KeyPair::from_bytes(&decode_bs58::<SECRET_KEY_SIZE_BYTES>(
            data,
        )?))
    }
}

/// Public key used to check if a message was encoded
/// by the corresponding `KeyPair`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for PublicKey {
    type Err = BitxorSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_bs58_check(s)
    }
}

impl PublicKey {
    /// Checks if the `Signature` associated with data bytes
    /// was produced with the `KeyPair` associated to given `PublicKey`
    pub fn verify_signature(
        &self,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<(), BitxorSignatureError> {
        self.0
            .verify(hash.to_bytes(), &signature.0)
            .map_err(|err| BitxorSignatureError::SignatureError(err.to_string()))
    }

    pub(crate) fn verify_bytes(
        &self,
        data: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), BitxorSignatureError> {
        self.0
            .verify_strict(data, signature)
            .map_err(|err| BitxorSignatureError::SignatureError(err.to_string()))
    }

    /// Serialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a `PublicKey` as bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<PublicKey, BitxorSignatureError> {
        PublicKey::from_bytes(&decode_bs58::<PUBLIC_KEY_SIZE_BYTES>(data)?)
    }

    /// Deserialize a `PublicKey` from bytes, rejecting points off the curve.
    pub fn from_bytes(
        data: &[u8; PUBLIC_KEY_SIZE_BYTES],
    ) -> Result<PublicKey, BitxorSignatureError> {
        Ok(PublicKey(ed25519_dalek::VerifyingKey::from_bytes(data)?))
    }
}

impl ::serde::Serialize for PublicKey {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&self.to_bs58_check())
    }
}

impl<'de> ::serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        let encoded = String::deserialize(d)?;
        PublicKey::from_bs58_check(&encoded).map_err(::serde::de::Error::custom)
    }
}

/// Serializer for `PublicKey`
#[derive(Default, Clone, Debug)]
pub struct PublicKeySerializer;

impl PublicKeySerializer {
    /// Creates a `PublicKeySerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<PublicKey> for PublicKeySerializer {
    fn serialize(&self, value: &PublicKey, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `PublicKey`
#[derive(Default, Clone, Debug)]
pub struct PublicKeyDeserializer;

impl PublicKeyDeserializer {
    /// Creates a `PublicKeyDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<PublicKey> for PublicKeyDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], PublicKey, E> {
        context("Failed public key deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take_array::<PUBLIC_KEY_SIZE_BYTES, E>(input)?;
            let key = PublicKey::from_bytes(&bytes).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Verify,
                ))
            })?;
            Ok((rest, key))
        })(buffer)
    }
}

/// Signature generated from a message and a `KeyPair`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl Signature {
    /// Serialize a `Signature` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a Signature as bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a Signature from bytes.
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Signature {
        Signature(ed25519_dalek::Signature::from_bytes(data))
    }

    /// A signature made of zeros, used while an entity is being built
    pub fn zero() -> Signature {
        Signature::from_bytes(&[0u8; SIGNATURE_SIZE_BYTES])
    }
}

/// Serializer for `Signature`
#[derive(Default, Clone, Debug)]
pub struct SignatureSerializer;

impl SignatureSerializer {
    /// Creates a `SignatureSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Signature> for SignatureSerializer {
    fn serialize(&self, value: &Signature, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Signature`
#[derive(Default, Clone, Debug)]
pub struct SignatureDeserializer;

impl SignatureDeserializer {
    /// Creates a `SignatureDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Signature> for SignatureDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Signature, E> {
        context("Failed signature deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take_array::<SIGNATURE_SIZE_BYTES, E>(input)?;
            Ok((rest, Signature::from_bytes(&bytes)))
        })(buffer)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example() {
        let keypair = KeyPair::generate();
        let message = "Hello World!".as_bytes();
        let hash = Hash::compute_from(message);
        let signature = keypair.sign(&hash);
        assert!(keypair
            .get_public_key()
            .verify_signature(&hash, &signature)
            .is_ok())
    }

    #[test]
    fn tampered_data_does_not_verify() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(&Hash::compute_from(b"one"));
        assert!(keypair
            .get_public_key()
            .verify_signature(&Hash::compute_from(b"two"), &signature)
            .is_err());
    }

    #[test]
    fn keypair_bs58_round_trip_keeps_public_key() {
        let keypair = KeyPair::generate();
        let decoded = KeyPair::from_str(&keypair.to_string()).unwrap();
        assert_eq!(decoded.get_public_key(), keypair.get_public_key());
    }

    #[test]
    fn public_key_serde_json() {
        let public_key = KeyPair::generate().get_public_key();
        let serialized = serde_json::to_string(&public_key).unwrap();
        let deserialized: PublicKey = serde_json::from_str(&serialized).unwrap();
        assert_eq!(public_key, deserialized);
    }
}
