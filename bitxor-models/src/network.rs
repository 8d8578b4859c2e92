// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ModelsError;
use bitxor_hash::Hash;
use bitxor_signature::PublicKey;
use serde::Deserialize;
use std::str::FromStr;

/// Identifier of a network, embedded in every entity and address
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
#[repr(u8)]
pub enum NetworkIdentifier {
    /// main network
    Mainnet = 0x68,
    /// public test network
    Testnet = 0x98,
    /// private network
    Private = 0x78,
    /// private test network
    PrivateTest = 0xA8,
}

impl NetworkIdentifier {
    /// Raw identifier byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for NetworkIdentifier {
    type Error = ModelsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x68 => Ok(NetworkIdentifier::Mainnet),
            0x98 => Ok(NetworkIdentifier::Testnet),
            0x78 => Ok(NetworkIdentifier::Private),
            0xA8 => Ok(NetworkIdentifier::PrivateTest),
            other => Err(ModelsError::UnknownNetwork(format!("0x{:02X}", other))),
        }
    }
}

impl FromStr for NetworkIdentifier {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkIdentifier::Mainnet),
            "testnet" => Ok(NetworkIdentifier::Testnet),
            "private" => Ok(NetworkIdentifier::Private),
            "private-test" => Ok(NetworkIdentifier::PrivateTest),
            other => Err(ModelsError::UnknownNetwork(other.to_string())),
        }
    }
}

impl TryFrom<String> for NetworkIdentifier {
    type Error = ModelsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NetworkIdentifier::from_str(&value)
    }
}

impl std::fmt::Display for NetworkIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NetworkIdentifier::Mainnet => "mainnet",
            NetworkIdentifier::Testnet => "testnet",
            NetworkIdentifier::Private => "private",
            NetworkIdentifier::PrivateTest => "private-test",
        };
        write!(f, "{}", name)
    }
}

/// Network fingerprint: every genesis block must match it
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NetworkInfo {
    /// network identifier
    pub identifier: NetworkIdentifier,
    /// public key of the genesis block signer
    pub genesis_signer_public_key: PublicKey,
    /// seed of the generation hash chain
    pub generation_hash_seed: Hash,
    /// network epoch, in milliseconds since the unix epoch
    #[serde(default)]
    pub epoch_adjustment_ms: u64,
}
