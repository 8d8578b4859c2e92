// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::settings::HASH512_SIZE_BYTES;

/// 512-bit hash produced by the blake3 extendable output, used for generation hashes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash512(pub [u8; HASH512_SIZE_BYTES]);

impl Hash512 {
    /// The all-zero value, returned when a generation hash proof does not verify
    pub const fn zero() -> Self {
        Hash512([0u8; HASH512_SIZE_BYTES])
    }

    /// Whether every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Compute from raw data
    pub fn compute_from(data: &[u8]) -> Hash512 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        let mut hash = [0u8; HASH512_SIZE_BYTES];
        let mut output_reader = hasher.finalize_xof();
        output_reader.fill(&mut hash);
        Hash512(hash)
    }

    /// Transform into bytes
    pub fn to_bytes(&self) -> &[u8; HASH512_SIZE_BYTES] {
        &self.0
    }

    /// Serialize using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }
}

impl std::fmt::Display for Hash512 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Hash512 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}
