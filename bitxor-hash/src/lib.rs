// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

#![warn(missing_docs)]
//! Hash primitives: 256-bit entity hashes, 512-bit generation hashes and Merkle roots.

pub use error::BitxorHashError;
pub use hash::{Hash, HashDeserializer, HashSerializer};
pub use hash512::Hash512;
pub use merkle::MerkleHashBuilder;
pub use settings::{HASH512_SIZE_BYTES, HASH_SIZE_BYTES};

mod error;
mod hash;
mod hash512;
mod merkle;
mod settings;
