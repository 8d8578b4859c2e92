// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

#![warn(missing_docs)]
//! ed25519 signing keys and the verifiable generation hash proof used by block producers.

mod error;
mod signature_impl;
mod vrf;

pub use error::BitxorSignatureError;
pub use signature_impl::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer, PUBLIC_KEY_SIZE_BYTES, SECRET_KEY_SIZE_BYTES,
    SIGNATURE_SIZE_BYTES,
};
pub use vrf::{
    generate_vrf_proof, verify_vrf_proof, VrfProof, VrfProofDeserializer, VrfProofSerializer,
    VRF_PROOF_SIZE_BYTES,
};
