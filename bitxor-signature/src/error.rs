// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use displaydoc::Display;
use thiserror::Error;

/// signature error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum BitxorSignatureError {
    /// parsing error : {0}
    ParsingError(String),

    /// ed25519 engine error: {0}
    EngineError(#[from] ed25519_dalek::SignatureError),

    /// signature verification failed: {0}
    SignatureError(String),
}
