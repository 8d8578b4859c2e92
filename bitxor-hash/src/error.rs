// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use displaydoc::Display;
use thiserror::Error;

/// hash error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum BitxorHashError {
    /// parsing error : {0}
    ParsingError(String),
}
