// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>
//! All the structures that are used everywhere
//!
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

pub use error::*;

/// account address
pub mod address;
/// amounts, importances and chain score
pub mod amount;
/// blocks and block elements
pub mod block;
/// node configuration structures
pub mod config;
/// entity types
pub mod entity;
mod error;
/// chain height
pub mod height;
/// network identifiers
pub mod network;
/// typed receipts and block statements
pub mod receipt;
/// timestamps
pub mod timestamp;
/// token and namespace identifiers
pub mod token;
/// transactions
pub mod transaction;
