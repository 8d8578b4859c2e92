// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Interface of the durable key-value store that backs cache contents when
//! `enable_cache_database_storage` is set.

mod constants;
mod controller;
mod error;
mod settings;

pub use constants::*;
pub use controller::*;
pub use error::*;
pub use settings::*;
