// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

mod cache_db;

pub use cache_db::*;
