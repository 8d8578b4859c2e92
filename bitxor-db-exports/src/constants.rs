// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

pub const METADATA_CF: &str = "metadata";
pub const HEIGHT_KEY: &[u8; 1] = b"h";

// Errors
pub const CF_ERROR: &str = "critical: rocksdb column family operation failed";
