// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

/// Hash size
pub const HASH_SIZE_BYTES: usize = 32;

/// Generation hash size
pub const HASH512_SIZE_BYTES: usize = 64;
