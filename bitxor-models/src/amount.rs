// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount of token atomic units. Operations never overflow silently.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Create a zero Amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Obtains the underlying raw `u64` representation
    pub const fn to_raw(&self) -> u64 {
        self.0
    }

    /// Constructs an `Amount` from atomic units
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// safely add self to another amount, returning None on overflow
    pub fn checked_add(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.0).map(Amount)
    }

    /// safely subtract another amount from self, returning None on underflow
    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        self.0.checked_sub(amount.0).map(Amount)
    }

    /// safely add self to another amount, saturating the result on overflow
    #[must_use]
    pub fn saturating_add(self, amount: Amount) -> Self {
        Amount(self.0.saturating_add(amount.0))
    }

    /// safely multiply by a fee multiplier, returning None on overflow
    pub fn checked_mul_u64(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Importance of an account, derived from its harvesting token balance
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Importance(pub u64);

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns true if `value` equals `base * multiplier^k` for some `k >= 0`.
///
/// ```
/// # use bitxor_models::amount::is_power_multiple;
/// assert!(is_power_multiple(1234, 1234 * 10_000, 10));
/// assert!(!is_power_multiple(1234, 1233, 10));
/// ```
pub fn is_power_multiple(base: u64, value: u64, multiplier: u64) -> bool {
    if base == 0 || multiplier < 2 {
        return value == base;
    }
    let mut current = value;
    while current > base && current % multiplier == 0 {
        current /= multiplier;
    }
    current == base
}

/// Cumulative chain weight. It can be added to and is only decreased explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Default, Hash)]
pub struct ChainScore(u128);

impl ChainScore {
    /// Creates a score from its raw value
    pub const fn new(value: u128) -> Self {
        ChainScore(value)
    }

    /// Creates a score from two 64 bit halves (high, low)
    pub const fn from_parts(high: u64, low: u64) -> Self {
        ChainScore(((high as u128) << 64) | low as u128)
    }

    /// Returns the (high, low) 64 bit halves
    pub const fn to_parts(self) -> (u64, u64) {
        ((self.0 >> 64) as u64, self.0 as u64)
    }

    /// Raw value
    pub const fn value(self) -> u128 {
        self.0
    }

    /// Adds another score, saturating on overflow
    #[must_use]
    pub fn add(self, other: ChainScore) -> Self {
        ChainScore(self.0.saturating_add(other.0))
    }

    /// Subtracts another score, saturating at zero
    #[must_use]
    pub fn sub(self, other: ChainScore) -> Self {
        ChainScore(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for ChainScore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
