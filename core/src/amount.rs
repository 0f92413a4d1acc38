//! Fixed-precision ledger amount.
//!
//! The spec requires 8 fractional digits and a stable canonical
//! serialization for `txid` derivation. A scaled `u64` (units of `10^-8`)
//! gives exact arithmetic and a serialization that never depends on
//! locale or float formatting, unlike a `f64` amount would.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Number of fractional digits carried by every [`Amount`].
pub const DECIMALS: u32 = 8;
const SCALE: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount directly from its scaled integer representation.
    pub fn from_units(units: u64) -> Self {
        Amount(units)
    }

    pub fn units(self) -> u64 {
        self.0
    }

    /// Builds an amount from a whole-coin count, e.g. `Amount::from_coins(50)`.
    pub fn from_coins(coins: u64) -> Self {
        Amount(coins.saturating_mul(SCALE))
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(Error::InvalidAmount)
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(Error::InsufficientBalance)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / SCALE, self.0 % SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_eight_fractional_digits() {
        assert_eq!(Amount::from_coins(50).to_string(), "50.00000000");
        assert_eq!(Amount::from_units(100_000_001).to_string(), "1.00000001");
    }

    #[test]
    fn checked_sub_rejects_overdraft() {
        let a = Amount::from_coins(1);
        let b = Amount::from_coins(2);
        assert!(matches!(a.checked_sub(b), Err(Error::InsufficientBalance)));
    }
}
