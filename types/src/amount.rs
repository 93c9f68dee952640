//! Reward amount type.
//!
//! Balances are fixed-point integers (u128) denominated in the smallest
//! asset unit, to avoid floating-point errors. A session balance only ever
//! moves through the checked/saturating operations here; raw arithmetic on
//! the inner value is deliberately not exposed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// An accumulated (or configured) reward amount in the smallest asset unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaucetAmount(u128);

impl FaucetAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Add, clamping at the numeric ceiling. Balances never get anywhere
    /// near u128::MAX in practice; the clamp exists so a hostile reward
    /// configuration cannot panic the coordinator.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtract, clamping at zero. This is the balance-penalty primitive:
    /// a penalty larger than the balance takes everything but never
    /// underflows.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Return the smaller of the two amounts.
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Scale this amount by a whole-number percentage (e.g. reward factors
    /// from gating modules). 100 is identity.
    pub fn scale_percent(self, percent: u32) -> Self {
        Self(self.0 / 100 * percent as u128 + self.0 % 100 * percent as u128 / 100)
    }
}

impl Add for FaucetAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Display for FaucetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn penalty_clamps_at_zero() {
        let balance = FaucetAmount::new(50);
        let after = balance.saturating_sub(FaucetAmount::new(200));
        assert_eq!(after, FaucetAmount::ZERO);
    }

    #[test]
    fn penalty_below_balance_subtracts() {
        let balance = FaucetAmount::new(200);
        assert_eq!(
            balance.saturating_sub(FaucetAmount::new(50)),
            FaucetAmount::new(150)
        );
    }

    #[test]
    fn scale_percent_identity() {
        let amount = FaucetAmount::new(1_000_000_000);
        assert_eq!(amount.scale_percent(100), amount);
    }

    #[test]
    fn scale_percent_halves() {
        assert_eq!(
            FaucetAmount::new(1000).scale_percent(50),
            FaucetAmount::new(500)
        );
    }

    #[test]
    fn scale_percent_zero() {
        assert_eq!(
            FaucetAmount::new(12345).scale_percent(0),
            FaucetAmount::ZERO
        );
    }

    #[test]
    fn scale_percent_handles_remainders() {
        // 150 * 33% = 49.5 -> truncates to 49
        assert_eq!(
            FaucetAmount::new(150).scale_percent(33),
            FaucetAmount::new(49)
        );
    }
}
