//! Unix timestamps (seconds, UTC).
//!
//! Session lifetimes, cooldowns, and store retention windows are all
//! measured in whole seconds against the system clock. Timeout checks take
//! an explicit `now` so they stay deterministic under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// The current system time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds from this timestamp until `now`; zero if this timestamp is
    /// in the future.
    pub fn age_secs(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether more than `window_secs` have passed between this timestamp
    /// and `now`.
    pub fn is_older_than(&self, window_secs: u64, now: Timestamp) -> bool {
        self.age_secs(now) > window_secs
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_is_saturating() {
        let future = Timestamp::new(100);
        assert_eq!(future.age_secs(Timestamp::new(50)), 0);
    }

    #[test]
    fn is_older_than_boundary() {
        let t = Timestamp::new(100);
        assert!(!t.is_older_than(10, Timestamp::new(110)));
        assert!(t.is_older_than(10, Timestamp::new(111)));
    }
}
