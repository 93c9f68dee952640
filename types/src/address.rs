//! Payout address type.
//!
//! The faucet pays out to Ethereum-style addresses: `0x` followed by 40 hex
//! characters. Addresses are normalised to lowercase on construction so that
//! cooldown marks and session lookups are case-insensitive.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid payout address: {0}")]
    Malformed(String),

    #[error("the zero address cannot receive rewards")]
    ZeroAddress,
}

/// A validated, lowercase payout address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress(String);

impl TargetAddress {
    /// Parse and validate a payout address.
    ///
    /// Accepts mixed case input; the stored form is always lowercase.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let lower = raw.to_ascii_lowercase();
        let hex_part = lower
            .strip_prefix("0x")
            .ok_or_else(|| AddressError::Malformed(raw.to_string()))?;
        if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::Malformed(raw.to_string()));
        }
        if hex_part.bytes().all(|b| b == b'0') {
            return Err(AddressError::ZeroAddress);
        }
        Ok(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetAddress({})", self.0)
    }
}

impl FromStr for TargetAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TargetAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TargetAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_address() {
        let addr = TargetAddress::parse("0x5A0b54D5dc17e0AadC383d2db43B0a0D3E029c4c").unwrap();
        assert_eq!(addr.as_str(), "0x5a0b54d5dc17e0aadc383d2db43b0a0d3e029c4c");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(
            TargetAddress::parse("5a0b54d5dc17e0aadc383d2db43b0a0d3e029c4c"),
            Err(AddressError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(TargetAddress::parse("0x1234").is_err());
    }

    #[test]
    fn rejects_zero_address() {
        let zero = format!("0x{}", "0".repeat(40));
        assert!(matches!(
            TargetAddress::parse(&zero),
            Err(AddressError::ZeroAddress)
        ));
    }

    #[test]
    fn casefold_is_stable() {
        let a = TargetAddress::parse("0xABCDEFabcdefABCDEFabcdefABCDEFabcdefABCD").unwrap();
        let b = TargetAddress::parse("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        assert_eq!(a, b);
    }
}
