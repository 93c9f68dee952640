//! Opaque identifiers for sessions and shares.
//!
//! Both are 128-bit random values rendered as 32 lowercase hex characters on
//! the wire. They carry no structure; equality and map keys are their only
//! uses server-side.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an id from its textual form fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id: expected 32 hex characters")]
pub struct ParseIdError;

fn random_id_bytes() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn parse_id_bytes(s: &str) -> Result<[u8; 16], ParseIdError> {
    if s.len() != 32 {
        return Err(ParseIdError);
    }
    let mut bytes = [0u8; 16];
    hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseIdError)?;
    Ok(bytes)
}

/// Identifies one mining session for the whole of its life, including
/// across reconnects and recovery from a signed token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; 16]);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn random() -> Self {
        Self(random_id_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id_bytes(s).map(Self)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifies one share submission while its verification is pending.
/// Never persisted; dies with the verification outcome.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShareId([u8; 16]);

impl ShareId {
    /// Generate a fresh random share id.
    pub fn random() -> Self {
        Self(random_id_bytes())
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareId({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl FromStr for ShareId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id_bytes(s).map(Self)
    }
}

impl Serialize for ShareId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ShareId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
