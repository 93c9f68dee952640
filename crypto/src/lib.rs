//! Tamper-evident session tokens.
//!
//! A signed token is the only thing a client needs to resume mining after a
//! disconnect or a full server restart: the server keeps no copy of live
//! session state between processes. The same codec signs the one-time claim
//! token handed out when a claimable session closes.

pub mod token;

pub use token::{SessionSnapshot, TokenCodec, TokenError};
