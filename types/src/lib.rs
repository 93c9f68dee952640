//! Fundamental types for the spigot faucet.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: session and share identifiers, payout addresses, reward
//! amounts, timestamps, and the nonce alias used by the mining protocol.

pub mod address;
pub mod amount;
pub mod id;
pub mod time;

pub use address::{AddressError, TargetAddress};
pub use amount::FaucetAmount;
pub use id::{SessionId, ShareId};
pub use time::Timestamp;

/// A mining nonce. Clients iterate nonces against their session preimage;
/// the server only ever compares and stores them.
pub type Nonce = u64;
