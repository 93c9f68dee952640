//! Proof-of-work share validation.
//!
//! Not mining — re-checking work that miners claim to have done. A share is
//! a batch of nonces; it is valid iff every nonce, hashed against the
//! session preimage, produces a digest whose leading bits fall under the
//! configured difficulty mask. Hashing is CPU-heavy, so validation runs on
//! a fixed pool of dedicated worker threads and never on the event core.

pub mod difficulty;
pub mod error;
pub mod hasher;
pub mod pool;

pub use difficulty::DifficultyMask;
pub use error::WorkError;
pub use hasher::{Argon2Hasher, Blake2bHasher, PowHasher};
pub use pool::ValidatorPool;
