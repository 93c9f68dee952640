//! Pluggable PoW hash functions.
//!
//! The protocol treats the hash primitive as a black box: `(nonce,
//! preimage) -> digest`. Two backends ship here — Blake2b for development
//! and tests (fast, no parameters) and Argon2id for production (memory
//! hard). The digest feeds [`crate::DifficultyMask::matches`].

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::WorkError;

type Blake2b256 = Blake2b<U32>;

/// A proof-of-work hash function.
///
/// Implementations must be cheap to share across the validator pool's
/// worker threads.
pub trait PowHasher: Send + Sync + 'static {
    /// Hash one nonce against a session preimage.
    fn hash(&self, nonce: u64, preimage: &[u8]) -> Vec<u8>;

    /// Stable textual rendering of the algorithm and its parameters.
    /// Clients echo this back with every share so parameter drift between
    /// server restarts is caught before any hashing happens.
    fn params_string(&self) -> String;
}

/// Blake2b-256 over `preimage || nonce_be`. Fast; used for development
/// setups and throughout the test suite.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake2bHasher;

impl PowHasher for Blake2bHasher {
    fn hash(&self, nonce: u64, preimage: &[u8]) -> Vec<u8> {
        let mut hasher = Blake2b256::new();
        hasher.update(preimage);
        hasher.update(nonce.to_be_bytes());
        hasher.finalize().to_vec()
    }

    fn params_string(&self) -> String {
        "blake2b".to_string()
    }
}

/// Argon2id with the preimage as salt and the big-endian nonce as password.
pub struct Argon2Hasher {
    argon2: argon2::Argon2<'static>,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    output_len: usize,
}

impl Argon2Hasher {
    pub fn new(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
        output_len: usize,
    ) -> Result<Self, WorkError> {
        let params = argon2::Params::new(memory_kib, iterations, parallelism, Some(output_len))
            .map_err(|e| WorkError::HasherParams(e.to_string()))?;
        Ok(Self {
            argon2: argon2::Argon2::new(
                argon2::Algorithm::Argon2id,
                argon2::Version::V0x13,
                params,
            ),
            memory_kib,
            iterations,
            parallelism,
            output_len,
        })
    }
}

impl PowHasher for Argon2Hasher {
    fn hash(&self, nonce: u64, preimage: &[u8]) -> Vec<u8> {
        let mut digest = vec![0u8; self.output_len];
        if let Err(e) = self
            .argon2
            .hash_password_into(&nonce.to_be_bytes(), preimage, &mut digest)
        {
            // only reachable with a degenerate preimage (salt too short);
            // an all-ones digest can never satisfy a difficulty mask
            tracing::error!(error = %e, "argon2 hashing failed");
            digest.fill(0xff);
        }
        digest
    }

    fn params_string(&self) -> String {
        format!(
            "argon2id|{}|{}|{}|{}",
            self.memory_kib, self.iterations, self.parallelism, self.output_len
        )
    }
}
