//! Claim executor seam.
//!
//! The blockchain transaction layer is a black box to the faucet core: it
//! accepts `(targetAddress, amount)` and eventually reports a transaction
//! hash and block. The [`DevClaimExecutor`] fabricates both, which is all a
//! development or test deployment needs.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use sha2::{Digest, Sha256};

use spigot_types::{FaucetAmount, TargetAddress};

use crate::NodeError;

/// The confirmed result of a payout transaction.
#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub tx_hash: String,
    pub tx_block: u64,
}

/// Submits payouts to the transaction layer.
pub trait ClaimExecutor: Send + Sync {
    fn submit(
        &self,
        target_addr: TargetAddress,
        amount: FaucetAmount,
    ) -> BoxFuture<'static, Result<ClaimReceipt, NodeError>>;
}

/// Executor that confirms every claim immediately with a fabricated hash.
pub struct DevClaimExecutor {
    next_block: AtomicU64,
}

impl DevClaimExecutor {
    pub fn new() -> Self {
        Self {
            next_block: AtomicU64::new(1),
        }
    }
}

impl Default for DevClaimExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimExecutor for DevClaimExecutor {
    fn submit(
        &self,
        target_addr: TargetAddress,
        amount: FaucetAmount,
    ) -> BoxFuture<'static, Result<ClaimReceipt, NodeError>> {
        let block = self.next_block.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(target_addr.as_str().as_bytes());
        hasher.update(amount.raw().to_be_bytes());
        hasher.update(block.to_be_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));

        Box::pin(async move {
            Ok(ClaimReceipt {
                tx_hash,
                tx_block: block,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_executor_fabricates_distinct_receipts() {
        let executor = DevClaimExecutor::new();
        let addr: TargetAddress = format!("0x{:040x}", 9u8).parse().unwrap();

        let a = executor
            .submit(addr.clone(), FaucetAmount::new(100))
            .await
            .unwrap();
        let b = executor
            .submit(addr, FaucetAmount::new(100))
            .await
            .unwrap();

        assert!(a.tx_hash.starts_with("0x"));
        assert_ne!(a.tx_hash, b.tx_hash);
        assert_eq!(b.tx_block, a.tx_block + 1);
    }
}
