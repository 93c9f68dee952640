//! Fixed-size validation worker pool.
//!
//! Each worker is a dedicated OS thread with its own inbound channel;
//! requests are dispatched round-robin (the work is embarrassingly parallel
//! and roughly uniform per share). Replies travel over oneshot channels so
//! the coordinator can await a verdict without ever blocking on hashing.
//! Queue depth is observable so the coordinator can shed load instead of
//! queueing behind a saturated pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use spigot_types::{Nonce, ShareId};

use crate::{DifficultyMask, PowHasher, WorkError};

struct Job {
    share_id: ShareId,
    nonces: Vec<Nonce>,
    preimage: Vec<u8>,
    reply: oneshot::Sender<bool>,
}

/// A pool of validation workers sharing one hasher and difficulty mask.
pub struct ValidatorPool {
    senders: Vec<mpsc::UnboundedSender<Job>>,
    next: AtomicUsize,
    pending: Arc<AtomicUsize>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ValidatorPool {
    /// Spawn `threads` workers (at least one).
    pub fn spawn(hasher: Arc<dyn PowHasher>, mask: DifficultyMask, threads: usize) -> Self {
        let threads = threads.max(1);
        let pending = Arc::new(AtomicUsize::new(0));
        let mut senders = Vec::with_capacity(threads);
        let mut workers = Vec::with_capacity(threads);

        for worker_id in 0..threads {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            let hasher = hasher.clone();
            let mask = mask.clone();
            let pending = pending.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("pow-validator-{worker_id}"))
                    .spawn(move || run_worker(worker_id, rx, hasher, mask, pending))
                    .expect("failed to spawn validator worker"),
            );
        }

        Self {
            senders,
            next: AtomicUsize::new(0),
            pending,
            workers,
        }
    }

    /// Submit a share for validation. The returned receiver yields the
    /// verdict; it resolves with an error only if the pool is shut down
    /// mid-flight.
    pub fn submit(
        &self,
        share_id: ShareId,
        nonces: Vec<Nonce>,
        preimage: Vec<u8>,
    ) -> Result<oneshot::Receiver<bool>, WorkError> {
        let (reply, rx) = oneshot::channel();
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.senders[slot]
            .send(Job {
                share_id,
                nonces,
                preimage,
                reply,
            })
            .map_err(|_| {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                WorkError::PoolClosed
            })?;
        Ok(rx)
    }

    /// Number of requests submitted but not yet answered.
    pub fn queue_len(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Stop accepting work and wait for the workers to drain.
    pub fn shutdown(mut self) {
        self.senders.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    worker_id: usize,
    mut rx: mpsc::UnboundedReceiver<Job>,
    hasher: Arc<dyn PowHasher>,
    mask: DifficultyMask,
    pending: Arc<AtomicUsize>,
) {
    debug!(worker_id, "validator worker started");
    while let Some(job) = rx.blocking_recv() {
        let is_valid = check_share(hasher.as_ref(), &mask, &job.nonces, &job.preimage);
        pending.fetch_sub(1, Ordering::Relaxed);
        trace!(share_id = %job.share_id, is_valid, worker_id, "share validated");
        // the requester may have resolved by other means already
        let _ = job.reply.send(is_valid);
    }
    debug!(worker_id, "validator worker stopped");
}

/// A share is valid iff it is non-empty and every nonce's digest satisfies
/// the mask.
fn check_share(
    hasher: &dyn PowHasher,
    mask: &DifficultyMask,
    nonces: &[Nonce],
    preimage: &[u8],
) -> bool {
    if nonces.is_empty() {
        return false;
    }
    nonces
        .iter()
        .all(|&nonce| mask.matches(&hasher.hash(nonce, preimage)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Blake2bHasher;

    // low difficulty so test mining terminates quickly
    fn test_mask() -> DifficultyMask {
        DifficultyMask::new(4).unwrap()
    }

    fn mine_one(preimage: &[u8], start: Nonce) -> Nonce {
        let hasher = Blake2bHasher;
        let mask = test_mask();
        (start..start + 100_000)
            .find(|&n| mask.matches(&hasher.hash(n, preimage)))
            .expect("difficulty 4 should be minable within 100k nonces")
    }

    #[test]
    fn check_share_accepts_mined_nonces() {
        let preimage = b"test-preimage-01";
        let n1 = mine_one(preimage, 1);
        let n2 = mine_one(preimage, n1 + 1);
        assert!(check_share(
            &Blake2bHasher,
            &test_mask(),
            &[n1, n2],
            preimage
        ));
    }

    #[test]
    fn check_share_rejects_empty_batch() {
        assert!(!check_share(&Blake2bHasher, &test_mask(), &[], b"x"));
    }

    #[test]
    fn check_share_rejects_one_bad_nonce() {
        let preimage = b"test-preimage-02";
        let good = mine_one(preimage, 1);
        let hasher = Blake2bHasher;
        let mask = test_mask();
        let bad = (good + 1..)
            .find(|&n| !mask.matches(&hasher.hash(n, preimage)))
            .unwrap();
        assert!(!check_share(&hasher, &mask, &[good, bad], preimage));
    }

    #[tokio::test]
    async fn pool_round_trip() {
        let pool = ValidatorPool::spawn(Arc::new(Blake2bHasher), test_mask(), 2);
        let preimage = b"test-preimage-03";
        let nonce = mine_one(preimage, 1);

        let rx = pool
            .submit(ShareId::random(), vec![nonce], preimage.to_vec())
            .unwrap();
        assert!(rx.await.unwrap());

        let rx = pool
            .submit(ShareId::random(), vec![], preimage.to_vec())
            .unwrap();
        assert!(!rx.await.unwrap());
    }

    struct PanickingHasher;

    impl PowHasher for PanickingHasher {
        fn hash(&self, _nonce: u64, _preimage: &[u8]) -> Vec<u8> {
            panic!("worker down");
        }

        fn params_string(&self) -> String {
            "panic".to_string()
        }
    }

    #[tokio::test]
    async fn dead_worker_surfaces_as_pool_closed() {
        let pool = ValidatorPool::spawn(Arc::new(PanickingHasher), test_mask(), 1);

        // the first job kills the worker; its reply channel is dropped
        let rx = pool
            .submit(ShareId::random(), vec![1], b"x".to_vec())
            .unwrap();
        assert!(rx.await.is_err());

        // once the worker is gone, submission reports the closed pool
        let err = loop {
            match pool.submit(ShareId::random(), vec![1], b"x".to_vec()) {
                Err(e) => break e,
                Ok(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        };
        assert!(matches!(err, WorkError::PoolClosed));
    }

    #[tokio::test]
    async fn queue_drains_to_zero() {
        let pool = ValidatorPool::spawn(Arc::new(Blake2bHasher), test_mask(), 1);
        let preimage = b"test-preimage-04";
        let nonce = mine_one(preimage, 1);

        let mut receivers = Vec::new();
        for _ in 0..8 {
            receivers.push(
                pool.submit(ShareId::random(), vec![nonce], preimage.to_vec())
                    .unwrap(),
            );
        }
        for rx in receivers {
            assert!(rx.await.unwrap());
        }
        assert_eq!(pool.queue_len(), 0);
    }
}
