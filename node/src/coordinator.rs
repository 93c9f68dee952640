//! Share-verification planning and pending-share state.
//!
//! Every accepted share gets a verification plan: check it locally on the
//! validator pool, dispatch it to a random set of peer miners, or accept
//! it outright. The pending-share record collects whatever signals arrive
//! (local verdict, peer verdicts, timeout) until resolution, which the
//! service layer runs exactly once per share.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rand::seq::IndexedRandom;
use rand::Rng;

use spigot_types::{Nonce, SessionId, ShareId};

use crate::config::VerifyConfig;

/// How a share will be verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyPlan {
    /// Recompute the hashes on the validator pool.
    Local,
    /// Ask a random set of peer miners to recompute.
    Peer,
    /// Accept without cryptographic verification.
    None,
}

/// One share awaiting verification.
#[derive(Debug)]
pub struct PendingShare {
    pub share_id: ShareId,
    pub session: SessionId,
    pub nonces: Vec<Nonce>,
    pub preimage: Vec<u8>,
    pub plan: VerifyPlan,
    /// Peers asked to verify that have not answered yet.
    pub outstanding: HashSet<SessionId>,
    /// Verdicts received from peers.
    pub verdicts: HashMap<SessionId, bool>,
    /// Validator pool verdict, once available. Overrides every peer signal.
    pub local_verdict: Option<bool>,
    /// Set when any signal claims the share is invalid.
    pub flagged_invalid: bool,
    /// Guards against dispatching the forced local re-check twice.
    pub recheck_dispatched: bool,
    pub submitted: Instant,
}

impl PendingShare {
    pub fn new(
        session: SessionId,
        nonces: Vec<Nonce>,
        preimage: Vec<u8>,
        plan: VerifyPlan,
    ) -> Self {
        Self {
            share_id: ShareId::random(),
            session,
            nonces,
            preimage,
            plan,
            outstanding: HashSet::new(),
            verdicts: HashMap::new(),
            local_verdict: None,
            flagged_invalid: false,
            recheck_dispatched: false,
            submitted: Instant::now(),
        }
    }

    /// Record a peer verdict. Returns `false` (and ignores the verdict)
    /// when the peer was not an outstanding verifier for this share.
    pub fn record_peer_verdict(&mut self, peer: SessionId, is_valid: bool) -> bool {
        if !self.outstanding.remove(&peer) {
            return false;
        }
        self.verdicts.insert(peer, is_valid);
        if !is_valid {
            self.flagged_invalid = true;
        }
        true
    }

    /// Record the validator pool's verdict.
    pub fn record_local_verdict(&mut self, is_valid: bool) {
        self.local_verdict = Some(is_valid);
        if !is_valid {
            self.flagged_invalid = true;
        }
    }

    /// Whether resolution must wait for a forced local re-check: some
    /// signal flagged the share invalid, but the pool has not looked at it
    /// yet. Invalid shares are never slashed on peer opinion alone.
    pub fn needs_local_recheck(&self) -> bool {
        self.flagged_invalid && self.local_verdict.is_none()
    }

    /// The final verdict. The local verdict wins when present; otherwise
    /// any invalid flag sinks the share and silence means valid.
    pub fn final_verdict(&self) -> bool {
        match self.local_verdict {
            Some(v) => v,
            None => !self.flagged_invalid,
        }
    }
}

/// Pick a verification plan for a fresh share.
///
/// The local probability is raised while few peers are eligible; a local
/// plan is skipped when the validator queue is at its ceiling. When
/// neither path is taken the share is accepted unverified, a documented
/// trust/throughput tradeoff.
pub fn choose_plan(
    cfg: &VerifyConfig,
    eligible_verifiers: usize,
    validator_queue: usize,
    rng: &mut impl Rng,
) -> VerifyPlan {
    let local_percent = if eligible_verifiers < cfg.low_peer_threshold {
        cfg.low_peer_local_percent
    } else {
        cfg.local_percent
    };

    if rng.random::<f64>() * 100.0 < local_percent && validator_queue < cfg.validator_queue_max {
        return VerifyPlan::Local;
    }

    if cfg.miner_enabled
        && eligible_verifiers >= cfg.low_peer_threshold
        && rng.random::<f64>() * 100.0 < cfg.miner_percent
    {
        return VerifyPlan::Peer;
    }

    VerifyPlan::None
}

/// Select `count` distinct verifier sessions at random without replacement.
pub fn select_verifiers(
    eligible: &[SessionId],
    count: usize,
    rng: &mut impl Rng,
) -> Vec<SessionId> {
    eligible.choose_multiple(rng, count).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> VerifyConfig {
        VerifyConfig {
            local_percent: 10.0,
            low_peer_local_percent: 80.0,
            low_peer_threshold: 2,
            miner_enabled: true,
            miner_percent: 75.0,
            miner_individuals: 2,
            miner_timeout_secs: 15,
            miner_miss_penalty: 100,
            validator_threads: 1,
            validator_queue_max: 4,
        }
    }

    #[test]
    fn full_local_percent_always_plans_local() {
        let mut cfg = cfg();
        cfg.local_percent = 100.0;
        let mut rng = rand::rng();
        for _ in 0..50 {
            assert_eq!(choose_plan(&cfg, 5, 0, &mut rng), VerifyPlan::Local);
        }
    }

    #[test]
    fn saturated_queue_downgrades_local() {
        let mut cfg = cfg();
        cfg.local_percent = 100.0;
        cfg.miner_enabled = false;
        let mut rng = rand::rng();
        // queue at ceiling: never local, and with peers disabled, never peer
        for _ in 0..50 {
            assert_eq!(choose_plan(&cfg, 5, 4, &mut rng), VerifyPlan::None);
        }
    }

    #[test]
    fn peer_plan_requires_enough_eligible_verifiers() {
        let mut cfg = cfg();
        cfg.local_percent = 0.0;
        cfg.low_peer_local_percent = 0.0;
        cfg.miner_percent = 100.0;
        let mut rng = rand::rng();
        for _ in 0..50 {
            assert_eq!(choose_plan(&cfg, 1, 0, &mut rng), VerifyPlan::None);
            assert_eq!(choose_plan(&cfg, 2, 0, &mut rng), VerifyPlan::Peer);
        }
    }

    #[test]
    fn verifier_selection_is_distinct_and_bounded() {
        let eligible: Vec<SessionId> = (0..5).map(|_| SessionId::random()).collect();
        let mut rng = rand::rng();

        let picked = select_verifiers(&eligible, 3, &mut rng);
        assert_eq!(picked.len(), 3);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn selection_caps_at_pool_size() {
        let eligible: Vec<SessionId> = (0..2).map(|_| SessionId::random()).collect();
        let mut rng = rand::rng();
        let picked = select_verifiers(&eligible, 5, &mut rng);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn peer_verdicts_only_count_from_outstanding_verifiers() {
        let verifier = SessionId::random();
        let stranger = SessionId::random();
        let mut share = PendingShare::new(
            SessionId::random(),
            vec![1],
            vec![0u8; 8],
            VerifyPlan::Peer,
        );
        share.outstanding.insert(verifier);

        assert!(!share.record_peer_verdict(stranger, false));
        assert!(!share.flagged_invalid);

        assert!(share.record_peer_verdict(verifier, false));
        assert!(share.flagged_invalid);
        assert!(share.outstanding.is_empty());

        // a second report from the same peer is ignored
        assert!(!share.record_peer_verdict(verifier, true));
    }

    #[test]
    fn local_verdict_overrides_peer_flags() {
        let mut share = PendingShare::new(
            SessionId::random(),
            vec![1],
            vec![0u8; 8],
            VerifyPlan::Peer,
        );
        share.flagged_invalid = true;
        assert!(share.needs_local_recheck());
        assert!(!share.final_verdict());

        share.record_local_verdict(true);
        assert!(!share.needs_local_recheck());
        assert!(share.final_verdict());
    }

    #[test]
    fn deadline_resolves_on_received_verdicts_only() {
        let prompt = SessionId::random();
        let silent = SessionId::random();
        let mut share = PendingShare::new(
            SessionId::random(),
            vec![1],
            vec![0u8; 8],
            VerifyPlan::Peer,
        );
        share.outstanding.insert(prompt);
        share.outstanding.insert(silent);

        assert!(share.record_peer_verdict(prompt, true));

        // deadline fires: the silent peer is drained for slashing and the
        // share resolves on the one verdict that arrived
        let missed: Vec<SessionId> = share.outstanding.drain().collect();
        assert_eq!(missed, vec![silent]);
        assert!(share.final_verdict());
    }

    #[test]
    fn silence_means_valid() {
        let share = PendingShare::new(
            SessionId::random(),
            vec![1],
            vec![0u8; 8],
            VerifyPlan::None,
        );
        assert!(share.final_verdict());
    }
}
