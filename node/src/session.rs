//! Mining sessions and the authoritative session registry.
//!
//! A [`Session`] is the unit of mining activity for one payout address.
//! The registry owns every live session; connections only ever hold a
//! session id. All mutation goes through the core lock in the service
//! layer, so nothing here synchronizes.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

use spigot_crypto::SessionSnapshot;
use spigot_types::{FaucetAmount, Nonce, SessionId, TargetAddress, Timestamp};

use crate::client::ClientId;

/// Length of the per-session random preimage in bytes.
const PREIMAGE_LEN: usize = 32;

/// One mining session.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub start_time: Timestamp,
    /// When the last bound client disconnected; `None` while one is attached.
    pub idle_since: Option<Timestamp>,
    pub target_addr: TargetAddress,
    /// Random bytes every hash for this session is computed against.
    pub preimage: Vec<u8>,
    pub balance: FaucetAmount,
    /// High-water mark of accepted nonces; the core anti-replay invariant.
    pub last_nonce: Nonce,
    pub active_client: Option<ClientId>,
}

impl Session {
    /// Allocate a fresh session bound to the given client.
    pub fn start(target_addr: TargetAddress, client: ClientId) -> Self {
        let mut preimage = vec![0u8; PREIMAGE_LEN];
        rand::rng().fill_bytes(&mut preimage);
        Self {
            id: SessionId::random(),
            start_time: Timestamp::now(),
            idle_since: None,
            target_addr,
            preimage,
            balance: FaucetAmount::ZERO,
            last_nonce: 0,
            active_client: Some(client),
        }
    }

    /// Re-create a session from a verified recovery token.
    ///
    /// The nonce cursor restarts at zero: shares are never persisted, so
    /// no replay window crosses a restart. Returns `None` when the
    /// snapshot's preimage is not valid base64.
    pub fn recover(snapshot: &SessionSnapshot, client: ClientId) -> Option<Self> {
        let preimage = BASE64.decode(&snapshot.preimage).ok()?;
        Some(Self {
            id: snapshot.id,
            start_time: snapshot.start_time,
            idle_since: None,
            target_addr: snapshot.target_addr.clone(),
            preimage,
            balance: snapshot.balance,
            last_nonce: 0,
            active_client: Some(client),
        })
    }

    /// Project this session into the signable snapshot form.
    pub fn snapshot(&self, claimable: bool) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            start_time: self.start_time,
            target_addr: self.target_addr.clone(),
            preimage: BASE64.encode(&self.preimage),
            balance: self.balance,
            claimable,
        }
    }

    /// The preimage exactly as it travels on the wire.
    pub fn preimage_b64(&self) -> String {
        BASE64.encode(&self.preimage)
    }

    /// Accept a batch of nonces if every one is strictly above the current
    /// high-water mark, advancing it to the batch maximum. Rejection leaves
    /// the session untouched.
    pub fn accept_nonces(&mut self, nonces: &[Nonce]) -> bool {
        let mut cursor = self.last_nonce;
        for &nonce in nonces {
            if nonce <= cursor {
                return false;
            }
            cursor = nonce;
        }
        self.last_nonce = cursor;
        true
    }
}

/// Authoritative map of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Sessions other than `exclude` that are connected and hold more
    /// balance than the miss penalty, i.e. have something to lose.
    pub fn eligible_verifiers(
        &self,
        exclude: &SessionId,
        miss_penalty: FaucetAmount,
    ) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.id != *exclude && s.active_client.is_some() && s.balance > miss_penalty)
            .map(|s| s.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> TargetAddress {
        format!("0x{:040x}", n).parse().unwrap()
    }

    #[test]
    fn nonces_must_be_strictly_increasing() {
        let mut session = Session::start(addr(1), ClientId::next());
        assert!(session.accept_nonces(&[5]));
        assert_eq!(session.last_nonce, 5);

        // any nonce at or below the cursor rejects the whole batch
        assert!(!session.accept_nonces(&[3]));
        assert!(!session.accept_nonces(&[5]));
        assert!(!session.accept_nonces(&[6, 6]));
        assert_eq!(session.last_nonce, 5);

        assert!(session.accept_nonces(&[6, 9, 12]));
        assert_eq!(session.last_nonce, 12);
    }

    #[test]
    fn rejected_batch_leaves_cursor_untouched() {
        let mut session = Session::start(addr(1), ClientId::next());
        assert!(session.accept_nonces(&[10]));
        // first nonce fine, second stale: atomic rejection
        assert!(!session.accept_nonces(&[11, 4]));
        assert_eq!(session.last_nonce, 10);
    }

    #[test]
    fn snapshot_recover_round_trip() {
        let session = Session::start(addr(2), ClientId::next());
        let snapshot = session.snapshot(false);

        let recovered = Session::recover(&snapshot, ClientId::next()).unwrap();
        assert_eq!(recovered.id, session.id);
        assert_eq!(recovered.preimage, session.preimage);
        assert_eq!(recovered.balance, session.balance);
        // nonce cursor always restarts
        assert_eq!(recovered.last_nonce, 0);
    }

    #[test]
    fn recover_rejects_bad_preimage_encoding() {
        let session = Session::start(addr(2), ClientId::next());
        let mut snapshot = session.snapshot(false);
        snapshot.preimage = "not base64 ###".to_string();
        assert!(Session::recover(&snapshot, ClientId::next()).is_none());
    }

    #[test]
    fn eligible_verifiers_filters_on_binding_and_balance() {
        let mut registry = SessionRegistry::new();
        let penalty = FaucetAmount::new(100);

        let mut rich = Session::start(addr(1), ClientId::next());
        rich.balance = FaucetAmount::new(500);
        let rich_id = rich.id;

        let mut poor = Session::start(addr(2), ClientId::next());
        poor.balance = FaucetAmount::new(100); // not strictly above the penalty

        let mut unbound = Session::start(addr(3), ClientId::next());
        unbound.balance = FaucetAmount::new(500);
        unbound.active_client = None;

        let mut submitter = Session::start(addr(4), ClientId::next());
        submitter.balance = FaucetAmount::new(500);
        let submitter_id = submitter.id;

        registry.insert(rich);
        registry.insert(poor);
        registry.insert(unbound);
        registry.insert(submitter);

        let eligible = registry.eligible_verifiers(&submitter_id, penalty);
        assert_eq!(eligible, vec![rich_id]);
    }
}
