//! The faucet core: session registry, share-verification coordinator, and
//! protocol dispatch behind one service facade.
//!
//! A single mutex owns the three mutable maps (sessions, pending shares,
//! clients). Every lock section is short and synchronous; validator round
//! trips, peer timeouts, store flushes, and claim execution all happen
//! outside the lock and re-enter through idempotent methods, so a timer
//! firing just after the event it guards is always a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::ws::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use spigot_crypto::TokenCodec;
use spigot_protocol::{
    actions, pushes, ClaimRewardsRequest, ClaimStatus, ClaimTxPush, ClientFaucetConfig,
    CloseSessionAck, ErrorCode, ErrorData, FoundShareRequest, RequestFrame, ResponseFrame,
    ResumeSessionAck, ResumeSessionRequest, SessionKillPush, StartSessionAck,
    StartSessionRequest, UpdateBalancePush, VerifyPush, VerifyResultRequest,
};
use spigot_store::{AddressMark, FaucetStore, SessionMark};
use spigot_types::{FaucetAmount, SessionId, ShareId, TargetAddress, Timestamp};
use spigot_work::{Argon2Hasher, Blake2bHasher, DifficultyMask, PowHasher, ValidatorPool};

use crate::claim::{ClaimExecutor, DevClaimExecutor};
use crate::client::{ClientHandle, ClientId};
use crate::config::FaucetConfig;
use crate::coordinator::{choose_plan, select_verifiers, PendingShare, VerifyPlan};
use crate::gating::{CaptchaGate, PolicyRejection, SessionGate};
use crate::metrics::FaucetMetrics;
use crate::session::{Session, SessionRegistry};
use crate::NodeError;

/// Why a session was slashed. The string forms are stable and appear in
/// logs and kill messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlashReason {
    /// A verifier missed its deadline: balance penalty.
    MissedVerification,
    /// A verifier's verdict disagreed with the final one: session kill.
    InvalidVerification,
    /// The submitted share failed verification: session kill.
    InvalidShare,
}

impl SlashReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlashReason::MissedVerification => "missed_verify",
            SlashReason::InvalidVerification => "invalid_verify",
            SlashReason::InvalidShare => "invalid_share",
        }
    }
}

/// The mutable heart of the faucet, owned by one mutex.
struct PowCore {
    registry: SessionRegistry,
    pending: HashMap<ShareId, PendingShare>,
    clients: HashMap<ClientId, ClientHandle>,
    by_client: HashMap<ClientId, SessionId>,
}

impl PowCore {
    fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
            pending: HashMap::new(),
            clients: HashMap::new(),
            by_client: HashMap::new(),
        }
    }
}

/// The faucet service. One instance per process, shared as `Arc`.
pub struct PowService {
    config: FaucetConfig,
    codec: TokenCodec,
    pool: ValidatorPool,
    /// Hash parameter string miners must echo with every share.
    pow_params: String,
    store: Arc<FaucetStore>,
    metrics: Arc<FaucetMetrics>,
    claim_executor: Arc<dyn ClaimExecutor>,
    gate: Arc<dyn SessionGate>,
    core: Mutex<PowCore>,
}

type ActionResult = Result<Option<Value>, PolicyRejection>;

impl PowService {
    /// Build a service with the default collaborators: a dev claim
    /// executor and a captcha gate driven by the config flag.
    pub fn new(config: FaucetConfig) -> Result<Arc<Self>, NodeError> {
        let gate = Arc::new(CaptchaGate::new(config.claim.require_captcha));
        Self::with_collaborators(config, Arc::new(DevClaimExecutor::new()), gate)
    }

    /// Build a service with explicit claim-executor and gating seams.
    pub fn with_collaborators(
        config: FaucetConfig,
        claim_executor: Arc<dyn ClaimExecutor>,
        gate: Arc<dyn SessionGate>,
    ) -> Result<Arc<Self>, NodeError> {
        config.validate()?;

        let hasher: Arc<dyn PowHasher> = match config.pow.hasher.as_str() {
            "blake2b" => Arc::new(Blake2bHasher),
            _ => Arc::new(Argon2Hasher::new(
                config.pow.argon2_memory_kib,
                config.pow.argon2_iterations,
                config.pow.argon2_parallelism,
                32,
            )?),
        };
        let pow_params = format!("{}/d{}", hasher.params_string(), config.pow.difficulty);

        let mask = DifficultyMask::new(config.pow.difficulty)?;
        let pool = ValidatorPool::spawn(hasher, mask, config.verify.validator_threads);

        let store = Arc::new(FaucetStore::open(
            &config.store.path,
            Duration::from_millis(config.store.flush_delay_ms),
        )?);
        let codec = TokenCodec::new(config.secret.as_bytes());

        info!(
            params = %pow_params,
            threads = config.verify.validator_threads,
            "faucet service ready"
        );

        Ok(Arc::new(Self {
            config,
            codec,
            pool,
            pow_params,
            store,
            metrics: Arc::new(FaucetMetrics::new()),
            claim_executor,
            gate,
            core: Mutex::new(PowCore::new()),
        }))
    }

    pub fn config(&self) -> &FaucetConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<FaucetMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<FaucetStore> {
        &self.store
    }

    /// The client-facing parameter blob pushed on connect and returned
    /// from `getConfig`.
    pub fn client_config(&self) -> ClientFaucetConfig {
        ClientFaucetConfig {
            pow_params: self.pow_params.clone(),
            nonce_count: self.config.pow.nonce_count,
            share_reward: self.share_reward(),
            min_claim: self.min_claim(),
            max_claim: self.max_claim(),
            idle_timeout: self.config.pow.idle_timeout_secs,
            claim_timeout: self.config.claim.claim_timeout_secs,
            require_captcha: self.config.claim.require_captcha,
        }
    }

    /// Flush all durable state; the daemon calls this on shutdown.
    pub fn shutdown(&self) -> Result<(), NodeError> {
        self.store.flush_now()?;
        Ok(())
    }

    // ── Client lifecycle ────────────────────────────────────────────────

    /// Register a new connection and push the config blob to it.
    pub fn connect(self: &Arc<Self>, tx: UnboundedSender<Message>) -> ClientId {
        let id = ClientId::next();
        let handle = ClientHandle::new(id, tx);
        handle.push(pushes::CONFIG, value_of(&self.client_config()));

        let mut core = self.lock();
        core.clients.insert(id, handle);
        self.metrics.connected_clients.set(core.clients.len() as i64);
        debug!(client = %id, "client connected");
        id
    }

    /// Drop a connection. The bound session is not destroyed, only
    /// unbound and stamped idle; the idle timer force-closes it later if
    /// nothing rebinds.
    pub fn disconnect(self: &Arc<Self>, client: ClientId) {
        let idle_session = {
            let mut guard = self.lock();
            let core = &mut *guard;
            core.clients.remove(&client);
            self.metrics.connected_clients.set(core.clients.len() as i64);

            core.by_client.remove(&client).and_then(|sid| {
                let session = core.registry.get_mut(&sid)?;
                session.active_client = None;
                session.idle_since = Some(Timestamp::now());
                Some(sid)
            })
        };

        if let Some(sid) = idle_session {
            debug!(client = %client, session = %sid, "client disconnected, session idle");
            let svc = self.clone();
            let timeout = self.config.pow.idle_timeout_secs;
            tokio::spawn(async move {
                sleep(Duration::from_secs(timeout)).await;
                svc.close_if_idle(sid);
            });
        }
    }

    /// Force-close a session that has been unbound past the idle timeout.
    /// A no-op if a client rebound (or the idle stamp was refreshed) in
    /// the meantime.
    fn close_if_idle(&self, sid: SessionId) {
        let mut guard = self.lock();
        let core = &mut *guard;
        let expired = core.registry.get(&sid).is_some_and(|s| {
            s.active_client.is_none()
                && s.idle_since.is_some_and(|t| {
                    t.age_secs(Timestamp::now()) >= self.config.pow.idle_timeout_secs
                })
        });
        if expired {
            info!(session = %sid, "closing idle session");
            self.finish_session(core, sid);
        }
    }

    // ── Protocol dispatch ───────────────────────────────────────────────

    /// Handle one raw frame from a client. All outbound traffic flows
    /// through the client's channel; this never blocks.
    pub fn handle_frame(self: &Arc<Self>, client: ClientId, raw: &str) {
        let frame: RequestFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.answer_error(
                    client,
                    None,
                    ErrorCode::InvalidRequest,
                    format!("unparseable frame: {e}"),
                );
                return;
            }
        };

        let result = match frame.action.as_str() {
            actions::GET_CONFIG => Ok(Some(value_of(&self.client_config()))),
            actions::START_SESSION => self.start_session(client, frame.data),
            actions::RESUME_SESSION => self.resume_session(client, frame.data),
            actions::RECOVER_SESSION => self.recover_session(client, frame.data),
            actions::FOUND_SHARE => self.found_share(client, frame.data),
            actions::VERIFY_RESULT => self.verify_result(client, frame.data),
            actions::CLOSE_SESSION => self.close_session(client),
            actions::CLAIM_REWARDS => self.claim_rewards(client, frame.data),
            other => Err(PolicyRejection::new(
                ErrorCode::InvalidRequest,
                format!("unknown action {other:?}"),
            )),
        };

        match result {
            Ok(data) => {
                if let Some(id) = frame.id {
                    self.send_to(client, &ResponseFrame::ok(id, data));
                }
            }
            Err(rejection) => {
                self.answer_error(client, frame.id, rejection.code, rejection.message)
            }
        }
    }

    // ── Session operations ──────────────────────────────────────────────

    fn start_session(self: &Arc<Self>, client: ClientId, data: Option<Value>) -> ActionResult {
        let req: StartSessionRequest = decode(data)?;
        let addr: TargetAddress = req
            .addr
            .parse()
            .map_err(|e| PolicyRejection::new(ErrorCode::InvalidAddr, format!("{e}")))?;

        self.gate
            .on_session_start(&addr, req.captcha_token.as_deref())?;

        let mut core = self.lock();
        if core.by_client.contains_key(&client) {
            return Err(PolicyRejection::new(
                ErrorCode::DuplicateSession,
                "a session is already bound to this connection",
            ));
        }

        // The cooldown check and the `used` mark are ordered by the core
        // lock; racing starts for one address serialize here.
        if !self.store.address_marks(&addr).is_empty() {
            return Err(PolicyRejection::new(
                ErrorCode::InvalidAddr,
                "address is in its cooldown window",
            ));
        }

        let session = Session::start(addr.clone(), client);
        self.store.set_address_mark(&addr, AddressMark::Used);

        let ack = StartSessionAck {
            session_id: session.id,
            start_time: session.start_time.as_secs(),
            preimage: session.preimage_b64(),
            target_addr: addr.as_str().to_string(),
            recovery: self.codec.sign(&session.snapshot(false)),
        };

        info!(session = %session.id, addr = %addr, "session started");
        core.by_client.insert(client, session.id);
        core.registry.insert(session);
        self.metrics.sessions_started.inc();
        self.metrics.active_sessions.set(core.registry.len() as i64);

        Ok(Some(value_of(&ack)))
    }

    fn resume_session(self: &Arc<Self>, client: ClientId, data: Option<Value>) -> ActionResult {
        let req: ResumeSessionRequest = decode(data)?;
        let sid: SessionId = req.session_id.parse().map_err(|_| {
            PolicyRejection::new(ErrorCode::InvalidSessionId, "malformed session id")
        })?;

        let mut guard = self.lock();
        let core = &mut *guard;

        if core.by_client.contains_key(&client) {
            return Err(PolicyRejection::new(
                ErrorCode::DuplicateSession,
                "a session is already bound to this connection",
            ));
        }
        let Some(session) = core.registry.get_mut(&sid) else {
            return Err(PolicyRejection::new(
                ErrorCode::SessionNotFound,
                "no such session",
            ));
        };

        // At most one binding: an existing client is forcibly evicted.
        // No token travels with this kill: the session stays live under
        // the new client, so there is nothing for the old one to claim.
        if let Some(old) = session.active_client.take() {
            core.by_client.remove(&old);
            if let Some(handle) = core.clients.get(&old) {
                handle.push(
                    pushes::SESSION_KILL,
                    value_of(&SessionKillPush {
                        level: "client".to_string(),
                        message: "session resumed from another client".to_string(),
                        token: None,
                    }),
                );
            }
            warn!(session = %sid, old = %old, new = %client, "session rebound, prior client evicted");
        }

        session.active_client = Some(client);
        session.idle_since = None;
        let last_nonce = session.last_nonce;
        core.by_client.insert(client, sid);

        Ok(Some(value_of(&ResumeSessionAck { last_nonce })))
    }

    fn recover_session(self: &Arc<Self>, client: ClientId, data: Option<Value>) -> ActionResult {
        let token: String = decode(data)?;
        let snapshot = self.codec.verify(&token).map_err(|_| {
            PolicyRejection::new(ErrorCode::InvalidData, "invalid recovery token")
        })?;

        if snapshot
            .start_time
            .is_older_than(self.config.pow.session_timeout_secs, Timestamp::now())
        {
            return Err(PolicyRejection::new(
                ErrorCode::SessionTimeout,
                "session timed out",
            ));
        }
        // Any mark disqualifies: closed, claimed, and killed sessions all
        // stay dead across restarts.
        if !self.store.session_marks(&snapshot.id, &[]).is_empty() {
            return Err(PolicyRejection::new(
                ErrorCode::InvalidSession,
                "session is closed or killed",
            ));
        }

        let mut core = self.lock();
        if core.by_client.contains_key(&client) {
            return Err(PolicyRejection::new(
                ErrorCode::DuplicateSession,
                "a session is already bound to this connection",
            ));
        }
        if core.registry.contains(&snapshot.id) {
            return Err(PolicyRejection::new(
                ErrorCode::DuplicateSession,
                "session is still live, use resumeSession",
            ));
        }

        let Some(session) = Session::recover(&snapshot, client) else {
            return Err(PolicyRejection::new(
                ErrorCode::InvalidData,
                "invalid recovery token",
            ));
        };

        info!(session = %session.id, balance = %session.balance, "session recovered from token");
        core.by_client.insert(client, session.id);
        core.registry.insert(session);
        self.metrics.sessions_recovered.inc();
        self.metrics.active_sessions.set(core.registry.len() as i64);

        Ok(None)
    }

    fn close_session(self: &Arc<Self>, client: ClientId) -> ActionResult {
        let mut guard = self.lock();
        let core = &mut *guard;
        let Some(sid) = core.by_client.get(&client).copied() else {
            return Err(PolicyRejection::new(
                ErrorCode::SessionNotFound,
                "no session bound to this connection",
            ));
        };
        let Some(ack) = self.finish_session(core, sid) else {
            return Err(PolicyRejection::new(
                ErrorCode::SessionNotFound,
                "no such session",
            ));
        };
        Ok(Some(value_of(&ack)))
    }

    /// Shared close path: remove the session, record the `closed` mark,
    /// clamp the balance and issue a claim token when it clears the
    /// minimum. Used by explicit close, idle expiry, and lifetime expiry.
    fn finish_session(&self, core: &mut PowCore, sid: SessionId) -> Option<CloseSessionAck> {
        let mut session = core.registry.remove(&sid)?;
        if let Some(cid) = session.active_client {
            core.by_client.remove(&cid);
        }

        session.balance = session.balance.min(self.max_claim());
        let claimable = session.balance >= self.min_claim();
        self.store.set_session_mark(&sid, SessionMark::Closed);

        let token = claimable.then(|| self.codec.sign(&session.snapshot(true)));
        info!(
            session = %sid,
            balance = %session.balance,
            claimable,
            "session closed"
        );
        self.metrics.active_sessions.set(core.registry.len() as i64);

        Some(CloseSessionAck {
            claimable,
            token,
            balance: session.balance,
        })
    }

    // ── Share flow ──────────────────────────────────────────────────────

    fn found_share(self: &Arc<Self>, client: ClientId, data: Option<Value>) -> ActionResult {
        let req: FoundShareRequest = decode(data)?;

        let (share_id, plan) = {
            let mut guard = self.lock();
            let core = &mut *guard;
            let Some(sid) = core.by_client.get(&client).copied() else {
                return Err(PolicyRejection::new(
                    ErrorCode::SessionNotFound,
                    "no session bound to this connection",
                ));
            };

            // Lifetime check: an expired session is closed on the spot.
            let expired = core.registry.get(&sid).is_some_and(|s| {
                s.start_time
                    .is_older_than(self.config.pow.session_timeout_secs, Timestamp::now())
            });
            if expired {
                let ack = self.finish_session(core, sid);
                if let Some(handle) = core.clients.get(&client) {
                    handle.push(
                        pushes::SESSION_KILL,
                        value_of(&SessionKillPush {
                            level: "timeout".to_string(),
                            message: "session lifetime exceeded".to_string(),
                            token: ack.and_then(|a| a.token),
                        }),
                    );
                }
                return Err(PolicyRejection::new(
                    ErrorCode::SessionTimeout,
                    "session lifetime exceeded",
                ));
            }

            if req.params != self.pow_params {
                return Err(PolicyRejection::new(
                    ErrorCode::InvalidShare,
                    format!("share params {:?} do not match {:?}", req.params, self.pow_params),
                ));
            }
            if req.nonces.len() != self.config.pow.nonce_count as usize {
                return Err(PolicyRejection::new(
                    ErrorCode::InvalidShare,
                    format!("expected {} nonces", self.config.pow.nonce_count),
                ));
            }

            let Some(session) = core.registry.get_mut(&sid) else {
                return Err(PolicyRejection::new(
                    ErrorCode::SessionNotFound,
                    "no such session",
                ));
            };
            if !session.accept_nonces(&req.nonces) {
                return Err(PolicyRejection::new(
                    ErrorCode::InvalidShare,
                    "nonce at or below the session's accepted cursor",
                ));
            }
            let preimage = session.preimage.clone();
            let preimage_b64 = session.preimage_b64();
            self.metrics.shares_submitted.inc();

            let eligible = core
                .registry
                .eligible_verifiers(&sid, self.miss_penalty());
            let mut rng = rand::rng();
            let plan = choose_plan(
                &self.config.verify,
                eligible.len(),
                self.pool.queue_len(),
                &mut rng,
            );

            let mut share = PendingShare::new(sid, req.nonces.clone(), preimage, plan);
            if plan == VerifyPlan::Peer {
                let peers = select_verifiers(
                    &eligible,
                    self.config.verify.miner_individuals,
                    &mut rng,
                );
                let push = VerifyPush {
                    share_id: share.share_id,
                    preimage: preimage_b64,
                    nonces: req.nonces.clone(),
                };
                for peer in peers {
                    share.outstanding.insert(peer);
                    let handle = core
                        .registry
                        .get(&peer)
                        .and_then(|s| s.active_client)
                        .and_then(|cid| core.clients.get(&cid));
                    if let Some(handle) = handle {
                        handle.push(pushes::VERIFY, value_of(&push));
                    }
                }
            }

            let share_id = share.share_id;
            debug!(share = %share_id, session = %sid, ?plan, "share accepted for verification");
            core.pending.insert(share_id, share);
            (share_id, plan)
        };

        match plan {
            VerifyPlan::Local => self.dispatch_local(share_id),
            VerifyPlan::Peer => {
                let svc = self.clone();
                let timeout = self.config.verify.miner_timeout_secs;
                tokio::spawn(async move {
                    sleep(Duration::from_secs(timeout)).await;
                    svc.on_peer_timeout(share_id);
                });
            }
            VerifyPlan::None => {
                debug!(share = %share_id, "accepting share without verification");
                self.resolve_share(share_id);
            }
        }

        Ok(None)
    }

    /// Hand a pending share to the validator pool and re-enter with the
    /// verdict once it lands.
    fn dispatch_local(self: &Arc<Self>, share_id: ShareId) {
        let job = {
            let core = self.lock();
            core.pending
                .get(&share_id)
                .map(|s| (s.nonces.clone(), s.preimage.clone()))
        };
        let Some((nonces, preimage)) = job else {
            return;
        };

        match self.pool.submit(share_id, nonces, preimage) {
            Ok(rx) => {
                self.metrics.validator_queue.set(self.pool.queue_len() as i64);
                let svc = self.clone();
                tokio::spawn(async move {
                    // a dropped reply means the pool shut down mid-flight
                    let verdict = rx.await.unwrap_or(false);
                    svc.metrics
                        .validator_queue
                        .set(svc.pool.queue_len() as i64);
                    svc.on_local_verdict(share_id, verdict);
                });
            }
            Err(e) => {
                // drop the share rather than leaving it pending forever
                warn!(share = %share_id, error = %e, "validator pool unavailable, dropping share");
                self.lock().pending.remove(&share_id);
            }
        }
    }

    fn on_local_verdict(self: &Arc<Self>, share_id: ShareId, verdict: bool) {
        {
            let mut core = self.lock();
            match core.pending.get_mut(&share_id) {
                Some(share) => share.record_local_verdict(verdict),
                None => return,
            }
        }
        self.resolve_share(share_id);
    }

    fn verify_result(self: &Arc<Self>, client: ClientId, data: Option<Value>) -> ActionResult {
        let req: VerifyResultRequest = decode(data)?;

        let complete = {
            let mut core = self.lock();
            let Some(sid) = core.by_client.get(&client).copied() else {
                return Err(PolicyRejection::new(
                    ErrorCode::SessionNotFound,
                    "no session bound to this connection",
                ));
            };
            let Some(share) = core.pending.get_mut(&req.share_id) else {
                // unknown or already-resolved share: ignore
                return Ok(None);
            };
            if !share.record_peer_verdict(sid, req.is_valid) {
                // not an outstanding verifier for this share: ignore
                return Ok(None);
            }
            share.outstanding.is_empty()
        };

        if complete {
            self.resolve_share(req.share_id);
        }
        Ok(None)
    }

    /// Fire the peer-verification deadline: every verifier still
    /// outstanding is slashed with a balance penalty, then the share
    /// resolves on whatever verdicts arrived in time.
    fn on_peer_timeout(self: &Arc<Self>, share_id: ShareId) {
        {
            let mut guard = self.lock();
            let core = &mut *guard;
            let Some(share) = core.pending.get_mut(&share_id) else {
                return;
            };
            let missed: Vec<SessionId> = share.outstanding.drain().collect();
            for peer in missed {
                self.slash_missed(core, peer);
            }
        }
        self.resolve_share(share_id);
    }

    /// Resolve a pending share. Idempotent: the share is removed from the
    /// pending map exactly once, so a timeout racing the last peer
    /// response is harmless. A share flagged invalid without a local
    /// verdict is re-checked on the pool before anything is finalized.
    fn resolve_share(self: &Arc<Self>, share_id: ShareId) {
        {
            let mut guard = self.lock();
            let core = &mut *guard;

            let needs_recheck = match core.pending.get_mut(&share_id) {
                None => return, // already resolved
                Some(share) => {
                    if share.needs_local_recheck() {
                        if share.recheck_dispatched {
                            return;
                        }
                        share.recheck_dispatched = true;
                        true
                    } else {
                        false
                    }
                }
            };

            if !needs_recheck {
                let Some(mut share) = core.pending.remove(&share_id) else {
                    return;
                };
                let valid = share.final_verdict();
                self.metrics
                    .share_resolve_time_ms
                    .observe(share.submitted.elapsed().as_millis() as f64);

                // verifiers that never answered (local-verdict resolution
                // racing the timeout) are slashed here as well
                let missed: Vec<SessionId> = share.outstanding.drain().collect();
                for peer in missed {
                    self.slash_missed(core, peer);
                }
                for (&peer, &verdict) in &share.verdicts {
                    if verdict != valid {
                        self.kill_session(core, peer, SlashReason::InvalidVerification);
                    }
                }

                if valid {
                    self.reward_share(core, share.session);
                } else {
                    self.metrics.shares_rejected.inc();
                    self.kill_session(core, share.session, SlashReason::InvalidShare);
                }
                return;
            }
        }

        debug!(share = %share_id, "forcing local re-check of flagged share");
        self.dispatch_local(share_id);
    }

    // ── Rewards and slashing ────────────────────────────────────────────

    fn reward_share(&self, core: &mut PowCore, sid: SessionId) {
        // the session may have closed while verification was in flight
        let Some(session) = core.registry.get_mut(&sid) else {
            return;
        };
        let factor = self.gate.reward_factor(session);
        let reward = self.share_reward().scale_percent(factor);
        session.balance = session.balance.saturating_add(reward);
        self.metrics.shares_accepted.inc();
        debug!(session = %sid, balance = %session.balance, "share rewarded");

        let push = UpdateBalancePush {
            balance: session.balance,
            recovery: self.codec.sign(&session.snapshot(false)),
            reason: "valid share".to_string(),
        };
        if let Some(handle) = session
            .active_client
            .and_then(|cid| core.clients.get(&cid))
        {
            handle.push(pushes::UPDATE_BALANCE, value_of(&push));
        }
    }

    /// Balance penalty for a verifier that missed its deadline, clamped
    /// at zero, with a fresh recovery token pushed to its client.
    fn slash_missed(&self, core: &mut PowCore, peer: SessionId) {
        let penalty = self.miss_penalty();
        let Some(session) = core.registry.get_mut(&peer) else {
            return;
        };
        session.balance = session.balance.saturating_sub(penalty);
        warn!(
            session = %peer,
            reason = SlashReason::MissedVerification.as_str(),
            penalty = %penalty,
            balance = %session.balance,
            "slashing verifier"
        );
        self.metrics.slashes.inc();

        let push = UpdateBalancePush {
            balance: session.balance,
            recovery: self.codec.sign(&session.snapshot(false)),
            reason: format!("verify miss (penalty: {penalty})"),
        };
        if let Some(handle) = session
            .active_client
            .and_then(|cid| core.clients.get(&cid))
        {
            handle.push(pushes::UPDATE_BALANCE, value_of(&push));
        }
    }

    /// Terminal slash: the session is removed, marked `killed` in the
    /// store, and its client notified. A killed id can never be resumed
    /// or recovered.
    fn kill_session(&self, core: &mut PowCore, sid: SessionId, reason: SlashReason) {
        let Some(session) = core.registry.remove(&sid) else {
            return;
        };
        self.store.set_session_mark(&sid, SessionMark::Killed);
        warn!(
            session = %sid,
            reason = reason.as_str(),
            balance = %session.balance,
            "session killed"
        );
        self.metrics.slashes.inc();
        self.metrics.active_sessions.set(core.registry.len() as i64);

        if let Some(cid) = session.active_client {
            core.by_client.remove(&cid);
            if let Some(handle) = core.clients.get(&cid) {
                let message = match reason {
                    SlashReason::InvalidShare => "share verification failed",
                    SlashReason::InvalidVerification => "returned an invalid verification result",
                    SlashReason::MissedVerification => "missed verification deadline",
                };
                handle.push(
                    pushes::SESSION_KILL,
                    value_of(&SessionKillPush {
                        level: "session".to_string(),
                        message: message.to_string(),
                        token: None,
                    }),
                );
            }
        }
    }

    // ── Claims ──────────────────────────────────────────────────────────

    fn claim_rewards(self: &Arc<Self>, client: ClientId, data: Option<Value>) -> ActionResult {
        let req: ClaimRewardsRequest = decode(data)?;
        self.gate.on_claim(req.captcha_token.as_deref())?;

        let snapshot = self.codec.verify(&req.token).map_err(|_| {
            PolicyRejection::new(ErrorCode::InvalidClaim, "invalid claim token")
        })?;
        if !snapshot.claimable {
            return Err(PolicyRejection::new(
                ErrorCode::InvalidClaim,
                "token is not a claim token",
            ));
        }
        if snapshot
            .start_time
            .is_older_than(self.config.claim.claim_timeout_secs, Timestamp::now())
        {
            return Err(PolicyRejection::new(
                ErrorCode::InvalidClaim,
                "claim window expired",
            ));
        }
        // `closed` is expected; anything else (claimed, killed) blocks
        let marks = self
            .store
            .session_marks(&snapshot.id, &[SessionMark::Closed]);
        if !marks.is_empty() {
            return Err(PolicyRejection::new(
                ErrorCode::InvalidClaim,
                "rewards already claimed",
            ));
        }
        self.store.set_session_mark(&snapshot.id, SessionMark::Claimed);
        self.metrics.claims_submitted.inc();

        let amount = snapshot.balance.min(self.max_claim());
        let handle = {
            let core = self.lock();
            core.clients.get(&client).cloned()
        };
        info!(
            session = %snapshot.id,
            addr = %snapshot.target_addr,
            amount = %amount,
            "claim accepted"
        );

        let svc = self.clone();
        let sid = snapshot.id;
        let addr = snapshot.target_addr.clone();
        tokio::spawn(async move {
            if let Some(handle) = &handle {
                handle.push(
                    pushes::CLAIM_TX,
                    value_of(&ClaimTxPush {
                        session: sid,
                        status: ClaimStatus::Pending,
                        tx_hash: None,
                        tx_block: None,
                        error: None,
                    }),
                );
            }
            let push = match svc.claim_executor.submit(addr, amount).await {
                Ok(receipt) => {
                    info!(session = %sid, tx = %receipt.tx_hash, block = receipt.tx_block, "claim confirmed");
                    ClaimTxPush {
                        session: sid,
                        status: ClaimStatus::Confirmed,
                        tx_hash: Some(receipt.tx_hash),
                        tx_block: Some(receipt.tx_block),
                        error: None,
                    }
                }
                Err(e) => {
                    error!(session = %sid, error = %e, "claim execution failed");
                    ClaimTxPush {
                        session: sid,
                        status: ClaimStatus::Failed,
                        tx_hash: None,
                        tx_block: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            if let Some(handle) = &handle {
                handle.push(pushes::CLAIM_TX, value_of(&push));
            }
        });

        Ok(None)
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Periodically drop store marks past their retention windows.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let svc = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                svc.config.store.sweep_interval_secs,
            ));
            interval.tick().await; // immediate first tick
            loop {
                interval.tick().await;
                svc.store.sweep(
                    Timestamp::now(),
                    svc.config.claim.claim_timeout_secs,
                    svc.config.store.address_cooldown_secs,
                );
            }
        });
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, PowCore> {
        self.core.lock().expect("core mutex poisoned")
    }

    fn send_to(&self, client: ClientId, frame: &ResponseFrame) {
        let handle = {
            let core = self.lock();
            core.clients.get(&client).cloned()
        };
        if let Some(handle) = handle {
            handle.send_frame(frame);
        }
    }

    fn answer_error(
        &self,
        client: ClientId,
        request_id: Option<u64>,
        code: ErrorCode,
        message: String,
    ) {
        debug!(client = %client, %code, message, "rejecting request");
        let frame = match request_id {
            Some(id) => ResponseFrame::error(id, code, message),
            None => ResponseFrame::push("error", value_of(&ErrorData { code, message })),
        };
        self.send_to(client, &frame);
    }

    fn share_reward(&self) -> FaucetAmount {
        FaucetAmount::new(self.config.pow.share_reward as u128)
    }

    fn min_claim(&self) -> FaucetAmount {
        FaucetAmount::new(self.config.claim.min_claim as u128)
    }

    fn max_claim(&self) -> FaucetAmount {
        FaucetAmount::new(self.config.claim.max_claim as u128)
    }

    fn miss_penalty(&self) -> FaucetAmount {
        FaucetAmount::new(self.config.verify.miner_miss_penalty as u128)
    }
}

fn decode<T: DeserializeOwned>(data: Option<Value>) -> Result<T, PolicyRejection> {
    let value = data.ok_or_else(|| {
        PolicyRejection::new(ErrorCode::InvalidRequest, "missing request data")
    })?;
    serde_json::from_value(value).map_err(|e| {
        PolicyRejection::new(ErrorCode::InvalidData, format!("bad request data: {e}"))
    })
}

fn value_of<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
