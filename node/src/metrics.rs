//! Prometheus metrics for the faucet node.
//!
//! Counters and gauges covering session lifecycle, share verification,
//! slashing, and payout activity.  The [`FaucetMetrics`] struct owns a
//! dedicated [`Registry`] that the HTTP `/metrics` endpoint encodes into
//! the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

/// Central collection of all faucet-level Prometheus metrics.
pub struct FaucetMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Total mining sessions started.
    pub sessions_started: IntCounter,
    /// Total sessions re-created from a recovery token.
    pub sessions_recovered: IntCounter,
    /// Total shares submitted by miners.
    pub shares_submitted: IntCounter,
    /// Total shares accepted and rewarded.
    pub shares_accepted: IntCounter,
    /// Total shares that failed verification or pre-checks.
    pub shares_rejected: IntCounter,
    /// Total slashing actions (balance penalties and session kills).
    pub slashes: IntCounter,
    /// Total payout requests handed to the claim executor.
    pub claims_submitted: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Current number of sessions in the registry.
    pub active_sessions: IntGauge,
    /// Current number of connected clients.
    pub connected_clients: IntGauge,
    /// Current validator pool queue depth.
    pub validator_queue: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from share receipt to verification resolution, in milliseconds.
    pub share_resolve_time_ms: Histogram,
}

impl FaucetMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let sessions_started = register_int_counter_with_registry!(
            Opts::new(
                "spigot_sessions_started_total",
                "Total mining sessions started"
            ),
            registry
        )
        .expect("failed to register sessions_started counter");

        let sessions_recovered = register_int_counter_with_registry!(
            Opts::new(
                "spigot_sessions_recovered_total",
                "Total sessions re-created from recovery tokens"
            ),
            registry
        )
        .expect("failed to register sessions_recovered counter");

        let shares_submitted = register_int_counter_with_registry!(
            Opts::new("spigot_shares_submitted_total", "Total shares submitted"),
            registry
        )
        .expect("failed to register shares_submitted counter");

        let shares_accepted = register_int_counter_with_registry!(
            Opts::new(
                "spigot_shares_accepted_total",
                "Total shares accepted and rewarded"
            ),
            registry
        )
        .expect("failed to register shares_accepted counter");

        let shares_rejected = register_int_counter_with_registry!(
            Opts::new(
                "spigot_shares_rejected_total",
                "Total shares rejected before or during verification"
            ),
            registry
        )
        .expect("failed to register shares_rejected counter");

        let slashes = register_int_counter_with_registry!(
            Opts::new("spigot_slashes_total", "Total slashing actions"),
            registry
        )
        .expect("failed to register slashes counter");

        let claims_submitted = register_int_counter_with_registry!(
            Opts::new(
                "spigot_claims_submitted_total",
                "Total payout requests submitted"
            ),
            registry
        )
        .expect("failed to register claims_submitted counter");

        // Gauges
        let active_sessions = register_int_gauge_with_registry!(
            Opts::new(
                "spigot_active_sessions",
                "Current number of sessions in the registry"
            ),
            registry
        )
        .expect("failed to register active_sessions gauge");

        let connected_clients = register_int_gauge_with_registry!(
            Opts::new(
                "spigot_connected_clients",
                "Current number of connected clients"
            ),
            registry
        )
        .expect("failed to register connected_clients gauge");

        let validator_queue = register_int_gauge_with_registry!(
            Opts::new(
                "spigot_validator_queue",
                "Current validator pool queue depth"
            ),
            registry
        )
        .expect("failed to register validator_queue gauge");

        // Histogram – exponential buckets covering 1 ms → ~16 s.
        let share_resolve_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "spigot_share_resolve_time_ms",
                "Share verification resolution time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register share_resolve_time_ms histogram");

        Self {
            registry,
            sessions_started,
            sessions_recovered,
            shares_submitted,
            shares_accepted,
            shares_rejected,
            slashes,
            claims_submitted,
            active_sessions,
            connected_clients,
            validator_queue,
            share_resolve_time_ms,
        }
    }
}

impl Default for FaucetMetrics {
    fn default() -> Self {
        Self::new()
    }
}
