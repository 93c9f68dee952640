//! Faucet configuration with TOML file support.
//!
//! One section per module, validated at load time. Every field carries a
//! serde default so a partial (or empty) config file still yields a
//! runnable dev setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::NodeError;

/// Top-level configuration for a spigot faucet node.
///
/// Can be loaded from a TOML file via [`FaucetConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaucetConfig {
    /// Port the websocket server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server secret used to sign recovery and claim tokens. Rotating it
    /// invalidates every outstanding token.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub pow: PowConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub claim: ClaimConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Mining-session parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PowConfig {
    /// Hash backend: "blake2b" (dev) or "argon2" (production).
    #[serde(default = "default_hasher")]
    pub hasher: String,

    /// Difficulty in leading zero bits, 1..=64.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Nonces required per share.
    #[serde(default = "default_nonce_count")]
    pub nonce_count: u32,

    /// Reward per accepted share, in the smallest asset unit.
    #[serde(default = "default_share_reward")]
    pub share_reward: u64,

    /// Seconds an unbound session survives before it is force-closed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Maximum session lifetime in seconds.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// Keepalive ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds without any socket activity before a connection is dropped.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    /// Argon2 memory cost in KiB (only used with the "argon2" hasher).
    #[serde(default = "default_argon2_memory")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count.
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 lane count.
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

/// Share-verification strategy parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Probability (percent) of checking a share locally.
    #[serde(default = "default_local_percent")]
    pub local_percent: f64,

    /// Local-check probability used while too few peers are eligible.
    #[serde(default = "default_low_peer_percent")]
    pub low_peer_local_percent: f64,

    /// Minimum eligible verifiers before peer verification is considered.
    #[serde(default = "default_peer_threshold")]
    pub low_peer_threshold: usize,

    /// Whether shares may be dispatched to peer miners for cross-checking.
    #[serde(default = "default_true")]
    pub miner_enabled: bool,

    /// Probability (percent) of dispatching to peers when eligible.
    #[serde(default = "default_miner_percent")]
    pub miner_percent: f64,

    /// Number of distinct peer verifiers per share.
    #[serde(default = "default_miner_individuals")]
    pub miner_individuals: usize,

    /// Seconds a peer has to return its verdict before being slashed.
    #[serde(default = "default_miner_timeout")]
    pub miner_timeout_secs: u64,

    /// Balance penalty for a peer that misses its verification deadline.
    #[serde(default = "default_miss_penalty")]
    pub miner_miss_penalty: u64,

    /// Validator pool thread count.
    #[serde(default = "default_validator_threads")]
    pub validator_threads: usize,

    /// Queue depth at which new shares stop being checked locally.
    #[serde(default = "default_validator_queue_max")]
    pub validator_queue_max: usize,
}

/// Payout parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Minimum session balance eligible for payout.
    #[serde(default = "default_min_claim")]
    pub min_claim: u64,

    /// Balances are clamped to this at session close.
    #[serde(default = "default_max_claim")]
    pub max_claim: u64,

    /// Seconds after session start during which a claim token stays valid.
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,

    /// Whether session start and claim require a captcha token.
    #[serde(default)]
    pub require_captcha: bool,
}

/// Mark-ledger persistence parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the mark ledger file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Debounce delay before dirty marks are flushed to disk.
    #[serde(default = "default_flush_delay")]
    pub flush_delay_ms: u64,

    /// Interval between retention sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Seconds an address stays blocked after starting a session.
    #[serde(default = "default_address_cooldown")]
    pub address_cooldown_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_port() -> u16 {
    8080
}

fn default_secret() -> String {
    "insecure-dev-secret".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_hasher() -> String {
    "argon2".to_string()
}

fn default_difficulty() -> u32 {
    11
}

fn default_nonce_count() -> u32 {
    1
}

fn default_share_reward() -> u64 {
    1_000_000
}

fn default_idle_timeout() -> u64 {
    1800
}

fn default_session_timeout() -> u64 {
    7200
}

fn default_ping_interval() -> u64 {
    10
}

fn default_ping_timeout() -> u64 {
    30
}

fn default_argon2_memory() -> u32 {
    4096
}

fn default_argon2_iterations() -> u32 {
    1
}

fn default_argon2_parallelism() -> u32 {
    1
}

fn default_local_percent() -> f64 {
    10.0
}

fn default_low_peer_percent() -> f64 {
    80.0
}

fn default_peer_threshold() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_miner_percent() -> f64 {
    75.0
}

fn default_miner_individuals() -> usize {
    2
}

fn default_miner_timeout() -> u64 {
    15
}

fn default_miss_penalty() -> u64 {
    100_000
}

fn default_validator_threads() -> usize {
    2
}

fn default_validator_queue_max() -> usize {
    8
}

fn default_min_claim() -> u64 {
    10_000_000
}

fn default_max_claim() -> u64 {
    1_000_000_000
}

fn default_claim_timeout() -> u64 {
    43200
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./spigot_store.json")
}

fn default_flush_delay() -> u64 {
    2000
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_address_cooldown() -> u64 {
    3600
}

// ── Impl ───────────────────────────────────────────────────────────────

impl FaucetConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("FaucetConfig is always serializable to TOML")
    }

    /// Reject configurations that cannot work before the node starts.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.secret.is_empty() {
            return Err(NodeError::Config("secret must not be empty".into()));
        }
        if !(1..=64).contains(&self.pow.difficulty) {
            return Err(NodeError::Config(format!(
                "difficulty {} out of range 1..=64",
                self.pow.difficulty
            )));
        }
        if self.pow.nonce_count == 0 {
            return Err(NodeError::Config("nonce_count must be at least 1".into()));
        }
        if self.pow.hasher != "blake2b" && self.pow.hasher != "argon2" {
            return Err(NodeError::Config(format!(
                "unknown hasher {:?} (expected \"blake2b\" or \"argon2\")",
                self.pow.hasher
            )));
        }
        for (name, pct) in [
            ("local_percent", self.verify.local_percent),
            ("low_peer_local_percent", self.verify.low_peer_local_percent),
            ("miner_percent", self.verify.miner_percent),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                return Err(NodeError::Config(format!(
                    "{name} {pct} out of range 0..=100"
                )));
            }
        }
        if self.verify.miner_individuals == 0 {
            return Err(NodeError::Config(
                "miner_individuals must be at least 1".into(),
            ));
        }
        if self.verify.validator_threads == 0 {
            return Err(NodeError::Config(
                "validator_threads must be at least 1".into(),
            ));
        }
        if self.claim.max_claim < self.claim.min_claim {
            return Err(NodeError::Config(
                "max_claim must not be below min_claim".into(),
            ));
        }
        Ok(())
    }
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            secret: default_secret(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            pow: PowConfig::default(),
            verify: VerifyConfig::default(),
            claim: ClaimConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            hasher: default_hasher(),
            difficulty: default_difficulty(),
            nonce_count: default_nonce_count(),
            share_reward: default_share_reward(),
            idle_timeout_secs: default_idle_timeout(),
            session_timeout_secs: default_session_timeout(),
            ping_interval_secs: default_ping_interval(),
            ping_timeout_secs: default_ping_timeout(),
            argon2_memory_kib: default_argon2_memory(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            local_percent: default_local_percent(),
            low_peer_local_percent: default_low_peer_percent(),
            low_peer_threshold: default_peer_threshold(),
            miner_enabled: default_true(),
            miner_percent: default_miner_percent(),
            miner_individuals: default_miner_individuals(),
            miner_timeout_secs: default_miner_timeout(),
            miner_miss_penalty: default_miss_penalty(),
            validator_threads: default_validator_threads(),
            validator_queue_max: default_validator_queue_max(),
        }
    }
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            min_claim: default_min_claim(),
            max_claim: default_max_claim(),
            claim_timeout_secs: default_claim_timeout(),
            require_captcha: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            flush_delay_ms: default_flush_delay(),
            sweep_interval_secs: default_sweep_interval(),
            address_cooldown_secs: default_address_cooldown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = FaucetConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = FaucetConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.port, config.port);
        assert_eq!(parsed.pow.difficulty, config.pow.difficulty);
        assert_eq!(parsed.claim.min_claim, config.claim.min_claim);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = FaucetConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.port, 8080);
        assert_eq!(config.pow.nonce_count, 1);
        assert_eq!(config.log_format, "human");
        assert!(!config.claim.require_captcha);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            port = 9999

            [pow]
            difficulty = 16

            [verify]
            miner_individuals = 3
        "#;
        let config = FaucetConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.port, 9999);
        assert_eq!(config.pow.difficulty, 16);
        assert_eq!(config.verify.miner_individuals, 3);
        assert_eq!(config.pow.nonce_count, 1); // default
    }

    #[test]
    fn out_of_range_difficulty_is_rejected() {
        let toml = r#"
            [pow]
            difficulty = 80
        "#;
        let err = FaucetConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn inverted_claim_bounds_are_rejected() {
        let toml = r#"
            [claim]
            min_claim = 100
            max_claim = 50
        "#;
        assert!(FaucetConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = FaucetConfig::from_toml_file("/nonexistent/spigot.toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
