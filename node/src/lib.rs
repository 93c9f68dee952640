//! The spigot faucet node.
//!
//! Ties the leaf crates together: the session registry and share
//! verification coordinator behind [`PowService`], the websocket front
//! door in [`PowServer`], plus configuration, logging, metrics, and the
//! claim-executor and gating seams.

pub mod claim;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gating;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod service;
pub mod session;

pub use claim::{ClaimExecutor, ClaimReceipt, DevClaimExecutor};
pub use client::{ClientHandle, ClientId};
pub use config::FaucetConfig;
pub use error::NodeError;
pub use gating::{CaptchaGate, NoopGate, PolicyRejection, SessionGate};
pub use logging::{init_logging, LogFormat};
pub use metrics::FaucetMetrics;
pub use server::PowServer;
pub use service::{PowService, SlashReason};
pub use session::{Session, SessionRegistry};
