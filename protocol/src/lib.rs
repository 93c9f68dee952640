//! JSON wire protocol spoken over the miner websocket.
//!
//! Every client request is a [`RequestFrame`] carrying an `action` string
//! and an optional request id. The node answers with a [`ResponseFrame`]
//! echoing that id in `rsp`, or emits unsolicited pushes that omit `rsp`
//! entirely. Payloads are typed per action and decoded on demand from the
//! raw `data` value.

mod error_code;
mod frame;
mod payload;

pub use error_code::ErrorCode;
pub use frame::{RequestFrame, ResponseFrame};
pub use payload::{
    ClaimRewardsRequest, ClaimStatus, ClaimTxPush, ClientFaucetConfig, CloseSessionAck,
    ErrorData, FoundShareRequest, ResumeSessionAck, ResumeSessionRequest, SessionKillPush,
    StartSessionAck, StartSessionRequest, UpdateBalancePush, VerifyPush, VerifyResultRequest,
};

/// Action strings accepted from miners.
pub mod actions {
    pub const GET_CONFIG: &str = "getConfig";
    pub const START_SESSION: &str = "startSession";
    pub const RESUME_SESSION: &str = "resumeSession";
    pub const RECOVER_SESSION: &str = "recoverSession";
    pub const FOUND_SHARE: &str = "foundShare";
    pub const VERIFY_RESULT: &str = "verifyResult";
    pub const CLOSE_SESSION: &str = "closeSession";
    pub const CLAIM_REWARDS: &str = "claimRewards";
}

/// Action strings used for server-initiated pushes.
pub mod pushes {
    pub const CONFIG: &str = "config";
    pub const UPDATE_BALANCE: &str = "updateBalance";
    pub const VERIFY: &str = "verify";
    pub const SESSION_KILL: &str = "sessionKill";
    pub const CLAIM_TX: &str = "claimTx";
}
