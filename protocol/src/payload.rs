use serde::{Deserialize, Serialize};
use spigot_types::{FaucetAmount, Nonce, SessionId, ShareId};

use crate::ErrorCode;

/// Payload of an `error` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: ErrorCode,
    pub message: String,
}

/// Faucet parameters pushed to every client on connect and returned
/// from `getConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFaucetConfig {
    /// Hash parameter string miners must echo with every share.
    pub pow_params: String,
    /// Nonces required per share.
    pub nonce_count: u32,
    pub share_reward: FaucetAmount,
    pub min_claim: FaucetAmount,
    pub max_claim: FaucetAmount,
    /// Seconds of inactivity before a session is closed server-side.
    pub idle_timeout: u64,
    /// Seconds a closed session's rewards stay claimable.
    pub claim_timeout: u64,
    pub require_captcha: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionAck {
    pub session_id: SessionId,
    pub start_time: u64,
    /// Base64 session preimage the miner hashes against.
    pub preimage: String,
    pub target_addr: String,
    /// Signed recovery token for reconnecting after a dropped socket.
    pub recovery: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSessionRequest {
    /// Raw id string; the node parses it so an unparseable id can be
    /// answered with its own error code.
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSessionAck {
    /// Highest nonce the session has accepted so far; the miner resumes
    /// its search above this.
    pub last_nonce: Nonce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundShareRequest {
    pub nonces: Vec<Nonce>,
    /// Hash parameter string, must match the faucet's current params.
    pub params: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResultRequest {
    pub share_id: ShareId,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionAck {
    pub claimable: bool,
    /// Signed claim token, present when the balance cleared the minimum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub balance: FaucetAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardsRequest {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_token: Option<String>,
}

/// Push sent whenever a session's balance changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBalancePush {
    pub balance: FaucetAmount,
    /// Fresh recovery token reflecting the new balance.
    pub recovery: String,
    pub reason: String,
}

/// Push asking a miner to cross-verify another session's share.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPush {
    pub share_id: ShareId,
    pub preimage: String,
    pub nonces: Vec<Nonce>,
}

/// Push informing a client its session has been terminated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKillPush {
    pub level: String,
    pub message: String,
    /// Claim token, present when the killed session still had a
    /// claimable balance (timeout evictions, not slashes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Push reporting progress of a payout transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTxPush {
    pub session: SessionId,
    pub status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_share_uses_wire_names() {
        let req: FoundShareRequest = serde_json::from_str(
            r#"{"nonces":[12,99],"params":"argon2id|4096|1|1|32","hashrate":123.5}"#,
        )
        .unwrap();
        assert_eq!(req.nonces, vec![12, 99]);
        assert_eq!(req.hashrate, Some(123.5));
    }

    #[test]
    fn verify_result_round_trips() {
        let share_id = ShareId::random();
        let req = VerifyResultRequest {
            share_id,
            is_valid: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"shareId\""));
        assert!(json.contains("\"isValid\":false"));
        let back: VerifyResultRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.share_id, share_id);
        assert!(!back.is_valid);
    }

    #[test]
    fn session_kill_omits_absent_token() {
        let push = SessionKillPush {
            level: "session".to_string(),
            message: "session timed out".to_string(),
            token: None,
        };
        let json = serde_json::to_string(&push).unwrap();
        assert!(!json.contains("token"));
    }

    #[test]
    fn claim_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ClaimStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }
}
