//! Recovery/claim token codec.
//!
//! Token format: `base64(JSON(snapshot)) + "|" + base64(HMAC-SHA256(secret,
//! encoded))`. Verification recomputes the MAC over the received encoded
//! part; the comparison is constant-time via [`hmac::Mac::verify_slice`].
//! Malformed input of any shape comes back as a typed error, never a panic.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use spigot_types::{FaucetAmount, SessionId, TargetAddress, Timestamp};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Not `encoded|mac`, or a part that is not valid base64/JSON.
    #[error("malformed token")]
    Malformed,

    /// The MAC does not match the encoded payload.
    #[error("token signature mismatch")]
    MacMismatch,
}

/// The minimal projection of a session that a token carries.
///
/// Deliberately excludes the nonce cursor and client binding: a recovered
/// session restarts at nonce zero, and bindings never outlive a connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    #[serde(rename = "startTime")]
    pub start_time: Timestamp,
    #[serde(rename = "targetAddr")]
    pub target_addr: TargetAddress,
    /// Base64-encoded preimage bytes, exactly as pushed to miners.
    pub preimage: String,
    pub balance: FaucetAmount,
    pub claimable: bool,
}

/// Signs and verifies session snapshots with a server-held secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length")
    }

    /// Serialize and sign a snapshot.
    pub fn sign(&self, snapshot: &SessionSnapshot) -> String {
        let json = serde_json::to_vec(snapshot).expect("snapshot is always serializable");
        let encoded = BASE64.encode(json);

        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        let tag = mac.finalize().into_bytes();

        format!("{}|{}", encoded, BASE64.encode(tag))
    }

    /// Verify a token and return the embedded snapshot.
    pub fn verify(&self, token: &str) -> Result<SessionSnapshot, TokenError> {
        let (encoded, tag_b64) = token.split_once('|').ok_or(TokenError::Malformed)?;
        if encoded.is_empty() {
            return Err(TokenError::Malformed);
        }
        let tag = BASE64.decode(tag_b64).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        mac.verify_slice(&tag).map_err(|_| TokenError::MacMismatch)?;

        let json = BASE64.decode(encoded).map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            id: SessionId::random(),
            start_time: Timestamp::new(1_700_000_000),
            target_addr: TargetAddress::parse("0x5a0b54d5dc17e0aadc383d2db43b0a0d3e029c4c")
                .unwrap(),
            preimage: "3q2+7w==".to_string(),
            balance: FaucetAmount::new(1_000_000_000_000),
            claimable: false,
        }
    }

    #[test]
    fn sign_verify_round_trip() {
        let codec = TokenCodec::new("test-secret");
        let snap = snapshot();
        let token = codec.sign(&snap);
        let back = codec.verify(&token).expect("own token should verify");
        assert_eq!(snap, back);
    }

    #[test]
    fn wrong_secret_fails() {
        let token = TokenCodec::new("secret-a").sign(&snapshot());
        assert!(matches!(
            TokenCodec::new("secret-b").verify(&token),
            Err(TokenError::MacMismatch)
        ));
    }

    #[test]
    fn flipping_any_payload_byte_fails() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.sign(&snapshot());
        let split = token.find('|').unwrap();

        for i in 0..split {
            let mut bytes = token.clone().into_bytes();
            // stay within the base64 alphabet so decoding still succeeds
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(codec.verify(&tampered).is_err(), "byte {} accepted", i);
        }
    }

    #[test]
    fn truncated_token_is_malformed() {
        let codec = TokenCodec::new("test-secret");
        assert!(matches!(codec.verify(""), Err(TokenError::Malformed)));
        assert!(matches!(codec.verify("abc"), Err(TokenError::Malformed)));
        assert!(matches!(codec.verify("|"), Err(TokenError::Malformed)));
    }

    #[test]
    fn garbage_mac_is_malformed() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.sign(&snapshot());
        let encoded = token.split('|').next().unwrap();
        let garbled = format!("{}|$$$not-base64$$$", encoded);
        assert!(matches!(codec.verify(&garbled), Err(TokenError::Malformed)));
    }

    #[test]
    fn valid_mac_over_non_snapshot_json_is_malformed() {
        let codec = TokenCodec::new("test-secret");
        let encoded = BASE64.encode(b"{\"not\":\"a snapshot\"}");
        let mut mac = codec.mac();
        mac.update(encoded.as_bytes());
        let tag = mac.finalize().into_bytes();
        let token = format!("{}|{}", encoded, BASE64.encode(tag));
        assert!(matches!(codec.verify(&token), Err(TokenError::Malformed)));
    }
}
