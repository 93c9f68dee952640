use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable error identifiers returned in error responses.
///
/// The wire strings are part of the client contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Frame was not parseable or named an unknown action.
    #[serde(rename = "INVALID_REQUEST")]
    InvalidRequest,
    /// Target address failed syntactic validation.
    #[serde(rename = "INVALID_ADDR")]
    InvalidAddr,
    /// Session id was not parseable.
    #[serde(rename = "INVALID_SESSIONID")]
    InvalidSessionId,
    /// No live session with the given id.
    #[serde(rename = "SESSION_NOT_FOUND")]
    SessionNotFound,
    /// Connection already has a bound session.
    #[serde(rename = "DUPLICATE_SESSION")]
    DuplicateSession,
    /// Recovery token refers to a session outside the recovery window.
    #[serde(rename = "SESSION_TIMEOUT")]
    SessionTimeout,
    /// Session exists but is closed, killed or otherwise unusable.
    #[serde(rename = "INVALID_SESSION")]
    InvalidSession,
    /// Submitted share was rejected before verification.
    #[serde(rename = "INVALID_SHARE")]
    InvalidShare,
    /// Payload was syntactically valid JSON but semantically unusable.
    #[serde(rename = "INVALID_DATA")]
    InvalidData,
    /// Claim request could not be honored.
    #[serde(rename = "INVALID_CLAIM")]
    InvalidClaim,
    /// A captcha token is required for this operation.
    #[serde(rename = "NEED_HCAPTCHA")]
    NeedCaptcha,
    /// The supplied captcha token did not verify.
    #[serde(rename = "INVALID_HCAPTCHA")]
    InvalidCaptcha,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidAddr => "INVALID_ADDR",
            ErrorCode::InvalidSessionId => "INVALID_SESSIONID",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::DuplicateSession => "DUPLICATE_SESSION",
            ErrorCode::SessionTimeout => "SESSION_TIMEOUT",
            ErrorCode::InvalidSession => "INVALID_SESSION",
            ErrorCode::InvalidShare => "INVALID_SHARE",
            ErrorCode::InvalidData => "INVALID_DATA",
            ErrorCode::InvalidClaim => "INVALID_CLAIM",
            ErrorCode::NeedCaptcha => "NEED_HCAPTCHA",
            ErrorCode::InvalidCaptcha => "INVALID_HCAPTCHA",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_are_stable() {
        let json = serde_json::to_string(&ErrorCode::InvalidSessionId).unwrap();
        assert_eq!(json, "\"INVALID_SESSIONID\"");
        let json = serde_json::to_string(&ErrorCode::NeedCaptcha).unwrap();
        assert_eq!(json, "\"NEED_HCAPTCHA\"");
    }

    #[test]
    fn display_matches_serde() {
        for code in [
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidAddr,
            ErrorCode::InvalidSessionId,
            ErrorCode::SessionNotFound,
            ErrorCode::DuplicateSession,
            ErrorCode::SessionTimeout,
            ErrorCode::InvalidSession,
            ErrorCode::InvalidShare,
            ErrorCode::InvalidData,
            ErrorCode::InvalidClaim,
            ErrorCode::NeedCaptcha,
            ErrorCode::InvalidCaptcha,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{code}\""));
        }
    }
}
