//! Gating hooks for session start and claims.
//!
//! Gating modules (captcha, identity scoring, allowlists) only ever
//! contribute a pass/fail decision and a reward-factor multiplier at these
//! hook points. The core aggregates hook results; it never knows what a
//! gate actually checks.

use spigot_protocol::ErrorCode;
use spigot_types::TargetAddress;

use crate::session::Session;

/// A gate's reason for refusing an operation, answered to the client as a
/// typed error with the connection kept open.
#[derive(Debug, Clone)]
pub struct PolicyRejection {
    pub code: ErrorCode,
    pub message: String,
}

impl PolicyRejection {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Hook points a gating module can implement.
///
/// Defaults pass everything through at full reward.
pub trait SessionGate: Send + Sync {
    /// Runs before a session is created. A rejection aborts the start.
    fn on_session_start(
        &self,
        _target_addr: &TargetAddress,
        _captcha_token: Option<&str>,
    ) -> Result<(), PolicyRejection> {
        Ok(())
    }

    /// Runs before a payout is handed to the claim executor.
    fn on_claim(&self, _captcha_token: Option<&str>) -> Result<(), PolicyRejection> {
        Ok(())
    }

    /// Per-share reward multiplier in percent. 100 is identity.
    fn reward_factor(&self, _session: &Session) -> u32 {
        100
    }
}

/// Gate that passes everything.
pub struct NoopGate;

impl SessionGate for NoopGate {}

/// Requires a captcha token on session start and claim.
///
/// Token validation is a stand-in: any non-empty token passes. A real
/// deployment wires the verification service call in here.
pub struct CaptchaGate {
    required: bool,
}

impl CaptchaGate {
    pub fn new(required: bool) -> Self {
        Self { required }
    }

    fn check(&self, token: Option<&str>) -> Result<(), PolicyRejection> {
        if !self.required {
            return Ok(());
        }
        match token {
            None => Err(PolicyRejection::new(
                ErrorCode::NeedCaptcha,
                "captcha token required",
            )),
            Some("") => Err(PolicyRejection::new(
                ErrorCode::InvalidCaptcha,
                "captcha verification failed",
            )),
            Some(_) => Ok(()),
        }
    }
}

impl SessionGate for CaptchaGate {
    fn on_session_start(
        &self,
        _target_addr: &TargetAddress,
        captcha_token: Option<&str>,
    ) -> Result<(), PolicyRejection> {
        self.check(captcha_token)
    }

    fn on_claim(&self, captcha_token: Option<&str>) -> Result<(), PolicyRejection> {
        self.check(captcha_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_gate_passes_everything() {
        let addr: TargetAddress = format!("0x{:040x}", 7u8).parse().unwrap();
        assert!(NoopGate.on_session_start(&addr, None).is_ok());
        assert!(NoopGate.on_claim(None).is_ok());
    }

    #[test]
    fn captcha_gate_demands_a_token() {
        let gate = CaptchaGate::new(true);
        let addr: TargetAddress = format!("0x{:040x}", 7u8).parse().unwrap();

        let err = gate.on_session_start(&addr, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NeedCaptcha);

        let err = gate.on_claim(Some("")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCaptcha);

        assert!(gate.on_session_start(&addr, Some("token")).is_ok());
    }

    #[test]
    fn disabled_captcha_gate_is_transparent() {
        let gate = CaptchaGate::new(false);
        assert!(gate.on_claim(None).is_ok());
    }
}
