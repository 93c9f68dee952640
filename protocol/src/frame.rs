use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::ErrorData;
use crate::ErrorCode;

/// Envelope for every client-to-server message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Request id, echoed back in the response. Requests without an id
    /// receive no response at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Envelope for server-to-client messages.
///
/// Responses carry the originating request id in `rsp`; pushes omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsp: Option<u64>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseFrame {
    pub fn ok(rsp: u64, data: Option<Value>) -> Self {
        ResponseFrame {
            rsp: Some(rsp),
            action: "ok".to_string(),
            data,
        }
    }

    pub fn error(rsp: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        let data = ErrorData {
            code,
            message: message.into(),
        };
        ResponseFrame {
            rsp: Some(rsp),
            action: "error".to_string(),
            data: serde_json::to_value(data).ok(),
        }
    }

    pub fn push(action: &str, data: Value) -> Self {
        ResponseFrame {
            rsp: None,
            action: action.to_string(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_id_parses() {
        let frame: RequestFrame =
            serde_json::from_str(r#"{"action":"closeSession"}"#).unwrap();
        assert!(frame.id.is_none());
        assert_eq!(frame.action, "closeSession");
        assert!(frame.data.is_none());
    }

    #[test]
    fn response_omits_absent_fields() {
        let frame = ResponseFrame::push("config", serde_json::json!({"nonceCount": 2}));
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("rsp"));
        assert!(json.contains("\"action\":\"config\""));
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let frame = ResponseFrame::error(7, ErrorCode::SessionNotFound, "no such session");
        assert_eq!(frame.rsp, Some(7));
        assert_eq!(frame.action, "error");
        let data: ErrorData = serde_json::from_value(frame.data.unwrap()).unwrap();
        assert_eq!(data.code, ErrorCode::SessionNotFound);
        assert_eq!(data.message, "no such session");
    }
}
