// SPDX-License-Identifier: Apache-2.0
//! JSON text-frame encoding for requests, responses, and notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::RpcError;

/// Request identifier. Requests without an id are fire-and-forget.
pub type RequestId = u64;

/// Inbound client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id; `None` marks a fire-and-forget notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Name of the remote operation.
    pub method: String,
    /// Structured parameter map for the operation.
    #[serde(default)]
    pub params: Value,
}

/// Either a successful result or a structured error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    /// Successful result payload.
    Result(Value),
    /// Structured failure.
    Error(RpcError),
}

/// Outbound response to a single request. Exactly one per request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Result or error body.
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    /// Build a success response.
    pub fn result(id: RequestId, value: Value) -> Self {
        Self {
            id,
            body: ResponseBody::Result(value),
        }
    }

    /// Build an error response.
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            id,
            body: ResponseBody::Error(error),
        }
    }
}

/// Server-initiated notification broadcast to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification method name (e.g. `set-camera`).
    pub method: String,
    /// Latest state payload. Notifications are last-write-wins signals, not
    /// an ordered log.
    pub params: Value,
}

/// Failure while decoding an inbound text frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl DecodeError {
    /// Try to recover the request id from a malformed frame so a parse-error
    /// response can still be correlated.
    pub fn recover_id(text: &str) -> Option<RequestId> {
        let value: Value = serde_json::from_str(text).ok()?;
        value.get("id")?.as_u64()
    }
}

/// Decode one inbound text frame into a [`Request`].
pub fn decode_request(text: &str) -> Result<Request, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a response as a text frame.
///
/// Encoding a [`Response`] cannot fail: the body is already a
/// `serde_json::Value`, so result-encoding failures are caught earlier and
/// reported with their own code.
pub fn encode_response(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        // Value-only payloads make this unreachable; keep a valid frame anyway.
        format!(
            "{{\"id\":{},\"error\":{{\"code\":{},\"message\":\"encode failure\"}}}}",
            response.id,
            crate::codes::RESULT_ENCODING
        )
    })
}

/// Encode a notification as a text frame.
pub fn encode_notification(notification: &Notification) -> String {
    serde_json::to_string(notification)
        .unwrap_or_else(|_| "{\"method\":\"\",\"params\":null}".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_without_id_is_fire_and_forget() {
        let req = decode_request(r#"{"method":"quit","params":null}"#).expect("decode");
        assert_eq!(req.id, None);
        assert_eq!(req.method, "quit");
    }

    #[test]
    fn request_with_id_round_trips() {
        let req = Request {
            id: Some(3),
            method: "get-camera".into(),
            params: json!({}),
        };
        let text = serde_json::to_string(&req).expect("encode");
        let back = decode_request(&text).expect("decode");
        assert_eq!(back, req);
    }

    #[test]
    fn response_frames_carry_result_or_error() {
        let ok = encode_response(&Response::result(1, json!(true)));
        assert!(ok.contains("\"result\":true"));
        assert!(!ok.contains("error"));

        let err = encode_response(&Response::error(2, RpcError::model_not_found()));
        assert!(err.contains("\"error\""));
        assert!(err.contains("-12345"));
    }

    #[test]
    fn id_recovery_from_malformed_request() {
        // valid JSON, invalid request shape (method missing)
        let text = r#"{"id": 9, "params": {}}"#;
        assert!(decode_request(text).is_err());
        assert_eq!(DecodeError::recover_id(text), Some(9));
        // not JSON at all
        assert_eq!(DecodeError::recover_id("nope"), None);
    }
}
