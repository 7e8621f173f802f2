// SPDX-License-Identifier: Apache-2.0
//! Structured error type surfaced to remote clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Numeric error codes carried by [`RpcError`].
///
/// Application codes are negative and disjoint from the reserved JSON-RPC
/// range so clients can always tell a dispatch failure from a domain
/// failure.
pub mod codes {
    /// Request params failed to deserialize into the expected shape.
    pub const INVALID_PARAMS: i32 = -32602;
    /// No operation is registered under the requested method name.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// The inbound frame was not valid JSON or not a request at all.
    pub const PARSE_ERROR: i32 = -32700;
    /// The referenced model id is not present in the scene.
    pub const MODEL_NOT_FOUND: i32 = -12345;
    /// The referenced instance id is not present on the model.
    pub const INSTANCE_NOT_FOUND: i32 = -12346;
    /// A successful result could not be encoded into a response.
    pub const RESULT_ENCODING: i32 = -12347;
    /// No schema is registered under the requested endpoint name.
    pub const SCHEMA_NOT_FOUND: i32 = -12348;
    /// A parameter object rejected the update (parse or predicate failure).
    pub const PARAM_UPDATE_REJECTED: i32 = -12349;
    /// The operation needs a collaborator that is not present (e.g. a
    /// simulation handler for histogram queries).
    pub const NOT_SUPPORTED: i32 = -12350;
    /// A task was cancelled cooperatively before producing a result.
    pub const TASK_CANCELLED: i32 = -12351;
}

/// Application-level failure carrying a message, a numeric code, and an
/// optional structured data payload.
///
/// This is the one error shape that crosses the network boundary; every
/// entry point converts whatever went wrong into one of these.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct RpcError {
    /// Numeric code, see [`codes`].
    pub code: i32,
    /// Human-readable description.
    pub message: String,
    /// Optional structured payload with failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Build an error with a code and message, no data payload.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a structured data payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Request params failed to deserialize.
    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("invalid params: {detail}"))
    }

    /// Unknown method name.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("method not found: {method}"),
        )
    }

    /// Unknown model id.
    pub fn model_not_found() -> Self {
        Self::new(codes::MODEL_NOT_FOUND, "model not found")
    }

    /// Unknown instance id.
    pub fn instance_not_found() -> Self {
        Self::new(codes::INSTANCE_NOT_FOUND, "instance not found")
    }

    /// Result value could not be serialized into a response.
    pub fn result_encoding(detail: impl std::fmt::Display) -> Self {
        Self::new(
            codes::RESULT_ENCODING,
            format!("failed to encode result: {detail}"),
        )
    }

    /// Unknown schema endpoint.
    pub fn schema_not_found(endpoint: &str) -> Self {
        Self::new(
            codes::SCHEMA_NOT_FOUND,
            format!("no schema for endpoint: {endpoint}"),
        )
    }

    /// Whole-object parameter update was rejected.
    pub fn param_update_rejected(endpoint: &str) -> Self {
        Self::new(
            codes::PARAM_UPDATE_REJECTED,
            format!("update rejected for {endpoint}"),
        )
    }

    /// Required collaborator is absent.
    pub fn not_supported(what: &str) -> Self {
        Self::new(codes::NOT_SUPPORTED, format!("not supported: {what}"))
    }

    /// Cooperative cancellation acknowledgment.
    pub fn cancelled() -> Self {
        Self::new(codes::TASK_CANCELLED, "task cancelled")
    }
}
