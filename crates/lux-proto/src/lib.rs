// SPDX-License-Identifier: Apache-2.0
//! Wire schema for the lux control plane.
//!
//! Clients drive the engine over a message-oriented channel carrying JSON
//! text frames: requests (with an id) expect exactly one response; requests
//! without an id are fire-and-forget; the server pushes `set-<endpoint>`
//! notifications and task progress updates. Binary frames ride the same
//! connection out-of-band and are correlated by a previously declared chunk
//! id; they never appear in this schema.
//!
//! This crate contains no I/O. Transport lives in lux-server; dispatch lives
//! in lux-control.

mod error;
mod wire;

pub use error::{codes, RpcError};
pub use wire::{
    decode_request, encode_notification, encode_response, DecodeError, Notification, Request,
    RequestId, Response, ResponseBody,
};

/// Progress notification payload pushed to the requesting client while an
/// asynchronous task is running.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressUpdate {
    /// Id of the request whose task is reporting progress.
    pub id: u64,
    /// Human-readable description of the current phase.
    pub operation: String,
    /// Completion fraction in `[0.0, 1.0]`.
    pub amount: f32,
}

/// Method name used for task progress notifications.
pub const METHOD_PROGRESS: &str = "progress";

/// Method name used for explicit task cancellation.
pub const METHOD_CANCEL: &str = "cancel";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_update_round_trips() {
        let p = ProgressUpdate {
            id: 7,
            operation: "loading mesh".into(),
            amount: 0.25,
        };
        let text = serde_json::to_string(&p).expect("encode");
        let back: ProgressUpdate = serde_json::from_str(&text).expect("decode");
        assert_eq!(back, p);
    }
}
