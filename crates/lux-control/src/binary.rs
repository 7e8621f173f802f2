// SPDX-License-Identifier: Apache-2.0
//! Assembly of chunked binary uploads into a model blob.
//!
//! Protocol: the client issues a `request-model-upload` task declaring the
//! total size, then alternates `chunk` notifications (declaring the id of
//! the next chunk) with raw binary frames. Chunks are appended in arrival
//! order; when the declared total is reached the blob resolves the waiting
//! task. One active upload per client; a newer request replaces the older
//! one, whose task then observes a dropped resolver.

use std::collections::HashMap;
use std::sync::Arc;

use lux_proto::{RequestId, RpcError};
use lux_tasks::Progress;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::ClientId;

/// Side the upload task awaits: the assembled blob or a protocol failure.
pub type UploadResolver = oneshot::Sender<Result<Vec<u8>, RpcError>>;

#[derive(Debug)]
struct Upload {
    /// Request id of the upload task, for targeted teardown.
    request: RequestId,
    expected: usize,
    buffer: Vec<u8>,
    /// Id declared for the next binary frame; cleared once data arrives.
    declared_chunk: Option<String>,
    resolver: Option<UploadResolver>,
    progress: Arc<Progress>,
}

/// Per-client upload state. Owned by the engine loop.
#[derive(Debug, Default)]
pub struct BinaryUploadTracker {
    max_bytes: usize,
    uploads: HashMap<ClientId, Upload>,
}

impl BinaryUploadTracker {
    /// Tracker with an upper bound on the declared upload size.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            uploads: HashMap::new(),
        }
    }

    /// Begin an upload for a client. Rejects empty and oversized
    /// declarations before any task state exists.
    pub fn begin(
        &mut self,
        client: ClientId,
        request: RequestId,
        expected: usize,
        resolver: UploadResolver,
        progress: Arc<Progress>,
    ) -> Result<(), RpcError> {
        if expected == 0 {
            return Err(RpcError::invalid_params("upload size must be non-zero"));
        }
        if expected > self.max_bytes {
            return Err(RpcError::invalid_params(format!(
                "upload of {expected} bytes exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        if self.uploads.remove(&client).is_some() {
            // the replaced task sees its resolver drop and terminates
            warn!(client = client.0, "upload replaced by a newer request");
        }
        self.uploads.insert(
            client,
            Upload {
                request,
                expected,
                buffer: Vec::with_capacity(expected),
                declared_chunk: None,
                resolver: Some(resolver),
                progress,
            },
        );
        Ok(())
    }

    /// Declare the id of the next binary frame.
    pub fn declare_chunk(&mut self, client: ClientId, id: String) {
        match self.uploads.get_mut(&client) {
            Some(upload) => upload.declared_chunk = Some(id),
            None => warn!(client = client.0, "chunk declared without an active upload"),
        }
    }

    /// Append a binary frame to the client's upload.
    ///
    /// Frames without an active upload or a declared chunk are dropped.
    /// Overflowing the declared total fails the upload.
    pub fn append(&mut self, client: ClientId, data: &[u8]) {
        let Some(upload) = self.uploads.get_mut(&client) else {
            warn!(client = client.0, "binary frame without an active upload");
            return;
        };
        let Some(chunk) = upload.declared_chunk.take() else {
            warn!(client = client.0, "binary frame without a declared chunk");
            return;
        };

        upload.buffer.extend_from_slice(data);
        debug!(
            client = client.0,
            chunk,
            received = upload.buffer.len(),
            expected = upload.expected,
            "chunk received"
        );

        if upload.buffer.len() > upload.expected {
            let err = RpcError::invalid_params(format!(
                "received {} bytes, expected {}",
                upload.buffer.len(),
                upload.expected
            ));
            if let Some(resolver) = upload.resolver.take() {
                let _ = resolver.send(Err(err));
            }
            self.uploads.remove(&client);
            return;
        }

        upload.progress.update(
            "receiving data",
            upload.buffer.len() as f32 / upload.expected as f32,
        );

        if upload.buffer.len() == upload.expected {
            let Some(upload) = self.uploads.remove(&client) else {
                return;
            };
            if let Some(resolver) = upload.resolver {
                let _ = resolver.send(Ok(upload.buffer));
            }
        }
    }

    /// Drop a client's upload state, if any. Idempotent; the waiting task
    /// observes the dropped resolver.
    pub fn remove(&mut self, client: ClientId) {
        self.uploads.remove(&client);
    }

    /// Drop the upload belonging to one finished task. Leaves any newer
    /// upload of the same client untouched. Idempotent.
    pub fn remove_task(&mut self, client: ClientId, request: RequestId) {
        if self
            .uploads
            .get(&client)
            .is_some_and(|upload| upload.request == request)
        {
            self.uploads.remove(&client);
        }
    }
}
