// SPDX-License-Identifier: Apache-2.0
//! Engine events and the connected-client registry.
//!
//! Everything that wants to touch engine state crosses this channel: socket
//! readers, task watchers, signal handlers. The engine loop is the single
//! consumer, which is what keeps broadcast bookkeeping and throttle state
//! lock-free.

use std::collections::HashMap;

use lux_proto::{RequestId, RpcError};
use lux_tasks::ProgressSnapshot;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::EngineCtx;

/// Deferred tail of a background task, run on the engine loop where scene
/// and backend state live. Produces the response payload.
pub type TaskFinalize = Box<dyn FnOnce(&mut EngineCtx) -> Result<Value, RpcError> + Send>;

/// Reply side of an HTTP state-endpoint request.
pub type StateReply = oneshot::Sender<Result<Value, RpcError>>;

/// Transport-assigned identifier of one connected client.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// Origin id carried by HTTP requests. Transports assign socket clients
/// from 1 upward, so an HTTP-triggered change notification excludes nobody.
pub const HTTP_ORIGIN: ClientId = ClientId(0);

/// Outbound frame queue of one connection; a writer task drains it.
pub type Outbox = mpsc::Sender<String>;

/// Inbound side of the engine loop.
pub enum EngineEvent {
    /// A connection opened and its writer is ready.
    Connected {
        /// New client.
        client: ClientId,
        /// Its outbound frame queue.
        outbox: Outbox,
    },
    /// A connection closed; drop its per-client state.
    Disconnected {
        /// Closed client.
        client: ClientId,
    },
    /// A text frame arrived.
    Text {
        /// Originating client.
        client: ClientId,
        /// Raw frame contents.
        text: String,
    },
    /// A binary frame arrived (upload payload).
    Binary {
        /// Originating client.
        client: ClientId,
        /// Raw frame contents.
        data: Vec<u8>,
    },
    /// A background task reached its terminal state.
    TaskFinished {
        /// Client that issued the task request.
        client: ClientId,
        /// Request id the response must carry.
        request: RequestId,
        /// Finalizer to run on the loop, or the terminal error
        /// (cancellation arrives as its error code).
        result: Result<TaskFinalize, RpcError>,
    },
    /// Periodic progress sample from a running task.
    ProgressTick {
        /// Client that issued the task request.
        client: ClientId,
        /// Request id the progress notification refers to.
        request: RequestId,
        /// Latest unseen progress.
        snapshot: ProgressSnapshot,
    },
    /// HTTP `GET <endpoint>`: read an endpoint's current state.
    StateGet {
        /// Endpoint name, e.g. `camera`.
        endpoint: String,
        /// Where the engine loop posts the outcome.
        reply: StateReply,
    },
    /// HTTP `PUT <endpoint>`: apply a state update.
    StatePut {
        /// Endpoint name.
        endpoint: String,
        /// Requested state.
        payload: Value,
        /// Where the engine loop posts the outcome.
        reply: StateReply,
    },
    /// HTTP `GET <endpoint>/schema`: describe an endpoint.
    SchemaGet {
        /// Endpoint name.
        endpoint: String,
        /// Where the engine loop posts the outcome.
        reply: StateReply,
    },
    /// Stop the engine loop.
    Quit,
}

/// Connected clients and their outboxes. Owned by the engine loop.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, Outbox>,
}

impl ClientRegistry {
    /// Register a connection.
    pub fn insert(&mut self, client: ClientId, outbox: Outbox) {
        debug!(client = client.0, "client connected");
        self.clients.insert(client, outbox);
    }

    /// Drop a connection. Idempotent.
    pub fn remove(&mut self, client: ClientId) {
        if self.clients.remove(&client).is_some() {
            debug!(client = client.0, "client disconnected");
        }
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Queue a frame to one client. A full or closed outbox drops the
    /// frame; the reader side will notice the close and clean up. Direct
    /// sends carry responses, so a drop here is logged loudly.
    pub fn send(&self, client: ClientId, frame: String) {
        if let Some(outbox) = self.clients.get(&client) {
            if outbox.try_send(frame).is_err() {
                warn!(client = client.0, "outbox full or closed, frame dropped");
            }
        }
    }

    /// Queue a frame to every client except `exclude`.
    pub fn broadcast(&self, frame: &str, exclude: Option<ClientId>) {
        for (&client, outbox) in &self.clients {
            if Some(client) == exclude {
                continue;
            }
            if outbox.try_send(frame.to_owned()).is_err() {
                trace!(client = client.0, "outbox full or closed, frame dropped");
            }
        }
    }
}
