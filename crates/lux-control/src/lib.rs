// SPDX-License-Identifier: Apache-2.0
//! The remote control plane.
//!
//! Sits between the transport (lux-server) and the scene/parameter state:
//! dispatches requests, runs background tasks, throttles change
//! notifications, assembles binary uploads, and drives the render loop.
//! The transport only ever talks to the engine through [`EngineEvent`]s.

mod binary;
mod context;
mod dispatcher;
mod events;
mod frame;
mod loader;
mod operations;
mod render_loop;
mod throttle;

pub use binary::{BinaryUploadTracker, UploadResolver};
pub use context::{EngineCtx, Statistics, VersionInfo};
pub use dispatcher::{Dispatcher, SyncHandler, TaskFactory, METHOD_SCHEMA};
pub use events::{
    ClientId, ClientRegistry, EngineEvent, Outbox, StateReply, TaskFinalize, HTTP_ORIGIN,
};
pub use frame::{encode_frame, EncodedFrame, FramePacer};
pub use loader::{model_from_blob, name_from_path};
pub use operations::register_operations;
pub use render_loop::{Engine, METHOD_IMAGE};
pub use throttle::{
    PendingNotice, Throttle, ThrottleMap, DEFAULT_INTERVAL, INTERACTIVE_INTERVAL, SLOW_INTERVAL,
};
