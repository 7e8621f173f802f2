// SPDX-License-Identifier: Apache-2.0
//! Scene model and commit protocol.
//!
//! The scene is the mutable graph of model descriptors, instances, lights,
//! the transfer function, and an optional simulation handler. Mutations
//! accumulate dirty flags; [`Scene::commit`] reconciles them into
//! backend-visible structures through the [`RenderBackend`] port with
//! minimal re-submission cost. The backend itself (the thing that traces
//! rays) is an external collaborator behind the port trait.

mod backend;
pub mod headless;
mod light;
mod model;
mod scene;
mod simulation;
mod transfer_function;

pub use backend::{FrameBuffer, GroupHandle, PickResult, RenderBackend};
pub use headless::HeadlessBackend;
pub use light::Light;
pub use model::{
    Bounds, Geometry, Instance, InstanceId, InstanceUpdate, Model, ModelDescriptor,
    ModelDescriptorHandle, ModelId, ModelInfo, ModelUpdate, Transform, Volume,
};
pub use scene::{CommitInputs, CommitResult, Scene};
pub use simulation::{Histogram, SimulationHandler};
pub use transfer_function::TransferFunction;
