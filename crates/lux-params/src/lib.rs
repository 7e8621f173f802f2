// SPDX-License-Identifier: Apache-2.0
//! Typed, observable parameter objects.
//!
//! Every remotely controllable knob of the engine lives in one of the
//! parameter objects below. Objects are constructed once at process start,
//! mutated for the process lifetime, and replaced whole on remote updates:
//! either the incoming payload parses and passes validation, or nothing
//! changes. Every mutation sets a modified flag that the owner clears once
//! observers have been notified.

mod objects;
mod observable;
mod schema;

pub use objects::{
    AnimationParams, ApplicationParams, CameraParams, GeometryParams, RenderingParams, SceneParams,
    StreamParams, VolumeParams,
};
pub use observable::{Observable, ParamError, ParamObject};
pub use schema::{schema_for, schema_for_value};

/// Process-scoped registry owning one instance of every parameter object.
///
/// The registry is passed explicitly to whoever needs it; there are no
/// module-level singletons, so tests can stand up several independent
/// engines in one process.
#[derive(Debug, Default)]
pub struct ParamRegistry {
    /// Application-level settings (stream FPS, image quality, viewport).
    pub application: Observable<ApplicationParams>,
    /// Animation playback state. Highly interactive.
    pub animation: Observable<AnimationParams>,
    /// Renderer selection and quality settings.
    pub rendering: Observable<RenderingParams>,
    /// Camera pose and projection type.
    pub camera: Observable<CameraParams>,
    /// Scene-wide settings (color map, environment).
    pub scene: Observable<SceneParams>,
    /// Volume sampling settings.
    pub volume: Observable<VolumeParams>,
    /// Geometry generation settings.
    pub geometry: Observable<GeometryParams>,
    /// Display-wall streaming settings.
    pub stream: Observable<StreamParams>,
}
