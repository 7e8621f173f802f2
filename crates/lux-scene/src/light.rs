// SPDX-License-Identifier: Apache-2.0
//! Light variants.
//!
//! Closed set of light kinds dispatched by explicit tag; the backend
//! receives the whole list and never needs runtime type inspection.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A light source in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Light {
    /// Infinitely distant light with a direction.
    Directional {
        /// Direction the light travels.
        direction: Vec3,
        /// RGB color in `[0, 1]`.
        color: Vec3,
        /// Scalar intensity.
        intensity: f32,
    },
    /// Local light with falloff.
    Point {
        /// Light position.
        position: Vec3,
        /// RGB color in `[0, 1]`.
        color: Vec3,
        /// Scalar intensity.
        intensity: f32,
        /// Distance beyond which the light contributes nothing.
        cutoff: f32,
    },
}
