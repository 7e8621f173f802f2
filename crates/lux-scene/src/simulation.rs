// SPDX-License-Identifier: Apache-2.0
//! Simulation handler: time-varying scalar fields feeding the transfer
//! function.

use serde::{Deserialize, Serialize};

/// Distribution of scalar values for the currently loaded frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin counts.
    pub bins: Vec<u64>,
    /// Scalar range covered by the bins.
    pub range: [f32; 2],
}

/// Provider of per-frame scalar data.
///
/// `frame_data` may return `None` when the requested frame is not ready
/// yet; commit skips the upload gracefully and retries next frame.
pub trait SimulationHandler: Send {
    /// Frame whose data was last produced, if any.
    fn current_frame(&self) -> Option<u32>;

    /// Number of scalars per frame.
    fn frame_size(&self) -> usize;

    /// Produce the scalar field for `frame`, or `None` if unavailable.
    fn frame_data(&mut self, frame: u32) -> Option<Vec<f32>>;

    /// Histogram of the current frame's values.
    fn histogram(&self) -> Histogram;
}
