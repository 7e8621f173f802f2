// SPDX-License-Identifier: Apache-2.0
//! Render backend port.
//!
//! The contract between the scene and whatever actually traces rays.
//! Implementors receive committed structures and render; they own no scene
//! logic and no timing. The engine calls `commit_*` during
//! [`crate::Scene::commit`] and `render`/`pick` from the render loop.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::{Light, Model, ModelId, TransferFunction, Volume};

/// Handle to an aggregate placement group created by the backend.
///
/// Groups are rebuilt wholesale on structural changes; a released handle
/// must not be reused.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupHandle(pub u64);

/// Result of inspecting the scene at a 2D position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickResult {
    /// Whether anything was hit.
    pub hit: bool,
    /// World-space hit position; meaningless when `hit` is false.
    pub position: [f32; 3],
}

/// CPU-visible framebuffer the backend renders into.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    modified: bool,
}

impl FrameBuffer {
    /// Allocate a cleared framebuffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; (width * height * 4) as usize],
            modified: false,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels, row-major.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Overwrite the pixel contents and mark the buffer modified.
    pub fn write(&mut self, rgba: Vec<u8>) {
        debug_assert_eq!(rgba.len(), (self.width * self.height * 4) as usize);
        self.rgba = rgba;
        self.modified = true;
    }

    /// Resize, clearing contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rgba = vec![0; (width * height * 4) as usize];
        self.modified = true;
    }

    /// Whether the contents changed since the flag was last cleared.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clear the modified flag once consumers observed the frame.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }
}

/// Commit/render/pick contract consumed by the scene and the render loop.
pub trait RenderBackend: Send {
    /// Create a fresh aggregate group.
    fn create_group(&mut self) -> GroupHandle;

    /// Release a group and everything placed in it.
    fn release_group(&mut self, group: GroupHandle);

    /// Place a model's geometry into a group with the composed transform.
    fn add_geometry(&mut self, group: GroupHandle, model: ModelId, transform: Mat4);

    /// Place a standalone volume into a group. Volumes bypass per-instance
    /// placement: the backend's instancing does not support them.
    fn add_volume(&mut self, group: GroupHandle, model: ModelId, volume: usize);

    /// Place a unit-box bounding proxy with the given transform.
    fn add_bounding_box(&mut self, group: GroupHandle, model: ModelId, transform: Mat4);

    /// Finalize a group after all placements were added.
    fn commit_group(&mut self, group: GroupHandle);

    /// Upload a model's geometry (initial upload or incremental recommit).
    fn commit_model(&mut self, model: ModelId, data: &Model);

    /// Upload one volume's voxel data.
    fn commit_volume(&mut self, model: ModelId, index: usize, volume: &Volume);

    /// Upload the transfer function table.
    fn commit_transfer_function(&mut self, tf: &TransferFunction);

    /// Upload the scalar field for the current simulation frame.
    fn commit_simulation_frame(&mut self, data: &[f32]);

    /// Upload the light list.
    fn commit_lights(&mut self, lights: &[Light]);

    /// Render the committed state into the framebuffer.
    fn render(&mut self);

    /// Inspect the scene at normalized 2D coordinates.
    fn pick(&self, position: [f32; 2]) -> PickResult;

    /// The framebuffer the backend renders into.
    fn framebuffer(&self) -> &FrameBuffer;

    /// Mutable framebuffer access (resize, modified-flag bookkeeping).
    fn framebuffer_mut(&mut self) -> &mut FrameBuffer;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_write_sets_modified() {
        let mut fb = FrameBuffer::new(2, 2);
        assert!(!fb.is_modified());
        fb.write(vec![255; 16]);
        assert!(fb.is_modified());
        fb.clear_modified();
        assert!(!fb.is_modified());
        assert_eq!(fb.rgba().len(), 16);
    }
}
