// SPDX-License-Identifier: Apache-2.0
//! Headless backend: records committed structure and renders flat frames.
//!
//! Stands in for a real ray tracer in tests and headless deployments. Every
//! port call is recorded so tests can assert exactly what a commit pass
//! submitted.

use glam::Mat4;
use std::collections::HashMap;

use crate::{
    FrameBuffer, GroupHandle, Light, Model, ModelId, PickResult, RenderBackend, TransferFunction,
    Volume,
};

/// One placement recorded in a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Real geometry with a composed transform.
    Geometry(ModelId, Mat4),
    /// Standalone volume, placed directly.
    Volume(ModelId, usize),
    /// Bounding-box proxy.
    BoundingBox(ModelId, Mat4),
}

/// Recording backend with a flat-color renderer.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_group: u64,
    /// Live groups and their placements, in submission order.
    pub groups: HashMap<GroupHandle, Vec<Placement>>,
    /// Groups that were committed at least once.
    pub committed_groups: Vec<GroupHandle>,
    /// Groups that were released.
    pub released_groups: Vec<GroupHandle>,
    /// Models uploaded via `commit_model`.
    pub committed_models: Vec<ModelId>,
    /// Volume uploads as (model, index, voxel count).
    pub committed_volumes: Vec<(ModelId, usize, usize)>,
    /// Number of transfer function uploads.
    pub transfer_function_commits: usize,
    /// Sizes of uploaded simulation frames.
    pub simulation_frames: Vec<usize>,
    /// Last uploaded light list.
    pub lights: Vec<Light>,
    /// Number of rendered frames.
    pub frames_rendered: u64,
    /// Flat color rendered into the framebuffer.
    pub clear_color: [u8; 4],
    framebuffer: FrameBuffer,
}

impl HeadlessBackend {
    /// Backend with the given framebuffer size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            clear_color: [16, 16, 24, 255],
            framebuffer: FrameBuffer::new(width, height),
            ..Self::default()
        }
    }

    /// Placements of the most recently created group, for assertions.
    pub fn group(&self, group: GroupHandle) -> &[Placement] {
        self.groups.get(&group).map_or(&[], Vec::as_slice)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_group(&mut self) -> GroupHandle {
        let handle = GroupHandle(self.next_group);
        self.next_group += 1;
        self.groups.insert(handle, Vec::new());
        handle
    }

    fn release_group(&mut self, group: GroupHandle) {
        self.groups.remove(&group);
        self.released_groups.push(group);
    }

    fn add_geometry(&mut self, group: GroupHandle, model: ModelId, transform: Mat4) {
        if let Some(placements) = self.groups.get_mut(&group) {
            placements.push(Placement::Geometry(model, transform));
        }
    }

    fn add_volume(&mut self, group: GroupHandle, model: ModelId, volume: usize) {
        if let Some(placements) = self.groups.get_mut(&group) {
            placements.push(Placement::Volume(model, volume));
        }
    }

    fn add_bounding_box(&mut self, group: GroupHandle, model: ModelId, transform: Mat4) {
        if let Some(placements) = self.groups.get_mut(&group) {
            placements.push(Placement::BoundingBox(model, transform));
        }
    }

    fn commit_group(&mut self, group: GroupHandle) {
        self.committed_groups.push(group);
    }

    fn commit_model(&mut self, model: ModelId, _data: &Model) {
        self.committed_models.push(model);
    }

    fn commit_volume(&mut self, model: ModelId, index: usize, volume: &Volume) {
        self.committed_volumes.push((model, index, volume.data.len()));
    }

    fn commit_transfer_function(&mut self, _tf: &TransferFunction) {
        self.transfer_function_commits += 1;
    }

    fn commit_simulation_frame(&mut self, data: &[f32]) {
        self.simulation_frames.push(data.len());
    }

    fn commit_lights(&mut self, lights: &[Light]) {
        self.lights = lights.to_vec();
    }

    fn render(&mut self) {
        self.frames_rendered += 1;
        let pixels = (self.framebuffer.width() * self.framebuffer.height()) as usize;
        let mut rgba = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            rgba.extend_from_slice(&self.clear_color);
        }
        self.framebuffer.write(rgba);
    }

    fn pick(&self, position: [f32; 2]) -> PickResult {
        // no tracing: report a miss at the queried plane position
        PickResult {
            hit: false,
            position: [position[0], position[1], 0.0],
        }
    }

    fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    fn framebuffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.framebuffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_marks_framebuffer_modified() {
        let mut backend = HeadlessBackend::new(4, 2);
        backend.render();
        assert_eq!(backend.frames_rendered, 1);
        assert!(backend.framebuffer().is_modified());
        assert_eq!(backend.framebuffer().rgba().len(), 4 * 2 * 4);
    }

    #[test]
    fn released_groups_drop_their_placements() {
        let mut backend = HeadlessBackend::new(1, 1);
        let g = backend.create_group();
        backend.add_geometry(g, ModelId(1), Mat4::IDENTITY);
        assert_eq!(backend.group(g).len(), 1);
        backend.release_group(g);
        assert!(backend.group(g).is_empty());
    }
}
