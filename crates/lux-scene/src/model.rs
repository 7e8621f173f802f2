// SPDX-License-Identifier: Apache-2.0
//! Model descriptors, instances, and geometry payloads.

use std::sync::{Arc, Mutex};

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a loaded model, unique within the scene for its
/// lifetime.
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ModelId(pub u64);

/// Identifier of one placement of a model, unique within its descriptor.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

/// Affine placement: translation, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Translation component.
    pub translation: Vec3,
    /// Rotation component.
    pub rotation: Quat,
    /// Per-axis scale component.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// The equivalent 4x4 matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Axis-aligned bounding box in model space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        }
    }
}

impl Bounds {
    /// Box center.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Box extent per axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Transform that maps a unit box onto these bounds.
    pub fn proxy_matrix(&self) -> Mat4 {
        let size = self.size().max(Vec3::splat(f32::EPSILON));
        Mat4::from_translation(self.center() - size * 0.5) * Mat4::from_scale(size)
    }
}

/// Geometry payload owned by a model. Opaque to the scene: the commit step
/// only does structural bookkeeping, content validation happened at load
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Geometry {
    /// No renderable surface geometry (volume-only models).
    Empty,
    /// Triangle mesh.
    Mesh {
        /// Vertex positions.
        vertices: Vec<[f32; 3]>,
        /// Triangle vertex indices.
        indices: Vec<[u32; 3]>,
    },
    /// Point primitives with a shared radius.
    Points {
        /// Point positions.
        positions: Vec<[f32; 3]>,
        /// Shared radius.
        radius: f32,
    },
}

/// A standalone volume grid owned by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Grid dimensions in voxels.
    pub dimensions: [u32; 3],
    /// Voxel spacing in world units.
    pub spacing: [f32; 3],
    /// Scalar field, `dimensions` voxels in x-major order.
    pub data: Vec<f32>,
    modified: bool,
}

impl Volume {
    /// Build a volume; starts modified so the first commit uploads it.
    pub fn new(dimensions: [u32; 3], spacing: [f32; 3], data: Vec<f32>) -> Self {
        Self {
            dimensions,
            spacing,
            data,
            modified: true,
        }
    }

    /// Whether the voxel data changed since the last commit.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clear the modified flag after the backend consumed the data.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Replace the voxel data and mark modified.
    pub fn set_data(&mut self, data: Vec<f32>) {
        self.data = data;
        self.modified = true;
    }
}

/// Geometry/volume data plus per-model dirty flags.
#[derive(Debug, Clone)]
pub struct Model {
    geometry: Geometry,
    volumes: Vec<Volume>,
    bounds: Bounds,
    /// True when this model carries a simulation-colored variant that must
    /// be placed in the simulation-only aggregate.
    simulation_variant: bool,
    geometry_dirty: bool,
    volumes_dirty: bool,
    instances_dirty: bool,
}

impl Model {
    /// Build a model from geometry and bounds. Starts clean; the initial
    /// upload rides the structural rebuild triggered by add-model.
    pub fn new(geometry: Geometry, bounds: Bounds) -> Self {
        Self {
            geometry,
            volumes: Vec::new(),
            bounds,
            simulation_variant: false,
            geometry_dirty: false,
            volumes_dirty: false,
            instances_dirty: false,
        }
    }

    /// The geometry payload.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replace the geometry and mark it dirty for incremental recommit.
    pub fn set_geometry(&mut self, geometry: Geometry, bounds: Bounds) {
        self.geometry = geometry;
        self.bounds = bounds;
        self.geometry_dirty = true;
    }

    /// Model-space bounds.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Attached standalone volumes.
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Mutable access to attached volumes.
    pub fn volumes_mut(&mut self) -> &mut [Volume] {
        &mut self.volumes
    }

    /// Attach a volume; adding or removing volumes forces a full rebuild.
    pub fn add_volume(&mut self, volume: Volume) {
        self.volumes.push(volume);
        self.volumes_dirty = true;
    }

    /// Whether this model has a simulation-colored variant.
    pub fn simulation_variant(&self) -> bool {
        self.simulation_variant
    }

    /// Toggle the simulation-colored variant.
    pub fn set_simulation_variant(&mut self, value: bool) {
        self.simulation_variant = value;
    }

    /// Whether the geometry changed without a structural scene change.
    pub fn is_geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    /// Clear the geometry dirty flag after an incremental recommit.
    pub fn clear_geometry_dirty(&mut self) {
        self.geometry_dirty = false;
    }

    /// Whether volumes were added or removed since the last commit.
    pub fn is_volumes_dirty(&self) -> bool {
        self.volumes_dirty
    }

    /// Clear the volume add/remove flag.
    pub fn clear_volumes_dirty(&mut self) {
        self.volumes_dirty = false;
    }

    /// Mark instance placements dirty (transform edits).
    pub fn mark_instances_dirty(&mut self) {
        self.instances_dirty = true;
    }

    /// Whether instance placements changed since the last full pass.
    pub fn is_instances_dirty(&self) -> bool {
        self.instances_dirty
    }

    /// Mark instance placements clean after a full rebuild pass.
    pub fn mark_instances_clean(&mut self) {
        self.instances_dirty = false;
    }
}

/// One placement of a descriptor's geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Id unique within the parent descriptor.
    pub id: InstanceId,
    /// Placement relative to the descriptor transform.
    pub transform: Transform,
    /// Whether the real geometry is rendered.
    pub visible: bool,
    /// Whether a bounding-box proxy is rendered.
    pub bounding_box: bool,
}

impl Instance {
    /// A visible instance at the given placement, no bounding box.
    pub fn at(id: InstanceId, transform: Transform) -> Self {
        Self {
            id,
            transform,
            visible: true,
            bounding_box: false,
        }
    }
}

/// A loaded 3D asset: identity, display flags, placement, and the owned
/// model data.
#[derive(Debug)]
pub struct ModelDescriptor {
    /// Scene-unique id.
    pub id: ModelId,
    /// Display name.
    pub name: String,
    /// Source path when loaded from a remote path.
    pub path: Option<String>,
    /// Whether the real geometry is rendered at all.
    pub visible: bool,
    /// Disabled descriptors are skipped entirely during commit.
    pub enabled: bool,
    /// Whether bounding-box proxies are requested.
    pub bounding_box: bool,
    /// Root placement; composes with each instance transform.
    pub transform: Transform,
    /// Placements of the model. Always at least one.
    pub instances: Vec<Instance>,
    /// Named, loader-defined properties exposed over the control plane.
    pub properties: Value,
    /// Owned geometry/volume data.
    pub model: Model,
    next_instance_id: u64,
}

/// Shared handle to a descriptor. Commit retains clones of these so a
/// concurrent remove cannot deallocate a descriptor mid-pass.
pub type ModelDescriptorHandle = Arc<Mutex<ModelDescriptor>>;

impl ModelDescriptor {
    /// Build a descriptor with one default instance at the origin.
    pub fn new(id: ModelId, name: impl Into<String>, model: Model) -> Self {
        Self {
            id,
            name: name.into(),
            path: None,
            visible: true,
            enabled: true,
            bounding_box: false,
            transform: Transform::default(),
            instances: vec![Instance::at(InstanceId(0), Transform::default())],
            properties: Value::Object(serde_json::Map::new()),
            model,
            next_instance_id: 1,
        }
    }

    /// Add another placement; returns its id.
    pub fn add_instance(&mut self, transform: Transform) -> InstanceId {
        let id = InstanceId(self.next_instance_id);
        self.next_instance_id += 1;
        self.instances.push(Instance::at(id, transform));
        self.model.mark_instances_dirty();
        id
    }

    /// Find an instance by id.
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    /// Summary view for control-plane responses.
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            id: self.id,
            name: self.name.clone(),
            path: self.path.clone(),
            visible: self.visible,
            enabled: self.enabled,
            bounding_box: self.bounding_box,
            transform: self.transform,
            instance_count: self.instances.len(),
            bounds: self.model.bounds(),
        }
    }

    /// Apply a partial remote update. Structural flags are the caller's
    /// concern (the scene marks itself modified).
    pub fn apply_update(&mut self, update: &ModelUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(visible) = update.visible {
            self.visible = visible;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(bounding_box) = update.bounding_box {
            self.bounding_box = bounding_box;
        }
        if let Some(transform) = update.transform {
            self.transform = transform;
        }
    }
}

/// Serializable summary of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelInfo {
    /// Scene-unique id.
    pub id: ModelId,
    /// Display name.
    pub name: String,
    /// Source path, if loaded from one.
    pub path: Option<String>,
    /// Visibility flag.
    pub visible: bool,
    /// Enabled flag.
    pub enabled: bool,
    /// Bounding-box display flag.
    pub bounding_box: bool,
    /// Root placement.
    pub transform: Transform,
    /// Number of instances.
    pub instance_count: usize,
    /// Model-space bounds.
    pub bounds: Bounds,
}

/// Partial update payload for a model descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelUpdate {
    /// Model to update.
    pub id: ModelId,
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// New enabled state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// New bounding-box display state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<bool>,
    /// New root placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

/// Partial update payload for an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstanceUpdate {
    /// Parent model.
    pub model_id: ModelId,
    /// Instance to update.
    pub instance_id: InstanceId,
    /// New placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// New visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// New bounding-box state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique_within_descriptor() {
        let mut desc = ModelDescriptor::new(
            ModelId(1),
            "m",
            Model::new(Geometry::Empty, Bounds::default()),
        );
        let a = desc.add_instance(Transform::default());
        let b = desc.add_instance(Transform::default());
        assert_ne!(a, b);
        assert_eq!(desc.instances.len(), 3); // default + two
        assert!(desc.model.is_instances_dirty());
    }

    #[test]
    fn apply_update_touches_only_provided_fields() {
        let mut desc = ModelDescriptor::new(
            ModelId(1),
            "before",
            Model::new(Geometry::Empty, Bounds::default()),
        );
        desc.apply_update(&ModelUpdate {
            id: ModelId(1),
            visible: Some(false),
            ..ModelUpdate::default()
        });
        assert!(!desc.visible);
        assert_eq!(desc.name, "before");
        assert!(desc.enabled);
    }

    #[test]
    fn bounds_proxy_matrix_maps_unit_box() {
        let bounds = Bounds {
            min: Vec3::new(-1.0, -1.0, -1.0),
            max: Vec3::new(3.0, 1.0, 1.0),
        };
        let m = bounds.proxy_matrix();
        let lo = m.transform_point3(Vec3::ZERO);
        let hi = m.transform_point3(Vec3::ONE);
        assert!((lo - bounds.min).length() < 1e-5);
        assert!((hi - bounds.max).length() < 1e-5);
    }

    #[test]
    fn set_geometry_marks_dirty() {
        let mut model = Model::new(Geometry::Empty, Bounds::default());
        assert!(!model.is_geometry_dirty());
        model.set_geometry(
            Geometry::Points {
                positions: vec![[0.0; 3]],
                radius: 0.1,
            },
            Bounds::default(),
        );
        assert!(model.is_geometry_dirty());
    }
}
