// SPDX-License-Identifier: Apache-2.0
//! The scene aggregate and its commit protocol.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};

use tracing::debug;

use crate::{
    GroupHandle, Light, Model, ModelDescriptor, ModelDescriptorHandle, ModelId, RenderBackend,
    SimulationHandler, TransferFunction,
};

/// External state the commit step needs from the parameter registry.
///
/// Passed by value so the scene stays decoupled from the parameter crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitInputs {
    /// Simulation frame requested by the animation parameters.
    pub animation_frame: u32,
    /// Whether the volume parameters changed since the last commit.
    pub volume_params_modified: bool,
}

/// What a commit pass actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitResult {
    /// A full structural rebuild of the aggregate groups happened.
    pub rebuilt: bool,
    /// At least one individually dirty model was recommitted.
    pub updated: bool,
}

impl CommitResult {
    /// Whether the pass was a no-op (the steady-state fast path).
    pub fn is_noop(&self) -> bool {
        !self.rebuilt && !self.updated
    }
}

/// The mutable scene graph.
///
/// Structural changes (add/remove/visibility) set the scene-wide modified
/// flag and force a full rebuild on the next commit; geometry edits set
/// per-model dirty flags and recommit incrementally.
pub struct Scene {
    descriptors: RwLock<Vec<ModelDescriptorHandle>>,
    /// Descriptors referenced by the current backend groups. Retained so a
    /// concurrent remove cannot deallocate one mid-commit; rebuilt every
    /// full pass.
    active: Vec<ModelDescriptorHandle>,
    modified: AtomicBool,
    lights: Vec<Light>,
    lights_dirty: bool,
    transfer_function: TransferFunction,
    simulation: Option<Box<dyn SimulationHandler>>,
    loaded_frame: Option<u32>,
    next_model_id: AtomicU64,
    root: Option<GroupHandle>,
    simulation_root: Option<GroupHandle>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_descriptor(handle: &ModelDescriptorHandle) -> MutexGuard<'_, ModelDescriptor> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(Vec::new()),
            active: Vec::new(),
            modified: AtomicBool::new(false),
            lights: Vec::new(),
            lights_dirty: false,
            transfer_function: TransferFunction::default(),
            simulation: None,
            loaded_frame: None,
            next_model_id: AtomicU64::new(1),
            root: None,
            simulation_root: None,
        }
    }

    /// Add a model; returns the descriptor handle. Structural change.
    pub fn add_model(&self, name: impl Into<String>, model: Model) -> ModelDescriptorHandle {
        let id = ModelId(self.next_model_id.fetch_add(1, Ordering::Relaxed));
        let handle = Arc::new(Mutex::new(ModelDescriptor::new(id, name, model)));
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&handle));
        self.mark_modified();
        handle
    }

    /// Remove a model by id. Unknown ids are a no-op, not an error.
    pub fn remove_model(&self, id: ModelId) -> bool {
        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = descriptors.len();
        descriptors.retain(|handle| lock_descriptor(handle).id != id);
        let removed = descriptors.len() != before;
        drop(descriptors);
        if removed {
            self.mark_modified();
        }
        removed
    }

    /// Find a descriptor by id.
    pub fn model(&self, id: ModelId) -> Option<ModelDescriptorHandle> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|handle| lock_descriptor(handle).id == id)
            .cloned()
    }

    /// Snapshot of all descriptor handles.
    pub fn models(&self) -> Vec<ModelDescriptorHandle> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mark a structural change; the next commit performs a full rebuild.
    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    /// Whether a structural change is pending.
    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    /// The transfer function.
    pub fn transfer_function(&self) -> &TransferFunction {
        &self.transfer_function
    }

    /// Mutable transfer function access.
    pub fn transfer_function_mut(&mut self) -> &mut TransferFunction {
        &mut self.transfer_function
    }

    /// Install or remove the simulation handler.
    pub fn set_simulation_handler(&mut self, handler: Option<Box<dyn SimulationHandler>>) {
        self.simulation = handler;
        self.loaded_frame = None;
    }

    /// The simulation handler, if any.
    pub fn simulation_handler(&self) -> Option<&dyn SimulationHandler> {
        self.simulation.as_deref()
    }

    /// Add a light. Lights are re-uploaded wholesale on the next commit.
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
        self.lights_dirty = true;
    }

    /// Remove all lights.
    pub fn clear_lights(&mut self) {
        self.lights.clear();
        self.lights_dirty = true;
    }

    /// Reconcile accumulated mutations into backend-visible structures.
    ///
    /// Steady state (nothing dirty) returns without touching the backend
    /// and costs O(descriptor count). Geometry-only edits recommit the
    /// affected models, then re-run the placement pass so bounding-box
    /// proxies reflect the new sizes. Structural changes and volume
    /// add/remove rebuild the aggregate groups from scratch.
    pub fn commit(&mut self, backend: &mut dyn RenderBackend, inputs: CommitInputs) -> CommitResult {
        let rebuild = self.is_modified();
        let volumes_changed = self.commit_volume_data(backend, inputs.volume_params_modified);

        self.commit_simulation_data(backend, inputs.animation_frame);
        self.commit_transfer_function_data(backend);
        if self.lights_dirty {
            backend.commit_lights(&self.lights);
            self.lights_dirty = false;
        }

        // copy the list so add/remove can proceed under the write lock
        // while we talk to the backend; next frame picks up any change
        let descriptors: Vec<ModelDescriptorHandle> = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut updated = false;
        if !rebuild && !volumes_changed {
            for handle in &descriptors {
                let mut desc = lock_descriptor(handle);
                if desc.model.is_geometry_dirty() {
                    backend.commit_model(desc.id, &desc.model);
                    desc.model.clear_geometry_dirty();
                    // keep going into the placement pass so bounding-box
                    // proxies pick up the new model size
                    updated = true;
                }
            }
            if !updated {
                return CommitResult::default();
            }
        }

        self.active.clear();
        if let Some(root) = self.root.take() {
            backend.release_group(root);
        }
        if let Some(group) = self.simulation_root.take() {
            backend.release_group(group);
        }
        let root = backend.create_group();
        let mut simulation_root: Option<GroupHandle> = None;

        for handle in &descriptors {
            let mut desc = lock_descriptor(handle);
            if !desc.enabled {
                continue;
            }
            // retain until the next full pass; see `active`
            self.active.push(Arc::clone(handle));

            debug!(model = %desc.name, id = desc.id.0, "committing model");
            let base = desc.transform.matrix();

            if desc.visible && desc.model.simulation_variant() {
                let group = *simulation_root.get_or_insert_with(|| backend.create_group());
                backend.add_geometry(group, desc.id, base);
            }

            // volumes go straight into the root group: instancing does not
            // support them
            if desc.visible {
                for index in 0..desc.model.volumes().len() {
                    backend.add_volume(root, desc.id, index);
                }
            }

            let proxy = desc.model.bounds().proxy_matrix();
            for instance in &desc.instances {
                let composed = base * instance.transform.matrix();
                if desc.bounding_box && instance.bounding_box {
                    backend.add_bounding_box(root, desc.id, composed * proxy);
                }
                if desc.visible && instance.visible {
                    backend.add_geometry(root, desc.id, composed);
                }
            }

            desc.model.mark_instances_clean();
        }

        backend.commit_group(root);
        self.root = Some(root);
        if let Some(group) = simulation_root {
            backend.commit_group(group);
        }
        self.simulation_root = simulation_root;

        self.modified.store(false, Ordering::Release);
        CommitResult {
            rebuilt: rebuild || volumes_changed,
            updated,
        }
    }

    /// Upload dirty volumes; returns whether volumes were added or removed
    /// anywhere (which forces a structural rebuild).
    fn commit_volume_data(
        &mut self,
        backend: &mut dyn RenderBackend,
        volume_params_modified: bool,
    ) -> bool {
        let mut rebuild = false;
        let descriptors = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in descriptors.iter() {
            let mut desc = lock_descriptor(handle);
            if desc.model.is_volumes_dirty() {
                rebuild = true;
                desc.model.clear_volumes_dirty();
            }
            let id = desc.id;
            for (index, volume) in desc.model.volumes_mut().iter_mut().enumerate() {
                if volume.is_modified() || rebuild || volume_params_modified {
                    backend.commit_volume(id, index, volume);
                    volume.clear_modified();
                }
            }
        }
        rebuild
    }

    /// Upload the scalar field for the requested animation frame.
    ///
    /// Skipped when the frame is already loaded; skipped gracefully when
    /// the handler cannot produce the frame yet.
    fn commit_simulation_data(&mut self, backend: &mut dyn RenderBackend, frame: u32) {
        let Some(handler) = self.simulation.as_mut() else {
            return;
        };
        if self.loaded_frame == Some(frame) {
            return;
        }
        let Some(data) = handler.frame_data(frame) else {
            debug!(frame, "simulation frame not ready, skipping");
            return;
        };
        backend.commit_simulation_frame(&data);
        self.loaded_frame = Some(frame);
    }

    fn commit_transfer_function_data(&mut self, backend: &mut dyn RenderBackend) {
        if !self.transfer_function.is_modified() {
            return;
        }
        backend.commit_transfer_function(&self.transfer_function);
        self.transfer_function.clear_modified();
    }
}
