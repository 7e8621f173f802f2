// SPDX-License-Identifier: Apache-2.0
//! Mutable engine state handed to operation handlers.

use std::time::Instant;

use lux_params::ParamRegistry;
use lux_proto::{encode_notification, Notification};
use lux_scene::{RenderBackend, Scene};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{BinaryUploadTracker, ClientId, ClientRegistry, EngineEvent, PendingNotice, ThrottleMap};

/// Render statistics exposed on the `statistics` endpoint and broadcast at
/// the slow tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Statistics {
    /// Smoothed frames per second of the render loop.
    pub fps: f32,
    /// Frames rendered since start.
    pub frames_rendered: u64,
    /// Number of models in the scene.
    pub model_count: usize,
}

/// Build metadata exposed on the `version` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VersionInfo {
    /// Semver major.
    pub major: u32,
    /// Semver minor.
    pub minor: u32,
    /// Semver patch.
    pub patch: u32,
}

impl VersionInfo {
    /// Version of this build, from the crate manifest.
    pub fn current() -> Self {
        Self {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        }
    }
}

/// Everything an operation handler may touch. Owned by the engine loop;
/// handlers run inline on it, so there is no locking at this level.
pub struct EngineCtx {
    /// Parameter objects.
    pub params: ParamRegistry,
    /// The scene graph.
    pub scene: Scene,
    /// Render backend the scene commits into.
    pub backend: Box<dyn RenderBackend>,
    /// Connected clients and their outboxes.
    pub clients: ClientRegistry,
    /// Per-endpoint notification throttles.
    pub throttles: ThrottleMap,
    /// Chunked binary upload assembly.
    pub uploads: BinaryUploadTracker,
    /// Render statistics.
    pub stats: Statistics,
    /// Build version.
    pub version: VersionInfo,
    /// Sender side of the engine loop, for task watchers.
    pub events: mpsc::Sender<EngineEvent>,
    /// Cleared to stop the engine loop.
    pub keep_running: bool,
    /// Set by state-mutating operations; consumed by the next loop tick.
    pub render_requested: bool,
}

impl EngineCtx {
    /// Fresh context around a backend. `max_binary_bytes` bounds uploads.
    pub fn new(
        backend: Box<dyn RenderBackend>,
        max_binary_bytes: usize,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            params: ParamRegistry::default(),
            scene: Scene::new(),
            backend,
            clients: ClientRegistry::default(),
            throttles: ThrottleMap::default(),
            uploads: BinaryUploadTracker::new(max_binary_bytes),
            stats: Statistics::default(),
            version: VersionInfo::current(),
            events,
            keep_running: true,
            render_requested: false,
        }
    }

    /// Ask the loop to render on its next tick.
    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    /// Broadcast an endpoint's new state as a `set-<endpoint>` notification,
    /// excluding the originating client, subject to the endpoint throttle.
    pub fn notify_endpoint(&mut self, endpoint: &str, state: Value, exclude: Option<ClientId>) {
        let frame = encode_notification(&Notification {
            method: format!("set-{endpoint}"),
            params: state,
        });
        let notice = PendingNotice { frame, exclude };
        if let Some(due) = self.throttles.submit(endpoint, Instant::now(), notice) {
            self.clients.broadcast(&due.frame, due.exclude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_scene::HeadlessBackend;
    use serde_json::json;

    fn ctx() -> EngineCtx {
        let (tx, _rx) = mpsc::channel(8);
        EngineCtx::new(Box::new(HeadlessBackend::new(4, 4)), 1024, tx)
    }

    #[tokio::test]
    async fn notify_endpoint_excludes_the_origin() {
        let mut ctx = ctx();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        ctx.clients.insert(ClientId(1), tx_a);
        ctx.clients.insert(ClientId(2), tx_b);

        ctx.notify_endpoint("camera", json!({"fov": 60.0}), Some(ClientId(1)));
        assert!(rx_a.try_recv().is_err());
        let frame = rx_b.try_recv().expect("broadcast frame");
        assert!(frame.contains("set-camera"));
        assert!(frame.contains("fov"));
    }

    #[test]
    fn version_info_matches_manifest() {
        let v = VersionInfo::current();
        assert_eq!(v.major, 0);
        assert_eq!(v.minor, 1);
    }
}
