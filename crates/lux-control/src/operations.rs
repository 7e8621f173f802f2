// SPDX-License-Identifier: Apache-2.0
//! The built-in operation surface.
//!
//! Everything a remote client can do is registered here: state endpoint
//! get/set pairs with schemas, model and instance manipulation, inspection,
//! the fire-and-forget controls, and the three long-running tasks. The
//! dispatcher stays generic; this module is the catalogue.

use std::sync::{MutexGuard, PoisonError};

use lux_params::{
    schema_for, schema_for_value, CameraParams, Observable, ParamObject, ParamRegistry,
    RenderingParams,
};
use lux_proto::{codes, RequestId, RpcError};
use lux_scene::{
    InstanceUpdate, ModelDescriptor, ModelDescriptorHandle, ModelId, ModelUpdate, TransferFunction,
};
use lux_tasks::TaskHandle;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::{
    frame::encode_frame,
    loader::{model_from_blob, name_from_path},
    ClientId, Dispatcher, EngineCtx, TaskFinalize,
};

/// Base point radius before the geometry multiplier.
const POINT_RADIUS: f32 = 0.01;

fn lock_descriptor(handle: &ModelDescriptorHandle) -> MutexGuard<'_, ModelDescriptor> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::result_encoding)
}

fn point_radius(ctx: &EngineCtx) -> f32 {
    POINT_RADIUS * ctx.params.geometry.get().radius_multiplier
}

/// Register the complete operation surface on a dispatcher.
pub fn register_operations(dispatcher: &mut Dispatcher) {
    register_state_endpoints(dispatcher);
    register_model_operations(dispatcher);
    register_queries(dispatcher);
    register_controls(dispatcher);
    register_tasks(dispatcher);
}

/// Bind a parameter object as a `get-`/`set-` endpoint pair plus schema.
///
/// SET parses and validates into a scratch copy first; on success the new
/// state is broadcast to every other client through the endpoint throttle
/// and a re-render is requested.
fn bind_state<T: ParamObject>(
    dispatcher: &mut Dispatcher,
    accessor: fn(&mut ParamRegistry) -> &mut Observable<T>,
    validate: fn(&T) -> bool,
    after_set: fn(&mut EngineCtx),
) {
    let endpoint = T::endpoint();
    dispatcher.register_schema(endpoint, schema_for::<T>());
    dispatcher.register_sync(format!("get-{endpoint}"), move |ctx, _client, _params| {
        Ok(accessor(&mut ctx.params).to_value())
    });
    dispatcher.register_sync(format!("set-{endpoint}"), move |ctx, client, params| {
        accessor(&mut ctx.params)
            .apply(&params, validate)
            .map_err(|err| {
                RpcError::new(
                    codes::PARAM_UPDATE_REJECTED,
                    format!("update rejected for {endpoint}: {err}"),
                )
            })?;
        let state = accessor(&mut ctx.params).to_value();
        ctx.notify_endpoint(endpoint, state, Some(client));
        after_set(ctx);
        ctx.request_render();
        Ok(Value::Bool(true))
    });
}

fn no_hook(_ctx: &mut EngineCtx) {}

fn rebuild_scene(ctx: &mut EngineCtx) {
    ctx.scene.mark_modified();
}

fn apply_viewport(ctx: &mut EngineCtx) {
    let [width, height] = ctx.params.application.get().viewport;
    let fb = ctx.backend.framebuffer();
    if fb.width() != width || fb.height() != height {
        ctx.backend.framebuffer_mut().resize(width, height);
    }
}

fn register_state_endpoints(dispatcher: &mut Dispatcher) {
    bind_state(dispatcher, |p| &mut p.application, |_| true, apply_viewport);
    bind_state(dispatcher, |p| &mut p.animation, |_| true, no_hook);
    bind_state(
        dispatcher,
        |p| &mut p.rendering,
        RenderingParams::current_is_supported,
        no_hook,
    );
    bind_state(
        dispatcher,
        |p| &mut p.camera,
        CameraParams::current_is_supported,
        no_hook,
    );
    bind_state(dispatcher, |p| &mut p.scene, |_| true, no_hook);
    bind_state(dispatcher, |p| &mut p.volume, |_| true, rebuild_scene);
    bind_state(dispatcher, |p| &mut p.geometry, |_| true, rebuild_scene);
    bind_state(dispatcher, |p| &mut p.stream, |_| true, no_hook);

    // the transfer function lives in the scene, not the registry
    dispatcher.register_schema(
        "transfer-function",
        schema_for_value(
            "transfer-function",
            &serde_json::to_value(TransferFunction::default()).unwrap_or(Value::Null),
        ),
    );
    dispatcher.register_sync("get-transfer-function", |ctx, _client, _params| {
        to_value(ctx.scene.transfer_function())
    });
    dispatcher.register_sync("set-transfer-function", |ctx, client, params| {
        let mut tf: TransferFunction = serde_json::from_value(params).map_err(|err| {
            RpcError::new(
                codes::PARAM_UPDATE_REJECTED,
                format!("update rejected for transfer-function: {err}"),
            )
        })?;
        tf.mark_modified();
        *ctx.scene.transfer_function_mut() = tf;
        let state = to_value(ctx.scene.transfer_function())?;
        ctx.notify_endpoint("transfer-function", state, Some(client));
        ctx.request_render();
        Ok(Value::Bool(true))
    });

    // the scene endpoint exposes the model list
    dispatcher.register_schema("scene", schema_for_value("scene", &json!({ "models": [] })));
    dispatcher.register_sync("get-scene", |ctx, _client, _params| {
        let models: Vec<_> = ctx
            .scene
            .models()
            .iter()
            .map(|handle| lock_descriptor(handle).info())
            .collect();
        to_value(&json!({ "models": models }))
    });
    dispatcher.register_sync("set-scene", |ctx, client, params| {
        #[derive(Deserialize)]
        struct SceneState {
            #[serde(default)]
            models: Vec<ModelUpdate>,
        }
        let state: SceneState = serde_json::from_value(params).map_err(|err| {
            RpcError::new(
                codes::PARAM_UPDATE_REJECTED,
                format!("update rejected for scene: {err}"),
            )
        })?;
        for update in &state.models {
            // unknown ids are skipped, matching remove-model semantics
            if let Some(handle) = ctx.scene.model(update.id) {
                lock_descriptor(&handle).apply_update(update);
            }
        }
        ctx.scene.mark_modified();
        let models: Vec<_> = ctx
            .scene
            .models()
            .iter()
            .map(|handle| lock_descriptor(handle).info())
            .collect();
        ctx.notify_endpoint("scene", json!({ "models": models }), Some(client));
        ctx.request_render();
        Ok(Value::Bool(true))
    });

    dispatcher.register_sync("get-statistics", |ctx, _client, _params| {
        to_value(&ctx.stats)
    });
    dispatcher.register_sync("get-version", |ctx, _client, _params| {
        to_value(&ctx.version)
    });
}

#[derive(Debug, Deserialize)]
struct ModelRef {
    id: ModelId,
}

#[derive(Debug, Deserialize)]
struct ModelProperties {
    id: ModelId,
    properties: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InstanceRange {
    id: ModelId,
    /// Half-open `[start, end)` into the instance list; clamped.
    #[serde(default)]
    result_range: Option<[usize; 2]>,
}

fn register_model_operations(dispatcher: &mut Dispatcher) {
    dispatcher.register_sync("get-model-properties", |ctx, _client, params| {
        let params: ModelRef =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let handle = ctx
            .scene
            .model(params.id)
            .ok_or_else(RpcError::model_not_found)?;
        let properties = lock_descriptor(&handle).properties.clone();
        Ok(properties)
    });

    dispatcher.register_sync("set-model-properties", |ctx, _client, params| {
        let params: ModelProperties =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let handle = ctx
            .scene
            .model(params.id)
            .ok_or_else(RpcError::model_not_found)?;
        lock_descriptor(&handle).properties = params.properties;
        ctx.request_render();
        Ok(Value::Bool(true))
    });

    dispatcher.register_sync("model-properties-schema", |ctx, _client, params| {
        let params: ModelRef =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let handle = ctx
            .scene
            .model(params.id)
            .ok_or_else(RpcError::model_not_found)?;
        let properties = lock_descriptor(&handle).properties.clone();
        Ok(schema_for_value("model-properties", &properties))
    });

    dispatcher.register_sync("update-model", |ctx, _client, params| {
        let update: ModelUpdate =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let handle = ctx
            .scene
            .model(update.id)
            .ok_or_else(RpcError::model_not_found)?;
        lock_descriptor(&handle).apply_update(&update);
        // visibility and placement changes are structural
        ctx.scene.mark_modified();
        ctx.request_render();
        Ok(Value::Bool(true))
    });

    dispatcher.register_sync("remove-model", |ctx, _client, params| {
        let params: ModelRef =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let removed = ctx.scene.remove_model(params.id);
        ctx.request_render();
        Ok(Value::Bool(removed))
    });

    dispatcher.register_sync("get-instances", |ctx, _client, params| {
        let params: InstanceRange =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let handle = ctx
            .scene
            .model(params.id)
            .ok_or_else(RpcError::model_not_found)?;
        let desc = lock_descriptor(&handle);
        let len = desc.instances.len();
        let [start, end] = params.result_range.unwrap_or([0, len]);
        let start = start.min(len);
        let end = end.clamp(start, len);
        to_value(&desc.instances[start..end])
    });

    dispatcher.register_sync("update-instance", |ctx, _client, params| {
        let update: InstanceUpdate =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        let handle = ctx
            .scene
            .model(update.model_id)
            .ok_or_else(RpcError::model_not_found)?;
        {
            let mut desc = lock_descriptor(&handle);
            let instance = desc
                .instance_mut(update.instance_id)
                .ok_or_else(RpcError::instance_not_found)?;
            if let Some(transform) = update.transform {
                instance.transform = transform;
            }
            if let Some(visible) = update.visible {
                instance.visible = visible;
            }
            if let Some(bounding_box) = update.bounding_box {
                instance.bounding_box = bounding_box;
            }
            desc.model.mark_instances_dirty();
        }
        ctx.scene.mark_modified();
        ctx.request_render();
        Ok(Value::Bool(true))
    });
}

#[derive(Debug, Deserialize)]
struct InspectParams {
    /// Normalized screen position.
    position: [f32; 2],
}

fn register_queries(dispatcher: &mut Dispatcher) {
    dispatcher.register_sync("image", |ctx, _client, _params| {
        to_value(&encode_frame(ctx.backend.framebuffer())?)
    });

    dispatcher.register_sync("inspect", |ctx, _client, params| {
        let params: InspectParams =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        to_value(&ctx.backend.pick(params.position))
    });

    dispatcher.register_sync("simulation-histogram", |ctx, _client, _params| {
        match ctx.scene.simulation_handler() {
            Some(handler) => to_value(&handler.histogram()),
            None => Err(RpcError::not_supported("no simulation loaded")),
        }
    });
}

#[derive(Debug, Deserialize)]
struct ChunkParams {
    id: String,
}

fn register_controls(dispatcher: &mut Dispatcher) {
    dispatcher.register_sync("quit", |ctx, _client, _params| {
        ctx.keep_running = false;
        Ok(Value::Null)
    });

    dispatcher.register_sync("reset-camera", |ctx, _client, _params| {
        ctx.params.camera.with_mut(|camera| {
            let initial = CameraParams::default();
            camera.position = initial.position;
            camera.target = initial.target;
            camera.up = initial.up;
            camera.fov = initial.fov;
        });
        let state = ctx.params.camera.to_value();
        // a server-initiated change, so nobody is excluded
        ctx.notify_endpoint(CameraParams::endpoint(), state, None);
        ctx.request_render();
        Ok(Value::Null)
    });

    dispatcher.register_sync("chunk", |ctx, client, params| {
        let params: ChunkParams =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        ctx.uploads.declare_chunk(client, params.id);
        Ok(Value::Null)
    });

    dispatcher.register_sync("stream-to", |ctx, client, params| {
        ctx.params.stream.apply(&params, |_| true).map_err(|err| {
            RpcError::new(
                codes::PARAM_UPDATE_REJECTED,
                format!("update rejected for stream-parameters: {err}"),
            )
        })?;
        let state = ctx.params.stream.to_value();
        ctx.notify_endpoint("stream-parameters", state, Some(client));
        Ok(Value::Bool(true))
    });
}

#[derive(Debug, Deserialize)]
struct ModelSource {
    #[serde(default)]
    name: Option<String>,
    path: String,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    #[serde(default)]
    name: Option<String>,
    /// Declared total size of the blob in bytes.
    size: usize,
}

#[derive(Debug, Deserialize)]
struct SnapshotParams {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

fn add_model_finalize(name: String, model: lux_scene::Model) -> TaskFinalize {
    Box::new(move |ctx: &mut EngineCtx| {
        let handle = ctx.scene.add_model(name, model);
        ctx.request_render();
        let info = lock_descriptor(&handle).info();
        to_value(&info)
    })
}

fn register_tasks(dispatcher: &mut Dispatcher) {
    dispatcher.register_task("add-model", |ctx, _client, _request, params| {
        let source: ModelSource =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        if source.path.is_empty() {
            return Err(RpcError::invalid_params("path must not be empty"));
        }
        let radius = point_radius(ctx);
        Ok(lux_tasks::spawn(move |task| async move {
            task.progress("reading file", 0.1);
            let bytes = tokio::fs::read(&source.path).await.map_err(|err| {
                RpcError::invalid_params(format!("cannot read {}: {err}", source.path))
            })?;
            task.ensure_active()?;
            task.progress("parsing points", 0.6);
            let model = model_from_blob(&bytes, radius)?;
            let name = source.name.unwrap_or_else(|| name_from_path(&source.path));
            Ok(add_model_finalize(name, model))
        }))
    });

    dispatcher.register_task("request-model-upload", upload_factory);

    dispatcher.register_task("snapshot", |_ctx, _client, _request, params| {
        let params: SnapshotParams =
            serde_json::from_value(params).map_err(RpcError::invalid_params)?;
        Ok(lux_tasks::spawn(move |task| async move {
            task.progress("rendering snapshot", 0.5);
            let finalize: TaskFinalize = Box::new(move |ctx: &mut EngineCtx| {
                let fb = ctx.backend.framebuffer();
                let live = [fb.width(), fb.height()];
                let wanted = [
                    params.width.unwrap_or(live[0]),
                    params.height.unwrap_or(live[1]),
                ];
                if wanted != live {
                    ctx.backend.framebuffer_mut().resize(wanted[0], wanted[1]);
                }
                ctx.backend.render();
                let frame = encode_frame(ctx.backend.framebuffer());
                if wanted != live {
                    // restore the interactive viewport and its contents
                    ctx.backend.framebuffer_mut().resize(live[0], live[1]);
                    ctx.backend.render();
                }
                to_value(&frame?)
            });
            Ok(finalize)
        }))
    });
}

fn upload_factory(
    ctx: &mut EngineCtx,
    client: ClientId,
    request: RequestId,
    params: Value,
) -> Result<TaskHandle<TaskFinalize>, RpcError> {
    let params: UploadRequest = serde_json::from_value(params).map_err(RpcError::invalid_params)?;
    let radius = point_radius(ctx);
    let name = params.name.unwrap_or_else(|| "upload".to_owned());
    let (resolver, blob_rx) = oneshot::channel();

    let handle = lux_tasks::spawn(move |task| async move {
        task.progress("waiting for data", 0.0);
        let blob: Vec<u8> = match blob_rx.await {
            Ok(result) => result?,
            // resolver dropped: upload replaced or client disconnected
            Err(_) => return Err(RpcError::cancelled()),
        };
        task.ensure_active()?;
        task.progress("building model", 0.9);
        let model = model_from_blob(&blob, radius)?;
        Ok(add_model_finalize(name, model))
    });

    if let Err(err) = ctx
        .uploads
        .begin(client, request, params.size, resolver, handle.progress())
    {
        handle.cancel();
        return Err(err);
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineEvent;
    use lux_scene::{Bounds, Geometry, HeadlessBackend, Model};
    use tokio::sync::mpsc;

    struct Rig {
        dispatcher: Dispatcher,
        ctx: EngineCtx,
        events: mpsc::Receiver<EngineEvent>,
        outbox: mpsc::Receiver<String>,
        client: ClientId,
    }

    fn rig() -> Rig {
        let (event_tx, events) = mpsc::channel(64);
        let mut ctx = EngineCtx::new(Box::new(HeadlessBackend::new(4, 4)), 1 << 20, event_tx);
        let (tx, outbox) = mpsc::channel(64);
        let client = ClientId(1);
        ctx.clients.insert(client, tx);
        let mut dispatcher = Dispatcher::new();
        register_operations(&mut dispatcher);
        Rig {
            dispatcher,
            ctx,
            events,
            outbox,
            client,
        }
    }

    fn call(rig: &mut Rig, id: u64, method: &str, params: Value) -> Value {
        let text = serde_json::to_string(&json!({"id": id, "method": method, "params": params}))
            .expect("encode request");
        rig.dispatcher.dispatch_text(&mut rig.ctx, rig.client, &text);
        loop {
            let frame = rig.outbox.try_recv().expect("a frame was sent");
            let value: Value = serde_json::from_str(&frame).expect("valid frame");
            // skip broadcast notifications aimed at other clients
            if value.get("id").is_some() {
                return value;
            }
        }
    }

    fn fire(rig: &mut Rig, method: &str, params: Value) {
        let text = serde_json::to_string(&json!({"method": method, "params": params}))
            .expect("encode request");
        rig.dispatcher.dispatch_text(&mut rig.ctx, rig.client, &text);
    }

    fn add_point_model(rig: &mut Rig) -> ModelId {
        let handle = rig.ctx.scene.add_model(
            "fixture",
            Model::new(
                Geometry::Points {
                    positions: vec![[0.0; 3]],
                    radius: 0.01,
                },
                Bounds::default(),
            ),
        );
        let id = lock_descriptor(&handle).id;
        id
    }

    #[tokio::test]
    async fn camera_set_validates_and_answers() {
        let mut rig = rig();
        let ok = call(&mut rig, 1, "set-camera", json!({"current": "orthographic"}));
        assert_eq!(ok["result"], true);
        assert!(rig.ctx.render_requested);

        let err = call(&mut rig, 2, "set-camera", json!({"current": "fisheye"}));
        assert_eq!(err["error"]["code"], codes::PARAM_UPDATE_REJECTED);
        // rejected update left the accepted state in place
        let get = call(&mut rig, 3, "get-camera", Value::Null);
        assert_eq!(get["result"]["current"], "orthographic");
    }

    #[tokio::test]
    async fn set_broadcasts_to_other_clients_only() {
        let mut rig = rig();
        let (tx_b, mut rx_b) = mpsc::channel(8);
        rig.ctx.clients.insert(ClientId(2), tx_b);

        let ok = call(&mut rig, 1, "set-animation-parameters", json!({"frame": 5}));
        assert_eq!(ok["result"], true);
        let broadcast = rx_b.try_recv().expect("other client notified");
        assert!(broadcast.contains("set-animation-parameters"));
        assert!(rig.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn viewport_change_resizes_the_framebuffer() {
        let mut rig = rig();
        call(&mut rig, 1, "set-application-parameters", json!({"viewport": [32, 16]}));
        assert_eq!(rig.ctx.backend.framebuffer().width(), 32);
        assert_eq!(rig.ctx.backend.framebuffer().height(), 16);
    }

    #[tokio::test]
    async fn model_queries_report_missing_models() {
        let mut rig = rig();
        let err = call(&mut rig, 1, "get-model-properties", json!({"id": 42}));
        assert_eq!(err["error"]["code"], codes::MODEL_NOT_FOUND);

        let removed = call(&mut rig, 2, "remove-model", json!({"id": 42}));
        assert_eq!(removed["result"], false);
    }

    #[tokio::test]
    async fn instance_range_is_clamped() {
        let mut rig = rig();
        let id = add_point_model(&mut rig);
        let value = call(
            &mut rig,
            1,
            "get-instances",
            json!({"id": id, "result-range": [0, 99]}),
        );
        assert_eq!(value["result"].as_array().expect("instances").len(), 1);

        let empty = call(
            &mut rig,
            2,
            "get-instances",
            json!({"id": id, "result-range": [5, 9]}),
        );
        assert_eq!(empty["result"].as_array().expect("instances").len(), 0);
    }

    #[tokio::test]
    async fn unknown_instance_is_its_own_error() {
        let mut rig = rig();
        let id = add_point_model(&mut rig);
        let err = call(
            &mut rig,
            1,
            "update-instance",
            json!({"model-id": id, "instance-id": 9}),
        );
        assert_eq!(err["error"]["code"], codes::INSTANCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn histogram_without_simulation_is_not_supported() {
        let mut rig = rig();
        let err = call(&mut rig, 1, "simulation-histogram", Value::Null);
        assert_eq!(err["error"]["code"], codes::NOT_SUPPORTED);
    }

    #[tokio::test]
    async fn quit_stops_the_loop_flag() {
        let mut rig = rig();
        fire(&mut rig, "quit", Value::Null);
        assert!(!rig.ctx.keep_running);
    }

    #[tokio::test]
    async fn schema_serves_bound_endpoints() {
        let mut rig = rig();
        let value = call(&mut rig, 1, "schema", json!({"endpoint": "camera"}));
        assert_eq!(value["result"]["title"], "Camera");

        let err = call(&mut rig, 2, "schema", json!({"endpoint": "bogus"}));
        assert_eq!(err["error"]["code"], codes::SCHEMA_NOT_FOUND);
    }

    #[tokio::test]
    async fn image_returns_an_encoded_frame() {
        let mut rig = rig();
        rig.ctx.backend.render();
        let value = call(&mut rig, 1, "image", Value::Null);
        assert_eq!(value["result"]["format"], "png");
        assert!(value["result"]["data"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn upload_task_resolves_through_chunked_binary() {
        let mut rig = rig();
        let point: Vec<u8> = [1.0f32, 2.0, 3.0]
            .iter()
            .flat_map(|c| c.to_le_bytes())
            .collect();

        let text = serde_json::to_string(&json!({
            "id": 9,
            "method": "request-model-upload",
            "params": {"name": "cloud", "size": point.len()},
        }))
        .expect("encode request");
        rig.dispatcher.dispatch_text(&mut rig.ctx, rig.client, &text);
        assert_eq!(rig.dispatcher.active_task_count(), 1);

        fire(&mut rig, "chunk", json!({"id": "0"}));
        rig.ctx.uploads.append(rig.client, &point);

        // pump watcher events until the terminal one lands
        loop {
            match rig.events.recv().await.expect("engine event") {
                EngineEvent::ProgressTick { client, request, snapshot } => rig
                    .dispatcher
                    .progress_tick(&rig.ctx, client, request, &snapshot),
                EngineEvent::TaskFinished { client, request, result } => {
                    rig.dispatcher.finish_task(&mut rig.ctx, client, request, result);
                    break;
                }
                _ => panic!("unexpected engine event"),
            }
        }

        // progress 100%, then the model info response
        let progress: Value =
            serde_json::from_str(&rig.outbox.try_recv().expect("progress")).expect("json");
        assert_eq!(progress["method"], "progress");
        assert_eq!(progress["params"]["operation"], "Done");
        let response: Value =
            serde_json::from_str(&rig.outbox.try_recv().expect("response")).expect("json");
        assert_eq!(response["id"], 9);
        assert_eq!(response["result"]["name"], "cloud");
        assert_eq!(rig.ctx.scene.models().len(), 1);
    }

    #[tokio::test]
    async fn update_model_marks_the_scene_for_rebuild() {
        let mut rig = rig();
        let id = add_point_model(&mut rig);
        // settle the pending structural change from add_model
        rig.ctx
            .scene
            .commit(&mut *rig.ctx.backend, lux_scene::CommitInputs::default());

        let ok = call(&mut rig, 1, "update-model", json!({"id": id, "visible": false}));
        assert_eq!(ok["result"], true);
        assert!(rig.ctx.scene.is_modified());
    }
}
