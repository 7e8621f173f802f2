// SPDX-License-Identifier: Apache-2.0
//! Request dispatch and the task lifecycle.
//!
//! One dispatcher owns the method table and the active-task table. Sync
//! handlers run inline on the engine loop and answer immediately. Task
//! factories validate and spawn; a watcher task samples progress and posts
//! the terminal result back onto the loop, where exactly one response per
//! request id goes out, no matter how completion, cancellation, and errors
//! interleave.

use std::collections::HashMap;

use lux_proto::{
    codes, decode_request, encode_notification, encode_response, DecodeError, Notification,
    ProgressUpdate, Request, RequestId, Response, RpcError, METHOD_CANCEL, METHOD_PROGRESS,
};
use lux_tasks::{CancelToken, ProgressSnapshot, TaskHandle, TaskOutcome};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{throttle::SLOW_INTERVAL, ClientId, EngineCtx, EngineEvent, TaskFinalize};

/// Handler answering inline on the engine loop.
pub type SyncHandler =
    Box<dyn FnMut(&mut EngineCtx, ClientId, Value) -> Result<Value, RpcError> + Send>;

/// Factory validating a task request and spawning its work. Factory errors
/// are answered synchronously; the task is never registered.
pub type TaskFactory = Box<
    dyn FnMut(&mut EngineCtx, ClientId, RequestId, Value) -> Result<TaskHandle<TaskFinalize>, RpcError>
        + Send,
>;

enum Handler {
    Sync(SyncHandler),
    Task(TaskFactory),
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    id: RequestId,
}

/// Method name for endpoint schema lookup.
pub const METHOD_SCHEMA: &str = "schema";

#[derive(Debug, Deserialize)]
struct SchemaParams {
    endpoint: String,
}

/// Method table, schema table, and active-task table.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
    schemas: HashMap<String, Value>,
    active_tasks: HashMap<(ClientId, RequestId), CancelToken>,
}

impl Dispatcher {
    /// Empty dispatcher; operations are registered at engine setup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous operation.
    pub fn register_sync(
        &mut self,
        method: impl Into<String>,
        handler: impl FnMut(&mut EngineCtx, ClientId, Value) -> Result<Value, RpcError> + Send + 'static,
    ) {
        self.handlers
            .insert(method.into(), Handler::Sync(Box::new(handler)));
    }

    /// Register an asynchronous task operation.
    pub fn register_task(
        &mut self,
        method: impl Into<String>,
        factory: impl FnMut(&mut EngineCtx, ClientId, RequestId, Value) -> Result<TaskHandle<TaskFinalize>, RpcError>
            + Send
            + 'static,
    ) {
        self.handlers
            .insert(method.into(), Handler::Task(Box::new(factory)));
    }

    /// Register an endpoint schema served by the `schema` operation.
    pub fn register_schema(&mut self, endpoint: impl Into<String>, schema: Value) {
        self.schemas.insert(endpoint.into(), schema);
    }

    /// Look up an endpoint schema.
    pub fn schema(&self, endpoint: &str) -> Result<Value, RpcError> {
        self.schemas
            .get(endpoint)
            .cloned()
            .ok_or_else(|| RpcError::schema_not_found(endpoint))
    }

    /// Number of tasks awaiting their terminal event.
    pub fn active_task_count(&self) -> usize {
        self.active_tasks.len()
    }

    /// Process one inbound text frame from a client.
    pub fn dispatch_text(&mut self, ctx: &mut EngineCtx, client: ClientId, text: &str) {
        let request = match decode_request(text) {
            Ok(request) => request,
            Err(err) => {
                debug!(client = client.0, %err, "malformed frame");
                if let Some(id) = DecodeError::recover_id(text) {
                    let error = RpcError::new(codes::PARSE_ERROR, err.to_string());
                    ctx.clients
                        .send(client, encode_response(&Response::error(id, error)));
                }
                return;
            }
        };
        self.dispatch(ctx, client, request);
    }

    fn dispatch(&mut self, ctx: &mut EngineCtx, client: ClientId, request: Request) {
        if request.method == METHOD_CANCEL {
            self.handle_cancel(client, request);
            return;
        }
        // schema lookup reads the dispatcher's own table, so it cannot be a
        // registered handler
        if request.method == METHOD_SCHEMA {
            if let Some(id) = request.id {
                let result = serde_json::from_value::<SchemaParams>(request.params)
                    .map_err(RpcError::invalid_params)
                    .and_then(|params| self.schema(&params.endpoint));
                let response = match result {
                    Ok(schema) => Response::result(id, schema),
                    Err(error) => Response::error(id, error),
                };
                ctx.clients.send(client, encode_response(&response));
            }
            return;
        }

        let Some(handler) = self.handlers.get_mut(&request.method) else {
            debug!(client = client.0, method = %request.method, "unknown method");
            if let Some(id) = request.id {
                let error = RpcError::method_not_found(&request.method);
                ctx.clients
                    .send(client, encode_response(&Response::error(id, error)));
            }
            return;
        };

        match handler {
            Handler::Sync(run) => {
                let result = run(ctx, client, request.params);
                match request.id {
                    Some(id) => {
                        let response = match result {
                            Ok(value) => Response::result(id, value),
                            Err(error) => Response::error(id, error),
                        };
                        ctx.clients.send(client, encode_response(&response));
                    }
                    None => {
                        // fire-and-forget: failures are only logged
                        if let Err(error) = result {
                            debug!(client = client.0, method = %request.method, %error,
                                "fire-and-forget operation failed");
                        }
                    }
                }
            }
            Handler::Task(factory) => {
                let Some(id) = request.id else {
                    warn!(client = client.0, method = %request.method,
                        "task request without an id, dropped");
                    return;
                };
                match factory(ctx, client, id, request.params) {
                    Err(error) => {
                        ctx.clients
                            .send(client, encode_response(&Response::error(id, error)));
                    }
                    Ok(handle) => {
                        self.active_tasks.insert((client, id), handle.cancel_token());
                        watch_task(ctx.events.clone(), client, id, handle);
                    }
                }
            }
        }
    }

    /// Run a registered synchronous operation directly, for transports that
    /// carry their own reply path (the HTTP state surface). Task methods
    /// are not reachable this way.
    pub fn run_sync(
        &mut self,
        ctx: &mut EngineCtx,
        method: &str,
        client: ClientId,
        params: Value,
    ) -> Result<Value, RpcError> {
        match self.handlers.get_mut(method) {
            Some(Handler::Sync(run)) => run(ctx, client, params),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    /// `cancel` is addressed at a running task by request id, not answered
    /// itself. Unknown ids are ignored: the task may have just finished.
    fn handle_cancel(&mut self, client: ClientId, request: Request) {
        match serde_json::from_value::<CancelParams>(request.params) {
            Ok(params) => {
                if let Some(token) = self.active_tasks.get(&(client, params.id)) {
                    debug!(client = client.0, task = params.id, "cancellation requested");
                    token.cancel();
                }
            }
            Err(err) => debug!(client = client.0, %err, "malformed cancel params"),
        }
    }

    /// Handle a task's terminal event on the engine loop. The active-task
    /// entry guards exactly-once teardown: a second terminal event for the
    /// same request is a no-op.
    pub fn finish_task(
        &mut self,
        ctx: &mut EngineCtx,
        client: ClientId,
        request: RequestId,
        result: Result<TaskFinalize, RpcError>,
    ) {
        if self.active_tasks.remove(&(client, request)).is_none() {
            return;
        }
        ctx.uploads.remove_task(client, request);

        let result = match result {
            Ok(finalize) => finalize(ctx),
            Err(error) => Err(error),
        };

        let response = match result {
            Ok(value) => Response::result(request, value),
            Err(error) => Response::error(request, error),
        };
        ctx.clients.send(client, encode_response(&response));
        ctx.request_render();
    }

    /// Push a progress sample to the requesting client. Samples for torn
    /// down tasks are dropped.
    pub fn progress_tick(
        &self,
        ctx: &EngineCtx,
        client: ClientId,
        request: RequestId,
        snapshot: &ProgressSnapshot,
    ) {
        if !self.active_tasks.contains_key(&(client, request)) {
            return;
        }
        self.send_progress(ctx, client, request, snapshot);
    }

    fn send_progress(
        &self,
        ctx: &EngineCtx,
        client: ClientId,
        request: RequestId,
        snapshot: &ProgressSnapshot,
    ) {
        let update = ProgressUpdate {
            id: request,
            operation: snapshot.operation.clone(),
            amount: snapshot.amount,
        };
        let params = match serde_json::to_value(&update) {
            Ok(params) => params,
            Err(_) => return,
        };
        let frame = encode_notification(&Notification {
            method: METHOD_PROGRESS.to_owned(),
            params,
        });
        ctx.clients.send(client, frame);
    }
}

/// Bridge a spawned task back onto the engine loop: periodic progress
/// samples while it runs, then the terminal event.
fn watch_task(
    events: tokio::sync::mpsc::Sender<EngineEvent>,
    client: ClientId,
    request: RequestId,
    handle: TaskHandle<TaskFinalize>,
) {
    tokio::spawn(async move {
        let (progress, _cancel, mut completion) = handle.split();
        let mut ticker = tokio::time::interval(SLOW_INTERVAL);
        ticker.tick().await; // immediate first tick carries nothing yet
        let outcome = loop {
            tokio::select! {
                result = &mut completion => {
                    break match result {
                        Ok(outcome) => outcome,
                        Err(_) => TaskOutcome::Cancelled,
                    };
                }
                _ = ticker.tick() => {
                    if let Some(snapshot) = progress.consume() {
                        let event = EngineEvent::ProgressTick { client, request, snapshot };
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        };
        let result = match outcome {
            TaskOutcome::Ok(finalize) => Ok(finalize),
            TaskOutcome::Err(error) => Err(error),
            TaskOutcome::Cancelled => Err(RpcError::cancelled()),
        };
        // terminal progress coalesces with any unseen sample and precedes
        // the response
        progress.finish();
        if let Some(snapshot) = progress.consume() {
            let event = EngineEvent::ProgressTick {
                client,
                request,
                snapshot,
            };
            if events.send(event).await.is_err() {
                return;
            }
        }
        let _ = events
            .send(EngineEvent::TaskFinished {
                client,
                request,
                result,
            })
            .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_scene::HeadlessBackend;
    use serde_json::json;
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
        let mut ctx = EngineCtx::new(Box::new(HeadlessBackend::new(4, 4)), 1024, event_tx);
        let (tx, outbox) = mpsc::channel(64);
        let client = ClientId(1);
        ctx.clients.insert(client, tx);
        Rig {
            dispatcher: Dispatcher::new(),
            ctx,
            events,
            outbox,
            client,
        }
    }

    fn response(rig: &mut Rig) -> Value {
        let frame = rig.outbox.try_recv().expect("a frame was sent");
        serde_json::from_str(&frame).expect("valid json frame")
    }

    /// Pump watcher events through the dispatcher until the terminal one.
    async fn run_to_completion(rig: &mut Rig) {
        loop {
            match rig.events.recv().await.expect("engine event") {
                EngineEvent::ProgressTick {
                    client,
                    request,
                    snapshot,
                } => rig
                    .dispatcher
                    .progress_tick(&rig.ctx, client, request, &snapshot),
                EngineEvent::TaskFinished {
                    client,
                    request,
                    result,
                } => {
                    rig.dispatcher.finish_task(&mut rig.ctx, client, request, result);
                    break;
                }
                _ => panic!("unexpected engine event"),
            }
        }
    }

    #[tokio::test]
    async fn unknown_method_gets_method_not_found() {
        let mut rig = rig();
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"id":1,"method":"nope"}"#);
        let value = response(&mut rig);
        assert_eq!(value["error"]["code"], codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_fire_and_forget_is_silent() {
        let mut rig = rig();
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"method":"nope"}"#);
        assert!(rig.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_frame_with_recoverable_id_gets_parse_error() {
        let mut rig = rig();
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"id":7,"params":{}}"#);
        let value = response(&mut rig);
        assert_eq!(value["id"], 7);
        assert_eq!(value["error"]["code"], codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn sync_handler_answers_with_result() {
        let mut rig = rig();
        rig.dispatcher
            .register_sync("echo", |_ctx, _client, params| Ok(params));
        rig.dispatcher.dispatch_text(
            &mut rig.ctx,
            rig.client,
            r#"{"id":2,"method":"echo","params":{"x":1}}"#,
        );
        let value = response(&mut rig);
        assert_eq!(value["result"]["x"], 1);
    }

    #[tokio::test]
    async fn task_factory_error_is_answered_synchronously() {
        let mut rig = rig();
        rig.dispatcher.register_task("load", |_ctx, _client, _id, _params| {
            Err(RpcError::invalid_params("missing path"))
        });
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"id":3,"method":"load"}"#);
        let value = response(&mut rig);
        assert_eq!(value["error"]["code"], codes::INVALID_PARAMS);
        assert_eq!(rig.dispatcher.active_task_count(), 0);
    }

    #[tokio::test]
    async fn task_lifecycle_delivers_exactly_one_response() {
        let mut rig = rig();
        rig.dispatcher.register_task("work", |_ctx, _client, _id, _params| {
            Ok(lux_tasks::spawn(|_task| async move {
                let finalize: TaskFinalize = Box::new(|_ctx| Ok(json!({"done": true})));
                Ok(finalize)
            }))
        });
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"id":4,"method":"work"}"#);
        assert_eq!(rig.dispatcher.active_task_count(), 1);

        run_to_completion(&mut rig).await;
        assert_eq!(rig.dispatcher.active_task_count(), 0);

        // terminal progress from the handle, then the response
        let progress = response(&mut rig);
        assert_eq!(progress["method"], METHOD_PROGRESS);
        assert_eq!(progress["params"]["operation"], "Done");
        assert_eq!(progress["params"]["amount"], 1.0);
        let value = response(&mut rig);
        assert_eq!(value["id"], 4);
        assert_eq!(value["result"]["done"], true);
        assert!(rig.outbox.try_recv().is_err());

        // a duplicate terminal event is a no-op
        let client = rig.client;
        rig.dispatcher
            .finish_task(&mut rig.ctx, client, 4, Err(RpcError::cancelled()));
        assert!(rig.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn unseen_progress_coalesces_into_the_terminal_sample() {
        let mut rig = rig();
        rig.dispatcher.register_task("work", |_ctx, _client, _id, _params| {
            Ok(lux_tasks::spawn(|task| async move {
                // completes before the watcher ever samples this
                task.progress("halfway", 0.5);
                let finalize: TaskFinalize = Box::new(|_ctx| Ok(Value::Null));
                Ok(finalize)
            }))
        });
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"id":6,"method":"work"}"#);
        run_to_completion(&mut rig).await;

        let progress = response(&mut rig);
        assert_eq!(progress["params"]["operation"], "Done");
        assert_eq!(progress["params"]["amount"], 1.0);
        let value = response(&mut rig);
        assert_eq!(value["id"], 6);
        assert!(rig.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_produces_the_cancellation_error() {
        let mut rig = rig();
        rig.dispatcher.register_task("sleep", |_ctx, _client, _id, _params| {
            Ok(lux_tasks::spawn(|_task| async move {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                let finalize: TaskFinalize = Box::new(|_ctx| Ok(Value::Null));
                Ok(finalize)
            }))
        });
        rig.dispatcher
            .dispatch_text(&mut rig.ctx, rig.client, r#"{"id":5,"method":"sleep"}"#);
        rig.dispatcher.dispatch_text(
            &mut rig.ctx,
            rig.client,
            r#"{"method":"cancel","params":{"id":5}}"#,
        );

        run_to_completion(&mut rig).await;

        let _progress = response(&mut rig);
        let value = response(&mut rig);
        assert_eq!(value["id"], 5);
        assert_eq!(value["error"]["code"], codes::TASK_CANCELLED);
    }

    #[tokio::test]
    async fn progress_for_torn_down_tasks_is_dropped() {
        let mut rig = rig();
        rig.dispatcher.progress_tick(
            &rig.ctx,
            rig.client,
            99,
            &ProgressSnapshot {
                operation: "late".to_owned(),
                amount: 0.5,
            },
        );
        assert!(rig.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn schema_lookup_reports_unknown_endpoints() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_schema("camera", json!({"title": "Camera"}));
        assert!(dispatcher.schema("camera").is_ok());
        let err = dispatcher.schema("unknown").expect_err("no schema");
        assert_eq!(err.code, codes::SCHEMA_NOT_FOUND);
    }
}
