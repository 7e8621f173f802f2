// SPDX-License-Identifier: Apache-2.0
//! The engine loop: events in, frames out.
//!
//! One tokio task owns the whole mutable engine. Each pass drains a bounded
//! batch of events, flushes due throttled notifications, advances playback,
//! commits the scene, renders when something asked for it, and broadcasts
//! the frame at the configured stream rate.

use std::time::{Duration, Instant};

use lux_proto::{encode_notification, Notification};
use lux_scene::{CommitInputs, RenderBackend};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    frame::{encode_frame, FramePacer},
    register_operations,
    throttle::{INTERACTIVE_INTERVAL, SLOW_INTERVAL},
    Dispatcher, EngineCtx, EngineEvent, HTTP_ORIGIN,
};

/// Notification method carrying rendered frames.
pub const METHOD_IMAGE: &str = "image";

/// Loop tick period; also bounds how stale a due throttle flush can get.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum events handled per batch before the loop renders again.
const EVENT_BATCH: usize = 64;

/// The engine: context, dispatcher, and the event loop around them.
pub struct Engine {
    ctx: EngineCtx,
    dispatcher: Dispatcher,
    events: mpsc::Receiver<EngineEvent>,
    pacer: FramePacer,
    last_render: Option<Instant>,
}

impl Engine {
    /// Build an engine around a backend. Returns the event sender the
    /// transport feeds.
    pub fn new(
        backend: Box<dyn RenderBackend>,
        max_binary_bytes: usize,
    ) -> (Self, mpsc::Sender<EngineEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let mut ctx = EngineCtx::new(backend, max_binary_bytes, tx.clone());
        ctx.throttles
            .set_interval("animation-parameters", INTERACTIVE_INTERVAL);
        ctx.throttles.set_interval("camera", INTERACTIVE_INTERVAL);
        ctx.throttles.set_interval("statistics", SLOW_INTERVAL);

        let mut dispatcher = Dispatcher::new();
        register_operations(&mut dispatcher);

        let engine = Self {
            ctx,
            dispatcher,
            events: rx,
            pacer: FramePacer::default(),
            last_render: None,
        };
        (engine, tx)
    }

    /// Engine state, for seeding before the loop starts (lights, initial
    /// models, parameter defaults).
    pub fn ctx_mut(&mut self) -> &mut EngineCtx {
        &mut self.ctx
    }

    /// Run until `quit` or until every event sender is gone.
    pub async fn run(mut self) {
        info!("engine loop started");
        let mut ticker = time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while self.ctx.keep_running {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event);
                    // drain what queued up behind it, bounded so a chatty
                    // client cannot starve rendering
                    for _ in 1..EVENT_BATCH {
                        match self.events.try_recv() {
                            Ok(event) => self.handle_event(event),
                            Err(_) => break,
                        }
                    }
                }
                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }
        info!("engine loop stopped");
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Connected { client, outbox } => {
                self.ctx.clients.insert(client, outbox);
                // new clients immediately see the live frame
                match encode_frame(self.ctx.backend.framebuffer()) {
                    Ok(frame) => {
                        if let Ok(params) = serde_json::to_value(&frame) {
                            let notification = encode_notification(&Notification {
                                method: METHOD_IMAGE.to_owned(),
                                params,
                            });
                            self.ctx.clients.send(client, notification);
                        }
                    }
                    Err(err) => warn!(%err, "live frame encode failed"),
                }
            }
            EngineEvent::Disconnected { client } => {
                self.ctx.clients.remove(client);
                self.ctx.uploads.remove(client);
            }
            EngineEvent::Text { client, text } => {
                self.dispatcher.dispatch_text(&mut self.ctx, client, &text);
            }
            EngineEvent::Binary { client, data } => {
                self.ctx.uploads.append(client, &data);
            }
            EngineEvent::TaskFinished {
                client,
                request,
                result,
            } => {
                self.dispatcher
                    .finish_task(&mut self.ctx, client, request, result);
            }
            EngineEvent::ProgressTick {
                client,
                request,
                snapshot,
            } => {
                self.dispatcher
                    .progress_tick(&self.ctx, client, request, &snapshot);
            }
            EngineEvent::StateGet { endpoint, reply } => {
                let result = self.dispatcher.run_sync(
                    &mut self.ctx,
                    &format!("get-{endpoint}"),
                    HTTP_ORIGIN,
                    Value::Null,
                );
                let _ = reply.send(result);
            }
            EngineEvent::StatePut {
                endpoint,
                payload,
                reply,
            } => {
                let result = self.dispatcher.run_sync(
                    &mut self.ctx,
                    &format!("set-{endpoint}"),
                    HTTP_ORIGIN,
                    payload,
                );
                let _ = reply.send(result);
            }
            EngineEvent::SchemaGet { endpoint, reply } => {
                let _ = reply.send(self.dispatcher.schema(&endpoint));
            }
            EngineEvent::Quit => self.ctx.keep_running = false,
        }
    }

    /// One render pass. Public mainly for the loop itself; split into the
    /// pre/commit/render/post phases.
    fn tick(&mut self, now: Instant) {
        self.pre_render(now);

        let inputs = self.commit_inputs();
        let commit = self.ctx.scene.commit(&mut *self.ctx.backend, inputs);

        if self.ctx.render_requested || !commit.is_noop() {
            self.ctx.backend.render();
            self.ctx.render_requested = false;
            self.update_stats(now);
        }

        self.post_render(now);
    }

    fn pre_render(&mut self, now: Instant) {
        for notice in self.ctx.throttles.take_due(now) {
            self.ctx.clients.broadcast(&notice.frame, notice.exclude);
        }

        let (playing, delta) = {
            let animation = self.ctx.params.animation.get();
            (animation.playing, animation.delta)
        };
        if playing && delta != 0 {
            self.ctx
                .params
                .animation
                .with_mut(|animation| {
                    animation.frame = animation.frame.saturating_add_signed(animation.delta);
                });
            let state = self.ctx.params.animation.to_value();
            self.ctx.notify_endpoint("animation-parameters", state, None);
            self.ctx.request_render();
        }
    }

    fn commit_inputs(&mut self) -> CommitInputs {
        let animation_frame = self.ctx.params.animation.get().frame;
        let volume_params_modified = self.ctx.params.volume.is_modified();
        self.ctx.params.volume.clear_modified();
        CommitInputs {
            animation_frame,
            volume_params_modified,
        }
    }

    fn update_stats(&mut self, now: Instant) {
        self.ctx.stats.frames_rendered += 1;
        self.ctx.stats.model_count = self.ctx.scene.models().len();
        if let Some(last) = self.last_render {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            if dt > 0.0 {
                // smoothed so the broadcast value is readable
                self.ctx.stats.fps = 0.9 * self.ctx.stats.fps + 0.1 / dt;
            }
        }
        self.last_render = Some(now);
        if let Ok(state) = serde_json::to_value(self.ctx.stats) {
            self.ctx.notify_endpoint("statistics", state, None);
        }
    }

    fn post_render(&mut self, now: Instant) {
        if self.ctx.clients.is_empty() || !self.ctx.backend.framebuffer().is_modified() {
            return;
        }
        let fps = self.ctx.params.application.get().image_stream_fps as f32;
        if !self.pacer.due(now, fps) {
            return;
        }
        match encode_frame(self.ctx.backend.framebuffer()) {
            Ok(frame) => {
                if let Ok(params) = serde_json::to_value(&frame) {
                    let notification = encode_notification(&Notification {
                        method: METHOD_IMAGE.to_owned(),
                        params,
                    });
                    self.ctx.clients.broadcast(&notification, None);
                }
                self.ctx.backend.framebuffer_mut().clear_modified();
            }
            Err(err) => warn!(%err, "frame encode failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientId;
    use lux_proto::codes;
    use lux_scene::{Bounds, Geometry, HeadlessBackend, Model};
    use serde_json::json;
    use tokio::sync::oneshot;

    fn engine() -> Engine {
        Engine::new(Box::new(HeadlessBackend::new(2, 2)), 1024).0
    }

    fn point_model() -> Model {
        Model::new(
            Geometry::Points {
                positions: vec![[0.0; 3]],
                radius: 0.01,
            },
            Bounds::default(),
        )
    }

    #[tokio::test]
    async fn connected_client_receives_the_live_frame() {
        let mut engine = engine();
        let (tx, mut rx) = mpsc::channel(8);
        engine.handle_event(EngineEvent::Connected {
            client: ClientId(1),
            outbox: tx,
        });
        let frame = rx.try_recv().expect("live frame");
        let value: Value = serde_json::from_str(&frame).expect("json");
        assert_eq!(value["method"], METHOD_IMAGE);
    }

    #[tokio::test]
    async fn steady_state_tick_does_not_render() {
        let mut engine = engine();
        let t0 = Instant::now();
        engine.ctx_mut().scene.add_model("m", point_model());
        engine.ctx_mut().request_render();
        engine.tick(t0);
        let rendered = engine.ctx.stats.frames_rendered;
        assert_eq!(rendered, 1);

        engine.tick(t0 + Duration::from_millis(20));
        assert_eq!(engine.ctx.stats.frames_rendered, rendered);
    }

    #[tokio::test]
    async fn rendered_frames_are_broadcast_at_the_stream_rate() {
        let mut engine = engine();
        let (tx, mut rx) = mpsc::channel(8);
        engine.ctx_mut().clients.insert(ClientId(1), tx);
        engine.ctx_mut().scene.add_model("m", point_model());

        let t0 = Instant::now();
        engine.tick(t0);
        // the first render also broadcasts statistics; scan for the frame
        let mut saw_image = false;
        while let Ok(frame) = rx.try_recv() {
            saw_image |= frame.contains("\"method\":\"image\"");
        }
        assert!(saw_image);

        // framebuffer unchanged: nothing further goes out
        engine.tick(t0 + Duration::from_secs(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn playback_advances_the_animation_frame() {
        let mut engine = engine();
        engine.ctx_mut().params.animation.with_mut(|animation| {
            animation.playing = true;
            animation.delta = 2;
        });
        engine.tick(Instant::now());
        assert_eq!(engine.ctx.params.animation.get().frame, 2);
        engine.tick(Instant::now() + TICK_INTERVAL);
        assert_eq!(engine.ctx.params.animation.get().frame, 4);
    }

    #[tokio::test]
    async fn http_state_events_answer_through_the_reply_channel() {
        let mut engine = engine();

        let (reply, rx) = oneshot::channel();
        engine.handle_event(EngineEvent::StateGet {
            endpoint: "camera".to_owned(),
            reply,
        });
        let state = rx.await.expect("reply").expect("camera state");
        assert_eq!(state["current"], "perspective");

        let (reply, rx) = oneshot::channel();
        engine.handle_event(EngineEvent::StatePut {
            endpoint: "animation-parameters".to_owned(),
            payload: json!({"frame": 12}),
            reply,
        });
        assert_eq!(rx.await.expect("reply").expect("accepted"), Value::Bool(true));
        assert_eq!(engine.ctx.params.animation.get().frame, 12);

        let (reply, rx) = oneshot::channel();
        engine.handle_event(EngineEvent::SchemaGet {
            endpoint: "camera".to_owned(),
            reply,
        });
        let schema = rx.await.expect("reply").expect("schema");
        assert_eq!(schema["title"], "Camera");
    }

    #[tokio::test]
    async fn http_state_events_surface_endpoint_errors() {
        let mut engine = engine();

        let (reply, rx) = oneshot::channel();
        engine.handle_event(EngineEvent::StateGet {
            endpoint: "bogus".to_owned(),
            reply,
        });
        let err = rx.await.expect("reply").expect_err("unknown endpoint");
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);

        let (reply, rx) = oneshot::channel();
        engine.handle_event(EngineEvent::StatePut {
            endpoint: "camera".to_owned(),
            payload: json!({"current": "fisheye"}),
            reply,
        });
        let err = rx.await.expect("reply").expect_err("unsupported camera");
        assert_eq!(err.code, codes::PARAM_UPDATE_REJECTED);
    }

    #[tokio::test]
    async fn http_put_notifies_every_socket_client() {
        let mut engine = engine();
        let (tx, mut rx) = mpsc::channel(8);
        engine.ctx_mut().clients.insert(ClientId(1), tx);

        let (reply, reply_rx) = oneshot::channel();
        engine.handle_event(EngineEvent::StatePut {
            endpoint: "animation-parameters".to_owned(),
            payload: json!({"frame": 3}),
            reply,
        });
        assert!(reply_rx.await.expect("reply").is_ok());

        // interactive tier, first submit flushes immediately; no socket
        // client is the origin, so none is excluded
        let frame = rx.try_recv().expect("notification");
        assert!(frame.contains("set-animation-parameters"));
    }

    #[tokio::test]
    async fn quit_event_stops_the_loop_flag() {
        let mut engine = engine();
        engine.handle_event(EngineEvent::Quit);
        assert!(!engine.ctx.keep_running);
    }
}
