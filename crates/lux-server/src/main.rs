// SPDX-License-Identifier: Apache-2.0
//! HTTP and WebSocket front end for the lux engine.
//!
//! One engine loop per process; every connection gets an outbox and a
//! writer task, and everything inbound is forwarded to the loop as events.
//! State endpoints are also served over plain HTTP: `GET /<endpoint>`,
//! `PUT /<endpoint>`, and `GET /<endpoint>/schema` mirror the `get-`/`set-`
//! message pairs through reply-channel events.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket},
    extract::{ConnectInfo, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use glam::Vec3;
use lux_control::{ClientId, Engine, EngineEvent};
use lux_proto::{codes, RpcError};
use lux_scene::{HeadlessBackend, Light};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "lux rendering service")]
struct Args {
    /// TCP listener for clients (e.g. 0.0.0.0:8200)
    #[arg(long, default_value = "0.0.0.0:8200")]
    listen: SocketAddr,
    /// Target rate of the rendered-frame broadcast
    #[arg(long, default_value_t = 60)]
    stream_fps: u32,
    /// Maximum declared size of a binary upload in bytes
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    max_binary_bytes: usize,
    /// Encode quality for embedded and broadcast images, 1-100
    #[arg(long, default_value_t = 90)]
    image_quality: u8,
    /// Initial viewport width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,
    /// Initial viewport height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,
}

struct AppState {
    events: mpsc::Sender<EngineEvent>,
    next_client: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let backend = HeadlessBackend::new(args.width, args.height);
    let (mut engine, events) = Engine::new(Box::new(backend), args.max_binary_bytes);
    engine.ctx_mut().params.application.with_mut(|app| {
        app.image_stream_fps = args.stream_fps;
        app.image_quality = args.image_quality;
        app.viewport = [args.width, args.height];
    });
    // seeding is not a remote change; nothing to notify yet
    engine.ctx_mut().params.application.clear_modified();
    engine.ctx_mut().scene.add_light(Light::Directional {
        direction: Vec3::new(0.0, -1.0, -1.0),
        color: Vec3::ONE,
        intensity: 1.0,
    });
    let engine_task = tokio::spawn(engine.run());

    let state = Arc::new(AppState {
        events: events.clone(),
        next_client: AtomicU64::new(1),
    });
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/{endpoint}", get(state_get).put(state_put))
        .route("/{endpoint}/schema", get(state_schema))
        .with_state(state);

    // ctrl-c goes through the engine so shutdown is one code path
    let quit_events = events.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c, shutting down");
            let _ = quit_events.send(EngineEvent::Quit).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("listening on {}", args.listen);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        // the engine loop ending (quit or all senders gone) stops the server
        let _ = engine_task.await;
    })
    .await?;

    Ok(())
}

async fn state_get(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
) -> Response {
    let (reply, rx) = oneshot::channel();
    state_reply(&state, EngineEvent::StateGet { endpoint, reply }, rx).await
}

async fn state_put(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    let (reply, rx) = oneshot::channel();
    state_reply(
        &state,
        EngineEvent::StatePut {
            endpoint,
            payload,
            reply,
        },
        rx,
    )
    .await
}

async fn state_schema(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
) -> Response {
    let (reply, rx) = oneshot::channel();
    state_reply(&state, EngineEvent::SchemaGet { endpoint, reply }, rx).await
}

/// Forward one HTTP state request to the engine loop and translate the
/// outcome into a response.
async fn state_reply(
    state: &AppState,
    event: EngineEvent,
    rx: oneshot::Receiver<Result<Value, RpcError>>,
) -> Response {
    if state.events.send(event).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match rx.await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(error)) => {
            let status = match error.code {
                codes::METHOD_NOT_FOUND | codes::SCHEMA_NOT_FOUND | codes::MODEL_NOT_FOUND => {
                    StatusCode::NOT_FOUND
                }
                codes::INVALID_PARAMS | codes::PARAM_UPDATE_REJECTED => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let body = serde_json::to_value(&error).unwrap_or(Value::Null);
            (status, Json(body)).into_response()
        }
        // engine stopped before answering
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    let client = ClientId(state.next_client.fetch_add(1, Ordering::Relaxed));
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(256);

    if state
        .events
        .send(EngineEvent::Connected {
            client,
            outbox: out_tx.clone(),
        })
        .await
        .is_err()
    {
        // engine already gone
        return;
    }
    info!(?peer, client = client.0, "client connected");

    // writer task: engine frames out to the socket
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        let event = match message {
            Ok(Message::Text(text)) => EngineEvent::Text {
                client,
                text: text.to_string(),
            },
            Ok(Message::Binary(data)) => EngineEvent::Binary {
                client,
                data: data.to_vec(),
            },
            Ok(Message::Close(_)) => break,
            // axum answers pings itself
            Ok(_) => continue,
            Err(err) => {
                warn!(?err, client = client.0, "ws recv error");
                break;
            }
        };
        if state.events.send(event).await.is_err() {
            break;
        }
    }

    let _ = state
        .events
        .send(EngineEvent::Disconnected { client })
        .await;
    drop(out_tx);
    writer.abort();
    let _ = writer.await;
    info!(client = client.0, "client disconnected");
}
