use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use ghost_rush_server::brains::TabularPolicy;
use ghost_rush_server::constants::{DEFAULT_SEARCH_DEPTH, TICK_PERIOD_MS};
use ghost_rush_server::directory::RoomDirectory;
use ghost_rush_server::protocol::{parse_client_message, ParsedClientMessage};
use ghost_rush_server::registry::{lock_room, now_ms, RoomRegistry};
use ghost_rush_server::room::GameRoom;
use ghost_rush_server::types::OutboundFrame;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerHub>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerHub {
    clients: HashMap<String, ClientContext>,
    registry: RoomRegistry,
    ticking: HashSet<String>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let model_path = std::env::var("MODEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/pacman_model.json"));
    let policy = TabularPolicy::load(&model_path).map(Arc::new);
    if policy.is_none() {
        println!("[server] no pre-trained model, using heuristic brains");
    }

    let search_depth = std::env::var("SEARCH_DEPTH")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(DEFAULT_SEARCH_DEPTH);

    let directory = std::env::var("ROOM_DIRECTORY_PATH")
        .ok()
        .map(|raw| RoomDirectory::new(PathBuf::from(raw), make_instance_id()));

    let state = Arc::new(Mutex::new(ServerHub {
        clients: HashMap::new(),
        registry: RoomRegistry::new(search_depth, policy, directory),
        ticking: HashSet::new(),
    }));
    start_sweep_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found, serving sockets only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn make_instance_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("inst_{}_{}", std::process::id(), suffix)
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    let candidates = [PathBuf::from("dist/client"), PathBuf::from("../client/dist")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("conn");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut hub = state.lock().await;
        hub.clients
            .insert(client_id.clone(), ClientContext { tx: tx.clone() });
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };
        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error(&state, &client_id, "invalidMessage", "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let parsed = match parse_client_message(&raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            send_error(&state, client_id, error.code(), error.message()).await;
            return;
        }
    };

    match parsed {
        ParsedClientMessage::CreateRoom => {
            let mut hub = state.lock().await;
            let code = hub.registry.create_room(now_ms());
            send_json(
                &mut hub,
                client_id,
                &json!({
                    "type": "roomCreated",
                    "ok": true,
                    "roomCode": code,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::JoinRoom {
            room_code,
            username,
            ghost,
        } => {
            let mut hub = state.lock().await;
            match hub
                .registry
                .join_room(&room_code, client_id, &username, ghost, now_ms())
            {
                Ok(room) => {
                    send_json(
                        &mut hub,
                        client_id,
                        &json!({
                            "type": "joinRoom",
                            "ok": true,
                            "roomCode": room_code,
                        }),
                        QueuePolicy::DisconnectOnFull,
                    );
                    let (frame, connection_ids) = {
                        let guard = lock_room(&room);
                        (guard.state_frame(), guard.connection_ids())
                    };
                    broadcast_frames(
                        &mut hub,
                        &connection_ids,
                        std::slice::from_ref(&frame),
                        QueuePolicy::DisconnectOnFull,
                    );
                }
                Err(error) => {
                    send_json(
                        &mut hub,
                        client_id,
                        &json!({
                            "type": "joinRoom",
                            "ok": false,
                            "error": error.code(),
                            "reason": error.message(),
                        }),
                        QueuePolicy::DisconnectOnFull,
                    );
                }
            }
        }
        ParsedClientMessage::ToggleReady { room_code } => {
            let mut hub = state.lock().await;
            let Some(room) = member_room(&hub, client_id, &room_code) else {
                return;
            };
            let (frame, connection_ids) = {
                let mut guard = lock_room(&room);
                if guard.toggle_ready(client_id).is_none() {
                    return;
                }
                (guard.state_frame(), guard.connection_ids())
            };
            broadcast_frames(
                &mut hub,
                &connection_ids,
                std::slice::from_ref(&frame),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::StartGame { room_code } => {
            let mut hub = state.lock().await;
            let Some(room) = member_room(&hub, client_id, &room_code) else {
                return;
            };
            let (frames, connection_ids, started) = {
                let mut guard = lock_room(&room);
                if !guard.can_start() {
                    drop(guard);
                    send_json(
                        &mut hub,
                        client_id,
                        &json!({
                            "type": "error",
                            "code": "cannotStart",
                            "message": "all players must be ready",
                        }),
                        QueuePolicy::DisconnectOnFull,
                    );
                    return;
                }
                let frames = guard.start(now_ms());
                (frames, guard.connection_ids(), guard.is_started())
            };
            broadcast_frames(&mut hub, &connection_ids, &frames, QueuePolicy::DisconnectOnFull);
            if started && hub.ticking.insert(room_code.clone()) {
                spawn_room_tick(state.clone(), room_code, room);
            }
        }
        ParsedClientMessage::RestartGame { room_code } => {
            let mut hub = state.lock().await;
            let Some(room) = member_room(&hub, client_id, &room_code) else {
                return;
            };
            let (frames, connection_ids) = {
                let mut guard = lock_room(&room);
                let frames = guard.restart(now_ms());
                (frames, guard.connection_ids())
            };
            if frames.is_empty() {
                return;
            }
            broadcast_frames(&mut hub, &connection_ids, &frames, QueuePolicy::DisconnectOnFull);
            if hub.ticking.insert(room_code.clone()) {
                spawn_room_tick(state.clone(), room_code, room);
            }
        }
        ParsedClientMessage::PlayerInput {
            room_code,
            direction,
        } => {
            let hub = state.lock().await;
            let Some(room) = member_room(&hub, client_id, &room_code) else {
                return;
            };
            lock_room(&room).submit_input(client_id, direction);
        }
        ParsedClientMessage::RequestGameState { room_code } => {
            let mut hub = state.lock().await;
            let Some(room) = member_room(&hub, client_id, &room_code) else {
                return;
            };
            let frame = lock_room(&room).state_frame();
            send_frame(&mut hub, client_id, &frame, QueuePolicy::DisconnectOnFull);
        }
    }
}

/// The room named in the message, but only if this connection is actually a
/// member of it.
fn member_room(
    hub: &ServerHub,
    client_id: &str,
    room_code: &str,
) -> Option<Arc<std::sync::Mutex<GameRoom>>> {
    if hub.registry.room_code_of(client_id) != Some(room_code) {
        return None;
    }
    hub.registry.room(room_code)
}

fn spawn_room_tick(state: SharedState, code: String, room: Arc<std::sync::Mutex<GameRoom>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_PERIOD_MS));
        loop {
            interval.tick().await;
            let (frames, connection_ids, over) = {
                let mut guard = lock_room(&room);
                let frames = guard.step(TICK_PERIOD_MS);
                (
                    frames,
                    guard.connection_ids(),
                    guard.is_ended() || guard.is_stopped(),
                )
            };
            if !frames.is_empty() {
                let mut hub = state.lock().await;
                broadcast_frames(&mut hub, &connection_ids, &frames, QueuePolicy::DropOnFull);
            }
            if over {
                let mut hub = state.lock().await;
                // restartGame may have revived the room between the step
                // and this check.
                let still_over = {
                    let guard = lock_room(&room);
                    guard.is_ended() || guard.is_stopped()
                };
                if still_over {
                    hub.ticking.remove(&code);
                    break;
                }
            }
        }
        println!("[server] tick loop for room {code} finished");
    });
}

fn start_sweep_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let mut hub = state.lock().await;
            for code in hub.registry.sweep(now_ms()) {
                hub.ticking.remove(&code);
            }
        }
    });
}

async fn handle_disconnect(state: SharedState, client_id: &str) {
    let mut hub = state.lock().await;
    hub.clients.remove(client_id);
    let Some(outcome) = hub.registry.handle_disconnect(client_id, now_ms()) else {
        return;
    };
    println!(
        "[server] {client_id} left room {} ({})",
        outcome.room_code,
        if outcome.room_torn_down {
            "room torn down"
        } else {
            "match continues"
        }
    );
    if outcome.room_torn_down {
        hub.ticking.remove(&outcome.room_code);
        return;
    }
    if let Some(room) = hub.registry.room(&outcome.room_code) {
        let connection_ids = lock_room(&room).connection_ids();
        let frame = OutboundFrame::PlayerLeft {
            connection_id: outcome.removed.connection_id,
        };
        broadcast_frames(
            &mut hub,
            &connection_ids,
            std::slice::from_ref(&frame),
            QueuePolicy::DropOnFull,
        );
    }
}

fn send_frame(hub: &mut ServerHub, client_id: &str, frame: &OutboundFrame, policy: QueuePolicy) {
    match serde_json::to_string(frame) {
        Ok(payload) => send_text(hub, client_id, payload, policy),
        Err(error) => eprintln!("[server] failed to serialize frame: {error}"),
    }
}

fn send_json(hub: &mut ServerHub, client_id: &str, message: &Value, policy: QueuePolicy) {
    send_text(hub, client_id, message.to_string(), policy);
}

fn send_text(hub: &mut ServerHub, client_id: &str, payload: String, policy: QueuePolicy) {
    let Some(client) = hub.clients.get(client_id) else {
        return;
    };
    let failed = client.tx.try_send(OutboundMessage::Text(payload)).is_err();
    if failed && policy == QueuePolicy::DisconnectOnFull {
        if let Some(client) = hub.clients.remove(client_id) {
            let _ = client.tx.try_send(OutboundMessage::Close {
                code: 1008,
                reason: "outbound queue overflow".to_string(),
            });
        }
    }
}

fn broadcast_frames(
    hub: &mut ServerHub,
    connection_ids: &[String],
    frames: &[OutboundFrame],
    policy: QueuePolicy,
) {
    for frame in frames {
        let payload = match serde_json::to_string(frame) {
            Ok(payload) => payload,
            Err(error) => {
                eprintln!("[server] failed to serialize frame: {error}");
                continue;
            }
        };
        for connection_id in connection_ids {
            send_text(hub, connection_id, payload.clone(), policy);
        }
    }
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

async fn send_error(state: &SharedState, client_id: &str, code: &str, message: &str) {
    let mut hub = state.lock().await;
    send_json(
        &mut hub,
        client_id,
        &json!({
            "type": "error",
            "code": code,
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}
