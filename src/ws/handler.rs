//! WebSocket upgrade handlers for game sessions and the lobby feed

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{PlayerInput, RoomCommand};
use crate::lobby::LobbyError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, LobbyMsg, PlayerInfo, ServerMsg};

/// Query parameters for a game connection.
///
/// Identity comes from the external identity provider and is passed through.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub player_id: Uuid,
    pub name: Option<String>,
}

/// Game WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let display_name = query
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_name(query.player_id));

    info!(player_id = %query.player_id, "WebSocket upgrade for player");
    ws.on_upgrade(move |socket| handle_socket(socket, query.player_id, display_name, state))
}

fn default_name(player_id: Uuid) -> String {
    format!("Player_{}", &player_id.simple().to_string()[..8])
}

/// Room the session is currently bound to
struct RoomBinding {
    room_id: Uuid,
    input_tx: mpsc::Sender<PlayerInput>,
    forwarder: JoinHandle<()>,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, display_name: String, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(256);

    // Single writer owns the sink; room broadcasts and direct replies share it
    let writer_handle = tokio::spawn(run_writer(player_id, ws_sink, out_rx));

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if out_tx.send(welcome).await.is_err() {
        error!(player_id = %player_id, "Failed to queue welcome");
        writer_handle.abort();
        return;
    }

    let binding = run_session(player_id, display_name, ws_stream, &out_tx, &state).await;

    // Cleanup on disconnect
    if let Some(binding) = binding {
        binding.forwarder.abort();
        state.lobby.leave_room(binding.room_id, player_id).await;
    }
    drop(out_tx);
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Reader loop. Returns the room still bound when the socket closed.
async fn run_session(
    player_id: Uuid,
    display_name: String,
    mut ws_stream: SplitStream<WebSocket>,
    out_tx: &mpsc::Sender<ServerMsg>,
    state: &AppState,
) -> Option<RoomBinding> {
    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);
    let mut binding: Option<RoomBinding> = None;

    while let Some(result) = ws_stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
                continue;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        };

        if !rate_limiter.check_input() {
            warn!(player_id = %player_id, "Rate limited input message");
            continue;
        }

        let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                reply(out_tx, error_msg("bad_message", &e.to_string())).await;
                continue;
            }
        };

        match client_msg {
            ClientMsg::JoinRoom { room_id } => {
                // Finished rooms release the session
                if binding.as_ref().is_some_and(|b| b.input_tx.is_closed()) {
                    if let Some(closed) = binding.take() {
                        closed.forwarder.abort();
                    }
                }
                if let Some(current) = &binding {
                    let message = format!("Already in room {}", current.room_id);
                    reply(out_tx, error_msg("already_in_room", &message)).await;
                    continue;
                }

                let info = PlayerInfo {
                    player_id,
                    display_name: display_name.clone(),
                };
                match state.lobby.join_room(room_id, info).await {
                    Ok(joined) => {
                        // Confirmation goes out ahead of any room broadcast
                        reply(out_tx, joined.confirmation).await;
                        let forwarder =
                            tokio::spawn(forward_room(player_id, joined.events, out_tx.clone()));
                        binding = Some(RoomBinding {
                            room_id,
                            input_tx: joined.handle.input_tx,
                            forwarder,
                        });
                    }
                    Err(e) => {
                        warn!(
                            player_id = %player_id,
                            room_id = %room_id,
                            error = %e,
                            "Join failed"
                        );
                        reply(out_tx, lobby_error(&e)).await;
                    }
                }
            }
            ClientMsg::Intent { seq, action } => {
                let Some(current) = &binding else {
                    let msg = error_msg("not_in_room", "Join a room before sending intents");
                    reply(out_tx, msg).await;
                    continue;
                };

                let input = PlayerInput {
                    player_id,
                    command: RoomCommand::Intent { seq, action },
                    received_at: unix_millis(),
                };
                if current.input_tx.send(input).await.is_err() {
                    debug!(
                        player_id = %player_id,
                        room_id = %current.room_id,
                        "Room input channel closed"
                    );
                    if let Some(closed) = binding.take() {
                        closed.forwarder.abort();
                    }
                    reply(out_tx, lobby_error(&LobbyError::RoomClosed)).await;
                }
            }
            ClientMsg::Ping { t } => {
                reply(out_tx, ServerMsg::Pong { t }).await;
            }
            ClientMsg::LeaveRoom => {
                if let Some(current) = binding.take() {
                    current.forwarder.abort();
                    state.lobby.leave_room(current.room_id, player_id).await;
                }
            }
        }
    }

    binding
}

/// Forward one room's broadcasts to this connection
async fn forward_room(
    player_id: Uuid,
    mut room_rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
) {
    loop {
        match room_rx.recv().await {
            Ok(msg) => {
                let finished = matches!(msg, ServerMsg::GameOver { .. });
                if out_tx.send(msg).await.is_err() || finished {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    player_id = %player_id,
                    lagged_count = n,
                    "Client lagged, skipping {} messages",
                    n
                );
                // Next snapshot carries full state
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(player_id = %player_id, "Room channel closed");
                break;
            }
        }
    }
}

async fn run_writer(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

async fn reply(out_tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    if out_tx.send(msg).await.is_err() {
        debug!("Writer already gone");
    }
}

fn error_msg(code: &str, message: &str) -> ServerMsg {
    ServerMsg::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}

fn lobby_error(err: &LobbyError) -> ServerMsg {
    error_msg(err.code(), &err.to_string())
}

/// Lobby feed upgrade handler
pub async fn lobby_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_lobby_socket(socket, state))
}

/// Stream lobby notifications until either side closes
async fn handle_lobby_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut lobby_rx = state.lobby.subscribe();

    // Current waiting rooms first, then live updates
    for room in state.lobby.list_waiting() {
        if send_msg(&mut ws_sink, &LobbyMsg::RoomUpdated { room }).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = lobby_rx.recv() => match update {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(error = %e, "Lobby send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_count = n, "Lobby subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = ws_stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Lobby WebSocket closed");
}

/// Send a message over WebSocket
async fn send_msg<T: Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &T,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
