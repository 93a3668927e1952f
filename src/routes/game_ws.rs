use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::authenticate;
use crate::engine::RoundEngine;
use crate::error::AppError;
use crate::services::RoomService;
use crate::state::AppState;

/// Build the gateway route: `/ws/game/{room_code}`
pub fn router() -> Router<AppState> {
    Router::new().route("/ws/game/{room_code}", get(ws_upgrade))
}

#[derive(Deserialize)]
struct WsQueryParams {
    token: Option<String>,
}

/// A connection that passed authentication.
#[derive(Debug, Clone, Copy)]
struct Seat {
    room_id: Uuid,
    player_id: Uuid,
}

/// `GET /ws/game/{roomCode}?token=...`: Upgrade to `WebSocket`.
///
/// The upgrade is always accepted; a connection that fails authentication or membership is
/// closed right away with a policy-violation frame.
async fn ws_upgrade(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(params): Query<WsQueryParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let admission = admit(&state, &room_code, params.token.as_deref()).await;

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok(seat) => handle_ws_connection(state.engine, seat, socket).await,
            Err(e) => reject(socket, &room_code, e).await,
        }
    })
}

/// Resolve the token and room code to a seat the caller already holds.
async fn admit(state: &AppState, room_code: &str, token: Option<&str>) -> Result<Seat, AppError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Token required.".to_string()))?;
    let user = authenticate(&state.db, token, &state.config.jwt_secret).await?;

    let room = RoomService::find_by_code(&state.db, room_code)
        .await?
        .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))?;

    let seat = RoomService::membership(&state.db, room.id, user.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Join the room before connecting.".to_string()))?;

    Ok(Seat {
        room_id: room.id,
        player_id: seat.id,
    })
}

async fn reject(mut socket: WebSocket, room_code: &str, error: AppError) {
    tracing::warn!(room = %room_code, reason = %error.client_message(), "WebSocket rejected");
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: error.client_message().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Pump one authenticated connection until either side closes.
async fn handle_ws_connection(engine: RoundEngine, seat: Seat, socket: WebSocket) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let connection_id = engine.connect(seat.room_id, seat.player_id, tx).await;

    // Forward outbound events to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sink.send(Message::Text(msg.into())).await.is_err() {
                return;
            }
        }
        // Registry dropped our sender: the room is gone
        let _ = ws_sink.send(Message::Close(None)).await;
    });

    // Inbound frames are applied one at a time. Each runs in its own task so that an
    // action already accepted finishes even if this loop is torn down.
    let recv_engine = engine.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                Message::Text(text) => {
                    let engine = recv_engine.clone();
                    let raw = text.to_string();
                    let applied = tokio::spawn(async move {
                        engine.dispatch(seat.room_id, seat.player_id, &raw).await;
                    });
                    let _ = applied.await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    engine
        .disconnect(seat.room_id, seat.player_id, connection_id)
        .await;
}
