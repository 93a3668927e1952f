use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::auth::middleware::AuthUser;
use crate::dto::{CreateRoomRequest, MembershipResponse, RoomSnapshot};
use crate::error::AppError;
use crate::services::RoomService;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Build the room route group: `/rooms/...`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_room))
        .route("/{room_code}", get(get_room))
        .route("/{room_code}/join", post(join_room))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// `POST /api/v1/rooms`: Create a room; the caller becomes its host.
async fn create_room(
    State(state): State<AppState>,
    AuthUser(host): AuthUser,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<MembershipResponse>), AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let created = state.engine.create_room(&host, &request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /api/v1/rooms/{roomCode}/join`: Take a seat, or get the one already held.
async fn join_room(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(room_code): Path<String>,
) -> Result<Json<MembershipResponse>, AppError> {
    let joined = state.engine.join_room(&room_code, &user).await?;
    Ok(Json(joined))
}

/// `GET /api/v1/rooms/{roomCode}`: Current room state, members only.
async fn get_room(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(room_code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = RoomService::find_by_code(&state.db, &room_code)
        .await?
        .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))?;

    if RoomService::membership(&state.db, room.id, user.id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden("You are not in this room.".to_string()));
    }

    let snapshot = RoomService::load_snapshot(&state.db, room.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))?;
    Ok(Json(snapshot))
}
