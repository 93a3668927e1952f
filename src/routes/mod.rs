mod game_ws;
mod health;
mod rooms;

use axum::Router;

use crate::state::AppState;

/// Build the complete application router.
///
/// Structure:
/// - `GET /health`: lightweight health check
/// - `GET /api/v1/health`: detailed health check with database connectivity
/// - `/api/v1/rooms/...`: room creation, joining and lookup
/// - `GET /ws/game/{roomCode}`: the game `WebSocket`
pub fn router() -> Router<AppState> {
    let api_v1 = Router::new()
        .merge(health::api_router())
        .nest("/rooms", rooms::router());

    Router::new()
        .merge(health::root_router())
        .merge(game_ws::router())
        .nest("/api/v1", api_v1)
}
