use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::{server::AppState, transport::routes::{room_routes, stats_routes}};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(stats_routes::health))
        .route("/version", get(stats_routes::version))
        .route("/metrics", get(stats_routes::metrics))
        .route("/v1/info", get(stats_routes::info))
        .route("/v1/rooms", post(room_routes::create_room))
        .route("/v1/rooms/{code}", get(room_routes::room_state))
        .route("/v1/rooms/{code}/join", post(room_routes::join_room))
        .route("/v1/rooms/{code}/source", post(room_routes::set_source))
        .route(
            "/v1/rooms/{code}/source-mode",
            post(room_routes::set_source_mode),
        )
        .route(
            "/v1/rooms/{code}/playlist",
            post(room_routes::set_public_playlist),
        )
        .route(
            "/v1/rooms/{code}/library/contribution",
            post(room_routes::set_library_contribution),
        )
        .route(
            "/v1/rooms/{code}/library/links",
            post(room_routes::set_library_links),
        )
        .route("/v1/rooms/{code}/ready", post(room_routes::set_ready))
        .route("/v1/rooms/{code}/kick", post(room_routes::kick_player))
        .route("/v1/rooms/{code}/leave", post(room_routes::leave_room))
        .route("/v1/rooms/{code}/replay", post(room_routes::replay_room))
        .route("/v1/rooms/{code}/start", post(room_routes::start_game))
        .route("/v1/rooms/{code}/skip", post(room_routes::skip_round))
        .route("/v1/rooms/{code}/answer", post(room_routes::submit_answer))
        .route("/v1/rooms/{code}/draft", post(room_routes::submit_draft))
        .route("/v1/rooms/{code}/chat", post(room_routes::post_chat))
        .route("/v1/rooms/{code}/results", get(room_routes::room_results))
        .route(
            "/v1/rooms/{code}/suggestions",
            get(room_routes::room_suggestions),
        )
        .route(
            "/v1/rooms/{code}/ws",
            get(crate::transport::websocket_server::websocket_handler),
        )
}
