use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    common::{
        errors::{ErrorCode, GameError, GameResult},
        types::PlayerId,
    },
    game::{
        session::{ChatMessage, LibraryLinkUpdate, LibrarySyncStatus, PlaylistSelection, SourceMode},
        snapshot::RoomStateView,
        track::TrackProvider,
    },
    server::AppState,
    store::{CreateRoomOptions, CreatedRoom, JoinedRoom, RoomResultsView, StartedGame, SubmitResult},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    pub display_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBody {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBody {
    pub player_id: PlayerId,
    pub category_query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceModeBody {
    pub player_id: PlayerId,
    pub mode: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistBody {
    pub player_id: PlayerId,
    pub provider: String,
    pub playlist_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionBody {
    pub player_id: PlayerId,
    pub provider: String,
    pub include: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryLinksBody {
    pub player_id: PlayerId,
    pub links: Vec<LibraryLinkUpdate>,
    #[serde(default)]
    pub sync_status: Option<LibrarySyncStatus>,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyBody {
    pub player_id: PlayerId,
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickBody {
    pub player_id: PlayerId,
    pub target_id: PlayerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    pub player_id: PlayerId,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub player_id: PlayerId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

fn parse_provider(raw: &str) -> GameResult<TrackProvider> {
    TrackProvider::parse(raw)
        .ok_or_else(|| GameError::new(ErrorCode::InvalidProvider, format!("unknown provider: {}", raw)))
}

fn parse_source_mode(raw: &str) -> GameResult<SourceMode> {
    match raw {
        "public_playlist" => Ok(SourceMode::PublicPlaylist),
        "players_liked" => Ok(SourceMode::PlayersLiked),
        other => Err(GameError::new(
            ErrorCode::InvalidMode,
            format!("unknown source mode: {}", other),
        )),
    }
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoomOptions>,
) -> GameResult<Json<CreatedRoom>> {
    state.store.create_room(body).map(Json)
}

pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<JoinBody>,
) -> GameResult<Json<JoinedRoom>> {
    state
        .store
        .join_room_as_user(&code, &body.display_name, body.user_id)
        .await
        .map(Json)
}

pub async fn set_source(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<SourceBody>,
) -> GameResult<Json<RoomStateView>> {
    state
        .store
        .set_room_source(&code, &body.player_id, &body.category_query)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn set_source_mode(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<SourceModeBody>,
) -> GameResult<Json<RoomStateView>> {
    let mode = parse_source_mode(&body.mode)?;
    state
        .store
        .set_room_source_mode(&code, &body.player_id, mode)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn set_public_playlist(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlaylistBody>,
) -> GameResult<Json<RoomStateView>> {
    let selection = PlaylistSelection {
        provider: parse_provider(&body.provider)?,
        playlist_id: body.playlist_id,
    };
    state
        .store
        .set_room_public_playlist(&code, &body.player_id, selection)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn set_library_contribution(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<ContributionBody>,
) -> GameResult<Json<RoomStateView>> {
    let provider = parse_provider(&body.provider)?;
    state
        .store
        .set_player_library_contribution(&code, &body.player_id, provider, body.include)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn set_library_links(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<LibraryLinksBody>,
) -> GameResult<Json<RoomStateView>> {
    state
        .store
        .set_player_library_links(
            &code,
            &body.player_id,
            body.links,
            body.sync_status,
            body.last_error,
        )
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn set_ready(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<ReadyBody>,
) -> GameResult<Json<RoomStateView>> {
    state
        .store
        .set_player_ready(&code, &body.player_id, body.ready)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn kick_player(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<KickBody>,
) -> GameResult<Json<RoomStateView>> {
    state
        .store
        .kick_player(&code, &body.player_id, &body.target_id)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerBody>,
) -> GameResult<Json<serde_json::Value>> {
    state.store.remove_player(&code, &body.player_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn replay_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerBody>,
) -> GameResult<Json<RoomStateView>> {
    state.store.replay_room(&code, &body.player_id).await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerBody>,
) -> GameResult<Json<StartedGame>> {
    state
        .store
        .start_game(&code, &body.player_id)
        .await
        .map(Json)
}

pub async fn skip_round(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerBody>,
) -> GameResult<Json<RoomStateView>> {
    state
        .store
        .skip_current_round(&code, &body.player_id)
        .await?;
    state.store.room_state(&code).await.map(Json)
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<AnswerBody>,
) -> GameResult<Json<SubmitResult>> {
    state
        .store
        .submit_answer(&code, &body.player_id, &body.answer)
        .await
        .map(Json)
}

pub async fn submit_draft(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<AnswerBody>,
) -> GameResult<Json<SubmitResult>> {
    state
        .store
        .submit_draft_answer(&code, &body.player_id, &body.answer)
        .await
        .map(Json)
}

pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<ChatBody>,
) -> GameResult<Json<ChatMessage>> {
    state
        .store
        .post_chat_message(&code, &body.player_id, &body.text)
        .await
        .map(Json)
}

pub async fn room_state(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> GameResult<Json<RoomStateView>> {
    state.store.room_state(&code).await.map(Json)
}

pub async fn room_results(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> GameResult<Json<RoomResultsView>> {
    state.store.room_results(&code).await.map(Json)
}

pub async fn room_suggestions(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<SuggestionsQuery>,
) -> GameResult<Json<Vec<String>>> {
    state
        .store
        .room_answer_suggestions(&code, query.player_id.as_ref())
        .await
        .map(Json)
}
