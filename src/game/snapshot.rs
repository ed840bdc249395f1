use serde::Serialize;

use crate::{
    common::types::PlayerId,
    game::{
        media::embed_url,
        session::{
            ChatMessage, PlayerLibrary, PlayersLikedRules, PlaylistSelection, PoolBuildMeta,
            Reveal, RoomPhase, RoomSession, RoundMode, SourceMode,
        },
        track::TrackProvider,
    },
};

/// Read-only view of a room delivered to realtime clients. Building one
/// never fails and never touches the network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    pub room_code: String,
    pub state: RoomPhase,
    pub round: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RoundMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    pub server_now_ms: u64,
    pub player_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_player_id: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub ready_count: usize,
    pub all_ready: bool,
    pub can_start: bool,
    pub is_resolving_tracks: bool,
    pub pool_size: usize,
    pub category_query: String,
    pub source_mode: SourceMode,
    pub source_config: SourceConfigView,
    pub pool_build: PoolBuildMeta,
    pub total_rounds: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal: Option<RevealView>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub chat_messages: Vec<ChatMessage>,
    pub answer_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub display_name: String,
    pub is_ready: bool,
    pub has_answered_current_round: bool,
    pub is_host: bool,
    pub can_contribute_library: bool,
    pub library_contribution: PlayerLibrary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfigView {
    pub mode: SourceMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_playlist: Option<PlaylistSelection>,
    pub players_liked_rules: PlayersLikedRules,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaView {
    pub provider: TrackProvider,
    pub track_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealView {
    pub round: usize,
    pub track_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_romaji: Option<String>,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_romaji: Option<String>,
    pub provider: TrackProvider,
    pub mode: RoundMode,
    pub accepted_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    pub player_answers: Vec<crate::game::session::RevealAnswer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub last_round_score: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub correct_answers: u32,
    pub has_answered_current_round: bool,
}

fn reveal_view(session: &RoomSession, reveal: &Reveal) -> RevealView {
    RevealView {
        round: reveal.round,
        track_id: reveal.track.id.clone(),
        title: reveal.track.title.clone(),
        title_romaji: reveal.title_romaji.clone(),
        artist: reveal.track.artist.clone(),
        artist_romaji: reveal.artist_romaji.clone(),
        provider: reveal.track.provider,
        mode: reveal.mode,
        accepted_answer: reveal.accepted_answer.clone(),
        preview_url: reveal.track.preview_url.clone(),
        source_url: reveal.track.source_url.clone(),
        embed_url: embed_url(&session.room_code, reveal.round, &reveal.track),
        choices: reveal.choices.clone(),
        player_answers: reveal.player_answers.clone(),
    }
}

/// Builds the full snapshot. The caller must have advanced the machine with
/// `progress(now)` first.
pub fn build_room_state(session: &RoomSession, now: u64) -> RoomStateView {
    let host_player_id = session.host_player_id().cloned();
    let playing = session.phase == RoomPhase::Playing;

    let players: Vec<PlayerView> = session
        .players
        .iter()
        .map(|p| PlayerView {
            player_id: p.id.clone(),
            display_name: p.display_name.clone(),
            is_ready: p.is_ready,
            has_answered_current_round: session.submitted.contains_key(&p.id),
            is_host: Some(&p.id) == host_player_id.as_ref(),
            can_contribute_library: p.user_id.is_some()
                && !p.library.contributable_providers().is_empty(),
            library_contribution: p.library.clone(),
        })
        .collect();

    let ready_count = session.players.iter().filter(|p| p.is_ready).count();
    let all_ready = !session.players.is_empty() && ready_count == session.players.len();

    let mode = if playing { session.current_mode() } else { None };
    let choices = if playing && mode == Some(RoundMode::Mcq) {
        session.round_choices.get(&session.current_round).cloned()
    } else {
        None
    };

    let (preview_url, media) = if playing {
        match session.current_track() {
            Some(track) => (
                track.preview_url.clone(),
                Some(MediaView {
                    provider: track.provider,
                    track_id: track.id.clone(),
                    source_url: track.source_url.clone(),
                    embed_url: embed_url(&session.room_code, session.current_round, track),
                }),
            ),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    let show_reveal = matches!(
        session.phase,
        RoomPhase::Reveal | RoomPhase::Leaderboard | RoomPhase::Results
    );
    let reveal = if show_reveal {
        session.reveal.as_ref().map(|r| reveal_view(session, r))
    } else {
        None
    };

    let leaderboard: Vec<LeaderboardEntry> = session
        .ranking()
        .into_iter()
        .take(session.config.leaderboard_limit)
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i + 1,
            player_id: p.id.clone(),
            display_name: p.display_name.clone(),
            score: p.score,
            last_round_score: p.last_round_score,
            streak: p.streak,
            max_streak: p.max_streak,
            correct_answers: p.correct_answers,
            has_answered_current_round: session.submitted.contains_key(&p.id),
        })
        .collect();

    let chat_start = session
        .chat
        .len()
        .saturating_sub(session.config.chat_snapshot_limit);
    let chat_messages: Vec<ChatMessage> = session.chat.iter().skip(chat_start).cloned().collect();

    let deadline_ms = match session.phase {
        RoomPhase::Waiting | RoomPhase::Results => None,
        _ => Some(session.deadline_ms),
    };

    RoomStateView {
        room_code: session.room_code.0.clone(),
        state: session.phase,
        round: session.current_round,
        mode,
        choices,
        server_now_ms: now,
        player_count: session.players.len(),
        host_player_id,
        players,
        ready_count,
        all_ready,
        can_start: session.can_start(),
        is_resolving_tracks: session.pool_build.status
            == crate::game::session::PoolBuildStatus::Building,
        pool_size: session.track_pool.len(),
        category_query: session.category_query.clone(),
        source_mode: session.source_mode,
        source_config: SourceConfigView {
            mode: session.source_mode,
            public_playlist: session.public_playlist.clone(),
            players_liked_rules: session.players_liked_rules,
        },
        pool_build: session.pool_build.clone(),
        total_rounds: session.total_rounds,
        deadline_ms,
        preview_url,
        media,
        reveal,
        leaderboard,
        chat_messages,
        answer_suggestions: session.pool_suggestions(session.config.suggestion_limit),
    }
}
