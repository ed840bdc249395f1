use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::{
    common::{
        errors::{ErrorCode, GameError, GameResult},
        types::{PlayerId, RoomCode},
    },
    configs::GameConfig,
    game::{
        clock::Clock,
        session::{
            LibraryLinkUpdate, LibrarySyncStatus, PlaylistSelection, PoolBuildStatus, RoomPhase,
            RoomSession, SourceMode,
        },
        snapshot::{RoomStateView, build_room_state},
        track::TrackProvider,
    },
    monitoring::ProviderMetrics,
    pool::{
        BuiltPool, ContributorSpec, LibrarySource, Romanizer, TrackPoolSource,
        build_players_liked_pool, build_public_pool,
    },
};

/// One registered room: the session behind its lock, plus a signal for
/// `startGame` calls waiting on a players-liked build.
pub struct RoomHandle {
    session: Mutex<RoomSession>,
    build_done: Notify,
}

/// Process-wide registry of live rooms. Every externally visible operation
/// goes through here; each room serializes its operations on its own lock,
/// and the lock is never held across an external fetch.
pub struct RoomStore {
    rooms: DashMap<String, Arc<RoomHandle>>,
    config: GameConfig,
    track_source: Arc<dyn TrackPoolSource>,
    library_source: Arc<dyn LibrarySource>,
    romanizer: Arc<dyn Romanizer>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ProviderMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRoomOptions {
    pub is_public: bool,
    pub category_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoom {
    pub room_code: String,
    pub player_id: PlayerId,
    pub host_player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedGame {
    pub source_mode: SourceMode,
    pub pool_size: usize,
    pub total_rounds: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPlayer {
    pub rank: usize,
    pub player_id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub last_round_score: u32,
    pub max_streak: u32,
    pub correct_answers: u32,
    /// Average response time over correct answers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_response_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResultsView {
    pub room_code: String,
    pub state: RoomPhase,
    pub finished: bool,
    pub total_rounds: usize,
    pub current_round: usize,
    pub ranking: Vec<RankedPlayer>,
}

impl RoomStore {
    pub fn new(
        config: GameConfig,
        track_source: Arc<dyn TrackPoolSource>,
        library_source: Arc<dyn LibrarySource>,
        romanizer: Arc<dyn Romanizer>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ProviderMetrics>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
            track_source,
            library_source,
            romanizer,
            clock,
            metrics,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn handle(&self, code: &str) -> GameResult<Arc<RoomHandle>> {
        let code = RoomCode::parse(code).ok_or_else(|| GameError::room_not_found(code))?;
        self.rooms
            .get(&code.0)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GameError::room_not_found(&code))
    }

    /// Lock the room, advance its machine, run `f`. The workhorse for every
    /// operation that never suspends.
    async fn with_room<R>(
        &self,
        code: &str,
        f: impl FnOnce(&mut RoomSession, u64) -> GameResult<R>,
    ) -> GameResult<R> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        f(&mut session, now)
    }

    // -- lifecycle -------------------------------------------------------

    pub fn create_room(&self, options: CreateRoomOptions) -> GameResult<CreatedRoom> {
        let now = self.clock.now_ms();
        loop {
            let code = RoomCode::generate();
            match self.rooms.entry(code.0.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    let session = RoomSession::new(
                        code.clone(),
                        now,
                        options.is_public,
                        options.category_query.clone(),
                        self.config.clone(),
                        self.romanizer.clone(),
                    );
                    slot.insert(Arc::new(RoomHandle {
                        session: Mutex::new(session),
                        build_done: Notify::new(),
                    }));
                    info!("room {} created", code);
                    return Ok(CreatedRoom {
                        room_code: code.0,
                    });
                }
            }
        }
    }

    pub async fn join_room(&self, code: &str, display_name: &str) -> GameResult<JoinedRoom> {
        self.join_room_as_user(code, display_name, None).await
    }

    pub async fn join_room_as_user(
        &self,
        code: &str,
        display_name: &str,
        user_id: Option<String>,
    ) -> GameResult<JoinedRoom> {
        self.with_room(code, |session, now| {
            let player_id = session.add_player(display_name, user_id, now)?;
            Ok(JoinedRoom {
                room_code: session.room_code.0.clone(),
                host_player_id: session
                    .host_player_id()
                    .cloned()
                    .unwrap_or_else(|| player_id.clone()),
                player_id,
            })
        })
        .await
    }

    pub async fn remove_player(&self, code: &str, player_id: &PlayerId) -> GameResult<()> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        let empty = session.remove_player(player_id)?;
        if empty {
            // Last player gone: the room dies and any in-flight build with
            // it.
            session.reset_pool_build();
            let code = session.room_code.0.clone();
            drop(session);
            self.rooms.remove(&code);
            info!("room {} destroyed (empty)", code);
        }
        Ok(())
    }

    pub async fn kick_player(
        &self,
        code: &str,
        requester: &PlayerId,
        target: &PlayerId,
    ) -> GameResult<()> {
        self.with_room(code, |session, _| session.kick_player(requester, target))
            .await
    }

    /// Explicit teardown, also used by the sweeper.
    pub async fn destroy_room(&self, code: &str) -> GameResult<()> {
        let handle = self.handle(code)?;
        let mut session = handle.session.lock().await;
        session.reset_pool_build();
        let code = session.room_code.0.clone();
        drop(session);
        self.rooms.remove(&code);
        info!("room {} destroyed", code);
        Ok(())
    }

    /// Removes empty rooms and rooms whose results window elapsed. Run
    /// periodically by the server.
    pub async fn sweep_expired(&self) {
        let now = self.clock.now_ms();
        let handles: Vec<Arc<RoomHandle>> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for handle in handles {
            let mut session = handle.session.lock().await;
            session.progress(now);
            let expired = session.players.is_empty()
                || (session.phase == RoomPhase::Results
                    && session
                        .results_at_ms
                        .is_some_and(|at| now.saturating_sub(at) >= self.config.results_ttl_ms));
            if expired {
                session.reset_pool_build();
                let code = session.room_code.0.clone();
                drop(session);
                self.rooms.remove(&code);
                info!("room {} swept", code);
            }
        }
    }

    // -- lobby configuration --------------------------------------------

    pub async fn set_player_ready(
        &self,
        code: &str,
        player_id: &PlayerId,
        ready: bool,
    ) -> GameResult<()> {
        self.with_room(code, |session, _| session.set_ready(player_id, ready))
            .await
    }

    pub async fn set_room_source(
        &self,
        code: &str,
        requester: &PlayerId,
        category_query: &str,
    ) -> GameResult<()> {
        self.with_room(code, |session, _| {
            session.set_category_query(requester, category_query)
        })
        .await
    }

    pub async fn set_room_source_mode(
        &self,
        code: &str,
        requester: &PlayerId,
        mode: SourceMode,
    ) -> GameResult<()> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        session.set_source_mode(requester, mode)?;
        if mode == SourceMode::PlayersLiked {
            self.kick_liked_build(&handle, &mut session);
        }
        Ok(())
    }

    pub async fn set_room_public_playlist(
        &self,
        code: &str,
        requester: &PlayerId,
        selection: PlaylistSelection,
    ) -> GameResult<()> {
        if !matches!(
            selection.provider,
            TrackProvider::Deezer | TrackProvider::Spotify
        ) {
            return Err(GameError::new(
                ErrorCode::InvalidProvider,
                format!("{} has no public playlists", selection.provider),
            ));
        }
        self.with_room(code, |session, _| {
            session.set_public_playlist(requester, selection)
        })
        .await
    }

    pub async fn set_player_library_contribution(
        &self,
        code: &str,
        player_id: &PlayerId,
        provider: TrackProvider,
        include: bool,
    ) -> GameResult<()> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        session.set_library_contribution(player_id, provider, include)?;
        if session.source_mode == SourceMode::PlayersLiked {
            self.kick_liked_build(&handle, &mut session);
        }
        Ok(())
    }

    pub async fn set_player_library_links(
        &self,
        code: &str,
        player_id: &PlayerId,
        updates: Vec<LibraryLinkUpdate>,
        sync_status: Option<LibrarySyncStatus>,
        last_error: Option<String>,
    ) -> GameResult<()> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        session.set_library_links(player_id, updates, sync_status, last_error)?;
        if session.source_mode == SourceMode::PlayersLiked {
            self.kick_liked_build(&handle, &mut session);
        }
        Ok(())
    }

    // -- players-liked build job ----------------------------------------

    /// Ensures a build is running. Called under the room lock; the spawned
    /// task begins by re-acquiring it, so it cannot run before the caller
    /// releases the room. At most one task runs per room: concurrent
    /// triggers fold into a single follow-up build.
    fn kick_liked_build(&self, handle: &Arc<RoomHandle>, session: &mut RoomSession) {
        if session.pool_build.status == PoolBuildStatus::Building {
            session.rebuild_requested = true;
            return;
        }
        let epoch = session.begin_liked_build();
        let contributors = session.eligible_contributors();
        let rounds = self.config.max_rounds;
        let min_total = session.players_liked_rules.min_total_tracks;
        let room = session.room_code.0.clone();

        let library = self.library_source.clone();
        let config = self.config.clone();
        let clock = self.clock.clone();
        let metrics = self.metrics.clone();
        let handle = handle.clone();

        tokio::spawn(async move {
            run_liked_build(
                library,
                config,
                clock,
                metrics,
                handle,
                room,
                contributors,
                rounds,
                min_total,
                epoch,
            )
            .await;
        });
    }

    // -- starting & rounds ----------------------------------------------

    pub async fn start_game(&self, code: &str, requester: &PlayerId) -> GameResult<StartedGame> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        session.check_start(requester)?;

        let rounds = self.config.max_rounds;
        match session.source_mode {
            SourceMode::PublicPlaylist => {
                self.start_public_playlist(handle.clone(), session, requester, rounds)
                    .await
            }
            SourceMode::PlayersLiked => {
                self.start_players_liked(handle.clone(), session, requester, rounds)
                    .await
            }
        }
    }

    async fn start_public_playlist(
        &self,
        handle: Arc<RoomHandle>,
        session: tokio::sync::MutexGuard<'_, RoomSession>,
        requester: &PlayerId,
        rounds: usize,
    ) -> GameResult<StartedGame> {
        let query = session.source_query().ok_or_else(|| {
            GameError::new(ErrorCode::SourceNotSet, "no playlist or query configured")
        })?;
        let generation = session.config_generation;
        // The fetch must not run under the room lock.
        drop(session);

        let result = build_public_pool(&*self.track_source, &query, rounds, &self.config).await;
        self.metrics
            .observe_fetch(provider_of_query(&query), result.is_ok());
        let pool = result?;

        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        // The lobby may have moved on while we were fetching.
        if session.phase != RoomPhase::Waiting || session.config_generation != generation {
            return Err(GameError::invalid_state(
                "room changed while the track pool was loading",
            ));
        }
        if !session.is_host(requester) {
            return Err(GameError::host_only());
        }
        session.commit_start(pool, rounds, now);
        info!(
            "room {} started: {} rounds from '{}'",
            session.room_code, rounds, query
        );
        Ok(StartedGame {
            source_mode: session.source_mode,
            pool_size: session.track_pool.len(),
            total_rounds: session.total_rounds,
        })
    }

    async fn start_players_liked(
        &self,
        handle: Arc<RoomHandle>,
        mut session: tokio::sync::MutexGuard<'_, RoomSession>,
        requester: &PlayerId,
        rounds: usize,
    ) -> GameResult<StartedGame> {
        let now = self.clock.now_ms();
        if let Some(started) = try_commit_cached_pool(&mut session, rounds, now) {
            return Ok(started);
        }
        if session.pool_build.status == PoolBuildStatus::Failed {
            // A previous build came up short; contributors may have changed
            // since, so try again.
            session.invalidate_pool_build_meta();
        }
        if session.pool_build.status != PoolBuildStatus::Building {
            self.kick_liked_build(&handle, &mut session);
        }
        drop(session);

        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.config.start_build_wait_ms);
        loop {
            let notified = handle.build_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let now = self.clock.now_ms();
                let mut session = handle.session.lock().await;
                session.progress(now);
                match session.pool_build.status {
                    PoolBuildStatus::Ready => {
                        if !session.is_host(requester) || session.phase != RoomPhase::Waiting {
                            return Err(GameError::invalid_state(
                                "room changed while the library pool was building",
                            ));
                        }
                        if let Some(started) = try_commit_cached_pool(&mut session, rounds, now) {
                            info!(
                                "room {} started from {} contributors' libraries",
                                session.room_code, session.pool_build.contributors_count
                            );
                            return Ok(started);
                        }
                        return Err(GameError::new(
                            ErrorCode::NoTracksFound,
                            "library pool too small for a full game",
                        ));
                    }
                    PoolBuildStatus::Failed => {
                        let code = session
                            .pool_build
                            .error_code
                            .unwrap_or(ErrorCode::NoTracksFound);
                        return Err(GameError::new(code, "library pool build failed"));
                    }
                    PoolBuildStatus::Building | PoolBuildStatus::Idle => {}
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(GameError::retryable(
                    ErrorCode::PlayersLibrarySyncing,
                    "players' libraries are still syncing",
                    1500,
                ));
            }
        }
    }

    pub async fn skip_current_round(&self, code: &str, requester: &PlayerId) -> GameResult<()> {
        self.with_room(code, |session, now| {
            session.skip_current_round(requester, now)
        })
        .await
    }

    pub async fn submit_answer(
        &self,
        code: &str,
        player_id: &PlayerId,
        answer: &str,
    ) -> GameResult<SubmitResult> {
        self.with_room(code, |session, now| {
            Ok(SubmitResult {
                accepted: session.submit_answer(player_id, answer, now),
            })
        })
        .await
    }

    pub async fn submit_draft_answer(
        &self,
        code: &str,
        player_id: &PlayerId,
        answer: &str,
    ) -> GameResult<SubmitResult> {
        self.with_room(code, |session, now| {
            Ok(SubmitResult {
                accepted: session.submit_draft(player_id, answer, now),
            })
        })
        .await
    }

    pub async fn post_chat_message(
        &self,
        code: &str,
        player_id: &PlayerId,
        text: &str,
    ) -> GameResult<crate::game::session::ChatMessage> {
        self.with_room(code, |session, now| session.post_chat(player_id, text, now))
            .await
    }

    pub async fn replay_room(&self, code: &str, requester: &PlayerId) -> GameResult<()> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        session.reset_for_replay(requester, now)?;
        if session.source_mode == SourceMode::PlayersLiked {
            self.kick_liked_build(&handle, &mut session);
        }
        Ok(())
    }

    // -- queries ---------------------------------------------------------

    pub async fn room_state(&self, code: &str) -> GameResult<RoomStateView> {
        self.with_room(code, |session, now| Ok(build_room_state(session, now)))
            .await
    }

    pub async fn room_results(&self, code: &str) -> GameResult<RoomResultsView> {
        self.with_room(code, |session, _| {
            let ranking = session
                .ranking()
                .into_iter()
                .enumerate()
                .map(|(i, p)| RankedPlayer {
                    rank: i + 1,
                    player_id: p.id.clone(),
                    display_name: p.display_name.clone(),
                    score: p.score,
                    last_round_score: p.last_round_score,
                    max_streak: p.max_streak,
                    correct_answers: p.correct_answers,
                    avg_response_ms: (p.correct_answers > 0)
                        .then(|| p.total_response_ms / p.correct_answers as u64),
                })
                .collect();
            Ok(RoomResultsView {
                room_code: session.room_code.0.clone(),
                state: session.phase,
                finished: session.phase == RoomPhase::Results,
                total_rounds: session.total_rounds,
                current_round: session.current_round,
                ranking,
            })
        })
        .await
    }

    /// Deduplicated answer-suggestion strings: the room's merged pools,
    /// augmented in players-liked mode by the library's bulk suggestion
    /// table.
    pub async fn room_answer_suggestions(
        &self,
        code: &str,
        _player_id: Option<&PlayerId>,
    ) -> GameResult<Vec<String>> {
        let handle = self.handle(code)?;
        let now = self.clock.now_ms();
        let (mut suggestions, bulk_seed) = {
            let mut session = handle.session.lock().await;
            session.progress(now);
            let base = session.pool_suggestions(self.config.suggestion_bulk_max);
            let seed = (session.source_mode == SourceMode::PlayersLiked)
                .then(|| format!("{}:{}", session.room_code, session.created_at_ms));
            (base, seed)
        };

        if let Some(seed) = bulk_seed {
            match self
                .library_source
                .fetch_answer_suggestions(&seed, self.config.suggestion_bulk_rows)
                .await
            {
                Ok(rows) => {
                    let mut seen: std::collections::HashSet<String> =
                        suggestions.iter().map(|s| s.to_lowercase()).collect();
                    for row in rows {
                        for candidate in [
                            Some(row.title),
                            Some(row.artist),
                            row.title_romaji,
                            row.artist_romaji,
                        ]
                        .into_iter()
                        .flatten()
                        {
                            if suggestions.len() >= self.config.suggestion_bulk_max {
                                break;
                            }
                            let key = candidate.to_lowercase();
                            if !key.is_empty() && seen.insert(key) {
                                suggestions.push(candidate);
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!("bulk suggestions unavailable: {}", e);
                }
            }
        }

        suggestions.truncate(self.config.suggestion_limit);
        Ok(suggestions)
    }
}

/// Reuses the pre-built players-liked pool when it can cover a full game.
fn try_commit_cached_pool(
    session: &mut RoomSession,
    rounds: usize,
    now: u64,
) -> Option<StartedGame> {
    if session.pool_build.status != PoolBuildStatus::Ready {
        return None;
    }
    let pool = session.players_liked_pool.as_ref()?;
    if pool.answers.len() < rounds {
        return None;
    }
    let total = pool.answers.len() + pool.distractors.len();
    let built = BuiltPool {
        answers: pool.answers.clone(),
        distractors: pool.distractors.clone(),
        merged_count: total,
        playable_count: total,
    };
    session.commit_start(built, rounds, now);
    Some(StartedGame {
        source_mode: session.source_mode,
        pool_size: session.track_pool.len(),
        total_rounds: session.total_rounds,
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_liked_build(
    library: Arc<dyn LibrarySource>,
    config: GameConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<ProviderMetrics>,
    handle: Arc<RoomHandle>,
    room: String,
    mut contributors: Vec<ContributorSpec>,
    rounds: usize,
    min_total: usize,
    mut epoch: u64,
) {
    loop {
        debug!(
            "room {}: building players-liked pool from {} contributors",
            room,
            contributors.len()
        );
        let result =
            build_players_liked_pool(&*library, &contributors, rounds, min_total, &config).await;
        metrics.observe_liked_build(result.is_ok());

        let now = clock.now_ms();
        let rearm = {
            let mut session = handle.session.lock().await;
            if !session.finish_liked_build(epoch, result, now) {
                debug!("room {}: discarding stale pool build", room);
                return;
            }
            handle.build_done.notify_waiters();
            if session.take_rebuild_request() {
                epoch = session.begin_liked_build();
                contributors = session.eligible_contributors();
                true
            } else {
                false
            }
        };
        if !rearm {
            return;
        }
        debug!("room {}: re-running pool build after concurrent change", room);
    }
}

fn provider_of_query(query: &str) -> &'static str {
    if query.starts_with("deezer:") {
        "deezer"
    } else if query.starts_with("spotify:") {
        "spotify"
    } else if query.starts_with("anime:") || query.starts_with("animethemes:") {
        "animethemes"
    } else {
        "search"
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        common::errors::ErrorCode,
        game::{
            clock::ManualClock,
            session::RoundMode,
            track::Track,
        },
        pool::{LikedTracksRequest, NoopRomanizer, NullLibrarySource, SourceError, SuggestionRow},
    };

    fn yt_track(id: &str, title: &str, artist: &str) -> Track {
        Track {
            provider: TrackProvider::Youtube,
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            preview_url: None,
            source_url: None,
            duration_sec: Some(180),
        }
    }

    struct FixedTrackSource {
        tracks: Vec<Track>,
    }

    #[async_trait]
    impl TrackPoolSource for FixedTrackSource {
        async fn fetch(&self, _query: &str, size: usize) -> Result<Vec<Track>, SourceError> {
            Ok(self.tracks.iter().take(size).cloned().collect())
        }
    }

    /// Library whose every fetch takes `delay_ms` of (paused) tokio time.
    struct SlowLibrary {
        tracks: Vec<Track>,
        delay_ms: u64,
    }

    #[async_trait]
    impl LibrarySource for SlowLibrary {
        async fn fetch_user_liked_tracks(
            &self,
            request: LikedTracksRequest,
        ) -> Result<Vec<Track>, SourceError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(self.tracks.iter().take(request.size).cloned().collect())
        }

        async fn fetch_answer_suggestions(
            &self,
            _seed: &str,
            row_limit: usize,
        ) -> Result<Vec<SuggestionRow>, SourceError> {
            Ok((0..row_limit.min(5))
                .map(|i| SuggestionRow {
                    title: format!("Library Song {}", i),
                    artist: format!("Library Artist {}", i),
                    title_romaji: None,
                    artist_romaji: None,
                })
                .collect())
        }
    }

    fn short_config(rounds: usize) -> GameConfig {
        GameConfig {
            countdown_ms: 10,
            playing_ms: 100,
            reveal_ms: 10,
            leaderboard_ms: 10,
            base_score: 1000,
            max_rounds: rounds,
            pool_retry_delay_ms: 1,
            ..GameConfig::default()
        }
    }

    fn make_store(
        config: GameConfig,
        track_source: Arc<dyn TrackPoolSource>,
        library_source: Arc<dyn LibrarySource>,
        clock: Arc<ManualClock>,
    ) -> RoomStore {
        RoomStore::new(
            config,
            track_source,
            library_source,
            Arc::new(NoopRomanizer),
            clock,
            Arc::new(ProviderMetrics::new()),
        )
    }

    async fn current_label(store: &RoomStore, code: &str) -> String {
        let handle = store.handle(code).unwrap();
        let now = store.clock.now_ms();
        let mut session = handle.session.lock().await;
        session.progress(now);
        session.current_track().expect("a round is open").canonical_label()
    }

    #[tokio::test]
    async fn test_full_two_round_game_two_players() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            short_config(2),
            Arc::new(FixedTrackSource {
                tracks: vec![
                    yt_track("t1", "Alpha Song", "Neon Waves"),
                    yt_track("t2", "Beta Lights", "City Echo"),
                ],
            }),
            Arc::new(NullLibrarySource),
            clock.clone(),
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store.join_room(&room, "Host").await.unwrap().player_id;
        let guest = store.join_room(&room, "Guest").await.unwrap().player_id;
        store.set_room_source(&room, &host, "retro mix").await.unwrap();

        let started = store.start_game(&room, &host).await.unwrap();
        assert_eq!(started.total_rounds, 2);
        assert_eq!(started.pool_size, 2);

        // countdown runs 1000..1010; round 1 plays 1010..1110
        clock.set(1010);
        let label1 = current_label(&store, &room).await;
        clock.set(1030);
        assert!(store.submit_answer(&room, &host, &label1).await.unwrap().accepted);
        clock.set(1050);
        assert!(
            store
                .submit_answer(&room, &guest, "no idea honestly")
                .await
                .unwrap()
                .accepted
        );

        // Both answered -> round closed at 1050; round 2 plays 1070..1170.
        clock.set(1080);
        let label2 = current_label(&store, &room).await;
        assert_ne!(label1, label2);
        assert!(store.submit_answer(&room, &host, &label2).await.unwrap().accepted);

        clock.set(2000);
        let results = store.room_results(&room).await.unwrap();
        assert!(results.finished);
        assert_eq!(results.ranking.len(), 2);
        assert_eq!(results.ranking[0].player_id, host);
        assert!(results.ranking[0].score > 0);
        assert_eq!(results.ranking[0].max_streak, 2);
        assert_eq!(results.ranking[1].player_id, guest);
        assert_eq!(results.ranking[1].score, 0);
    }

    #[tokio::test]
    async fn test_deezer_playlist_still_resolving() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            short_config(10),
            Arc::new(FixedTrackSource {
                tracks: vec![
                    yt_track("t1", "One", "A"),
                    yt_track("t2", "Two", "B"),
                    yt_track("t3", "Three", "C"),
                ],
            }),
            Arc::new(NullLibrarySource),
            clock,
        );

        let room = store
            .create_room(CreateRoomOptions {
                is_public: false,
                category_query: Some("deezer:playlist:7777".to_string()),
            })
            .unwrap()
            .room_code;
        let host = store.join_room(&room, "Host").await.unwrap().player_id;

        let state = store.room_state(&room).await.unwrap();
        assert_eq!(state.category_query, "deezer:playlist:7777");
        assert!(state.source_config.public_playlist.is_some());

        let err = store.start_game(&room, &host).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PlaylistTracksResolving);
        assert_eq!(err.retry_after_ms, Some(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_players_liked_cold_start_then_ready() {
        let clock = Arc::new(ManualClock::at(5000));
        let liked: Vec<Track> = (0..12)
            .map(|i| yt_track(&format!("l{}", i), &format!("Liked {}", i), "Someone"))
            .collect();
        let store = make_store(
            GameConfig {
                countdown_ms: 10,
                playing_ms: 100,
                ..GameConfig::default()
            },
            Arc::new(FixedTrackSource { tracks: Vec::new() }),
            Arc::new(SlowLibrary {
                tracks: liked,
                delay_ms: 20_000,
            }),
            clock.clone(),
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store
            .join_room_as_user(&room, "Host", Some("u1".to_string()))
            .await
            .unwrap()
            .player_id;
        store.join_room(&room, "Guest").await.unwrap();

        store
            .set_player_library_contribution(&room, &host, TrackProvider::Spotify, true)
            .await
            .unwrap();
        store
            .set_player_library_links(
                &room,
                &host,
                vec![LibraryLinkUpdate {
                    provider: TrackProvider::Spotify,
                    status: crate::game::session::ProviderLinkStatus::Linked,
                    estimated_track_count: None,
                }],
                Some(LibrarySyncStatus::Synced),
                None,
            )
            .await
            .unwrap();
        store
            .set_room_source_mode(&room, &host, SourceMode::PlayersLiked)
            .await
            .unwrap();

        // The build needs 20s; the start only waits 12s.
        let err = store.start_game(&room, &host).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PlayersLibrarySyncing);
        assert_eq!(err.retry_after_ms, Some(1500));

        // Let the background build finish.
        tokio::time::sleep(Duration::from_millis(25_000)).await;
        clock.set(40_000);

        let state = store.room_state(&room).await.unwrap();
        assert_eq!(state.pool_build.status, PoolBuildStatus::Ready);

        let started = store.start_game(&room, &host).await.unwrap();
        assert_eq!(started.source_mode, SourceMode::PlayersLiked);
        assert_eq!(started.pool_size, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroying_room_cancels_pending_build() {
        let clock = Arc::new(ManualClock::at(5000));
        let liked: Vec<Track> = (0..12)
            .map(|i| yt_track(&format!("l{}", i), &format!("Liked {}", i), "Someone"))
            .collect();
        let store = make_store(
            GameConfig::default(),
            Arc::new(FixedTrackSource { tracks: Vec::new() }),
            Arc::new(SlowLibrary {
                tracks: liked,
                delay_ms: 20_000,
            }),
            clock,
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store
            .join_room_as_user(&room, "Host", Some("u1".to_string()))
            .await
            .unwrap()
            .player_id;
        store
            .set_player_library_contribution(&room, &host, TrackProvider::Spotify, true)
            .await
            .unwrap();
        store
            .set_player_library_links(
                &room,
                &host,
                vec![LibraryLinkUpdate {
                    provider: TrackProvider::Spotify,
                    status: crate::game::session::ProviderLinkStatus::Linked,
                    estimated_track_count: None,
                }],
                None,
                None,
            )
            .await
            .unwrap();
        store
            .set_room_source_mode(&room, &host, SourceMode::PlayersLiked)
            .await
            .unwrap();

        let handle = store.handle(&room).unwrap();
        store.remove_player(&room, &host).await.unwrap();
        assert_eq!(store.room_count(), 0);

        // The orphaned build finishes eventually and must change nothing.
        tokio::time::sleep(Duration::from_millis(60_000)).await;
        let session = handle.session.lock().await;
        assert!(session.players_liked_pool.is_none());
        assert_eq!(session.pool_build.status, PoolBuildStatus::Idle);
        assert_eq!(store.room_count(), 0);
    }

    #[tokio::test]
    async fn test_single_track_pool_downgrades_to_text() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            short_config(1),
            Arc::new(FixedTrackSource {
                tracks: vec![yt_track("t1", "Alpha Song", "Neon Waves")],
            }),
            Arc::new(NullLibrarySource),
            clock.clone(),
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store.join_room(&room, "Solo").await.unwrap().player_id;
        store.set_room_source(&room, &host, "one hit").await.unwrap();
        store.start_game(&room, &host).await.unwrap();

        clock.set(1010);
        let state = store.room_state(&room).await.unwrap();
        assert_eq!(state.state, RoomPhase::Playing);
        assert_eq!(state.mode, Some(RoundMode::Text));
        assert!(state.choices.is_none());

        store.submit_answer(&room, &host, "wrong guess").await.unwrap();
        let state = store.room_state(&room).await.unwrap();
        let reveal = state.reveal.expect("round closed by the only player");
        assert_eq!(reveal.accepted_answer, "Alpha Song - Neon Waves");
    }

    #[tokio::test]
    async fn test_replay_resets_lobby_keeps_roster() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            short_config(1),
            Arc::new(FixedTrackSource {
                tracks: vec![yt_track("t1", "Alpha Song", "Neon Waves")],
            }),
            Arc::new(NullLibrarySource),
            clock.clone(),
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store.join_room(&room, "Host").await.unwrap().player_id;
        let guest = store.join_room(&room, "Guest").await.unwrap().player_id;
        store.set_player_ready(&room, &guest, true).await.unwrap();
        store.set_room_source(&room, &host, "one hit").await.unwrap();
        store.start_game(&room, &host).await.unwrap();

        clock.set(5000);
        let results = store.room_results(&room).await.unwrap();
        assert!(results.finished);

        // Only the host can replay.
        let err = store.replay_room(&room, &guest).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::HostOnly);
        store.replay_room(&room, &host).await.unwrap();

        let state = store.room_state(&room).await.unwrap();
        assert_eq!(state.state, RoomPhase::Waiting);
        assert_eq!(state.player_count, 2);
        assert_eq!(state.category_query, "");
        assert_eq!(state.ready_count, 0);
        assert!(state.leaderboard.iter().all(|entry| entry.score == 0));
    }

    #[tokio::test]
    async fn test_kick_and_host_handover() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            short_config(2),
            Arc::new(FixedTrackSource { tracks: Vec::new() }),
            Arc::new(NullLibrarySource),
            clock,
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store.join_room(&room, "Host").await.unwrap().player_id;
        let guest = store.join_room(&room, "Guest").await.unwrap().player_id;

        // Guests cannot kick, hosts cannot kick themselves.
        let err = store.kick_player(&room, &guest, &host).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::HostOnly);
        let err = store.kick_player(&room, &host, &host).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPayload);
        let err = store
            .kick_player(&room, &host, &PlayerId("p99".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TargetNotFound);

        store.kick_player(&room, &host, &guest).await.unwrap();
        let state = store.room_state(&room).await.unwrap();
        assert_eq!(state.player_count, 1);

        // Host leaving hands the room to nobody: it is destroyed.
        store.remove_player(&room, &host).await.unwrap();
        let err = store.room_state(&room).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RoomNotFound);
    }

    #[tokio::test]
    async fn test_suggestions_include_bulk_library_rows() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            GameConfig::default(),
            Arc::new(FixedTrackSource { tracks: Vec::new() }),
            Arc::new(SlowLibrary {
                tracks: Vec::new(),
                delay_ms: 0,
            }),
            clock,
        );

        let room = store.create_room(CreateRoomOptions::default()).unwrap().room_code;
        let host = store
            .join_room_as_user(&room, "Host", Some("u1".to_string()))
            .await
            .unwrap()
            .player_id;
        store
            .set_room_source_mode(&room, &host, SourceMode::PlayersLiked)
            .await
            .unwrap();

        let suggestions = store.room_answer_suggestions(&room, None).await.unwrap();
        assert!(suggestions.contains(&"Library Song 0".to_string()));
        assert!(suggestions.contains(&"Library Artist 4".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_room_code() {
        let clock = Arc::new(ManualClock::at(1000));
        let store = make_store(
            GameConfig::default(),
            Arc::new(FixedTrackSource { tracks: Vec::new() }),
            Arc::new(NullLibrarySource),
            clock,
        );
        let err = store.room_state("ZZZZZZ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RoomNotFound);
        let err = store.room_state("nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RoomNotFound);
    }
}
