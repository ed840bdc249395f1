use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    common::{
        errors::{ErrorCode, GameError, GameResult},
        types::{PlayerId, RoomCode, chat_message_id},
    },
    configs::GameConfig,
    game::{
        choices::build_choices,
        matching::{is_correct_choice, is_correct_text, text_variants},
        scoring::apply_score,
        track::{Track, TrackProvider},
    },
    pool::{BuiltPool, ContributorSpec, Romanizer},
};

// Room lifecycle
// --------------
//
// ```text
// [*] --> Waiting: room created / replay
//
// Waiting     --> Countdown:   host starts, pool committed
// Countdown   --> Playing:     deadline reached (round 1)
// Playing     --> Reveal:      deadline reached | host skip | all answered
// Reveal      --> Leaderboard: deadline reached
// Leaderboard --> Playing:     deadline reached, rounds remain
// Leaderboard --> Results:     deadline reached after the final round
// Results     --> Waiting:     host replays
// ```
//
// The machine never runs on a timer. Every operation and snapshot calls
// `progress(now)`, which replays any transitions whose deadline has passed.
// Each phase inherits the previous phase's deadline as its start instant, so
// catching up late yields exactly the same state as advancing step by step.

/// Phase of the room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Waiting,
    Countdown,
    Playing,
    Reveal,
    Leaderboard,
    Results,
}

/// How answers are collected for a round. Rounds alternate starting with
/// multiple choice; an MCQ round that cannot seat four coherent options is
/// downgraded to free text before the game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundMode {
    Mcq,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    PublicPlaylist,
    PlayersLiked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderLinkStatus {
    Linked,
    NotLinked,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySyncStatus {
    Idle,
    Syncing,
    Synced,
    Failed,
}

/// Per-player personal library wiring, fed by external sync workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLibrary {
    pub include_in_pool: HashMap<TrackProvider, bool>,
    pub linked_providers: HashMap<TrackProvider, ProviderLinkStatus>,
    pub estimated_track_count: HashMap<TrackProvider, u64>,
    pub sync_status: LibrarySyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Default for PlayerLibrary {
    fn default() -> Self {
        Self {
            include_in_pool: HashMap::new(),
            linked_providers: HashMap::new(),
            estimated_track_count: HashMap::new(),
            sync_status: LibrarySyncStatus::Idle,
            last_error: None,
        }
    }
}

impl PlayerLibrary {
    /// Providers this library can actually contribute: opted in, and either
    /// freshly linked or already holding synced tracks.
    pub fn contributable_providers(&self) -> Vec<TrackProvider> {
        self.include_in_pool
            .iter()
            .filter(|(provider, include)| {
                **include
                    && (self.linked_providers.get(*provider) == Some(&ProviderLinkStatus::Linked)
                        || self
                            .estimated_track_count
                            .get(*provider)
                            .copied()
                            .unwrap_or(0)
                            > 0)
            })
            .map(|(provider, _)| *provider)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub user_id: Option<String>,
    pub display_name: String,
    pub joined_at_ms: u64,
    pub is_ready: bool,
    pub score: u32,
    pub last_round_score: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub total_response_ms: u64,
    pub correct_answers: u32,
    pub library: PlayerLibrary,
}

impl Player {
    fn new(id: PlayerId, user_id: Option<String>, display_name: String, now: u64) -> Self {
        Self {
            id,
            user_id,
            display_name,
            joined_at_ms: now,
            is_ready: false,
            score: 0,
            last_round_score: 0,
            streak: 0,
            max_streak: 0,
            total_response_ms: 0,
            correct_answers: 0,
            library: PlayerLibrary::default(),
        }
    }

    fn reset_game_stats(&mut self) {
        self.is_ready = false;
        self.score = 0;
        self.last_round_score = 0;
        self.streak = 0;
        self.max_streak = 0;
        self.total_response_ms = 0;
        self.correct_answers = 0;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub value: String,
    pub submitted_at_ms: u64,
}

/// One player's line in the reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealAnswer {
    pub player_id: PlayerId,
    pub display_name: String,
    pub value: String,
    pub submitted_at_ms: u64,
    pub is_correct: bool,
    pub earned_score: u32,
    pub response_ms: u64,
}

/// Everything a client needs to show what the last closed round was.
#[derive(Debug, Clone)]
pub struct Reveal {
    pub round: usize,
    pub track: Track,
    pub title_romaji: Option<String>,
    pub artist_romaji: Option<String>,
    pub mode: RoundMode,
    pub accepted_answer: String,
    pub choices: Option<Vec<String>>,
    pub player_answers: Vec<RevealAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub player_id: PlayerId,
    pub display_name: String,
    pub text: String,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolBuildStatus {
    Idle,
    Building,
    Ready,
    Failed,
}

/// Progress of the players-liked pool build, surfaced verbatim in snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolBuildMeta {
    pub status: PoolBuildStatus,
    pub contributors_count: usize,
    pub merged_tracks_count: usize,
    pub playable_tracks_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_built_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl Default for PoolBuildMeta {
    fn default() -> Self {
        Self {
            status: PoolBuildStatus::Idle,
            contributors_count: 0,
            merged_tracks_count: 0,
            playable_tracks_count: 0,
            last_built_at_ms: None,
            error_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayersLikedRules {
    pub min_contributors: usize,
    pub min_total_tracks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSelection {
    pub provider: TrackProvider,
    pub playlist_id: String,
}

impl PlaylistSelection {
    pub fn source_query(&self) -> String {
        format!("{}:playlist:{}", self.provider.as_str(), self.playlist_id)
    }

    /// Recognises `<provider>:playlist:<id>` query strings.
    pub fn parse(query: &str) -> Option<Self> {
        let mut parts = query.splitn(3, ':');
        let provider = TrackProvider::parse(parts.next()?)?;
        if parts.next()? != "playlist" {
            return None;
        }
        let id = parts.next()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            provider,
            playlist_id: id.to_string(),
        })
    }
}

/// Pre-built players-liked pool kept alongside the room so a start can
/// reuse it without another fetch.
#[derive(Debug, Clone)]
pub struct LikedPool {
    pub answers: Vec<Track>,
    pub distractors: Vec<Track>,
}

/// One room's complete in-memory state. All access is serialized through the
/// store's per-room lock; methods here never block and never touch the
/// network.
pub struct RoomSession {
    pub room_code: RoomCode,
    pub created_at_ms: u64,
    pub is_public: bool,

    pub players: Vec<Player>,
    next_player_seq: u64,

    pub source_mode: SourceMode,
    pub category_query: String,
    pub public_playlist: Option<PlaylistSelection>,
    pub players_liked_rules: PlayersLikedRules,

    pub track_pool: Vec<Track>,
    pub distractor_pool: Vec<Track>,
    pub players_liked_pool: Option<LikedPool>,

    pub total_rounds: usize,
    pub round_modes: Vec<RoundMode>,
    pub round_choices: HashMap<usize, Vec<String>>,

    pub phase: RoomPhase,
    pub current_round: usize,
    pub deadline_ms: u64,
    pub round_started_at_ms: u64,
    pub results_at_ms: Option<u64>,
    pub submitted: HashMap<PlayerId, SubmittedAnswer>,
    pub drafts: HashMap<PlayerId, String>,

    pub reveal: Option<Reveal>,

    pub pool_build: PoolBuildMeta,
    pub rebuild_requested: bool,
    /// Bumped whenever in-flight background work must be invalidated
    /// (source change, replay, destruction). A build job only commits if the
    /// epoch it captured is still current.
    pub build_epoch: u64,
    /// Bumped on any source-config change so a suspended `startGame` can
    /// detect that its inputs went stale while it was fetching.
    pub config_generation: u64,

    pub chat: VecDeque<ChatMessage>,

    pub config: GameConfig,
    pub romanizer: Arc<dyn Romanizer>,
}

impl RoomSession {
    pub fn new(
        room_code: RoomCode,
        now: u64,
        is_public: bool,
        category_query: Option<String>,
        config: GameConfig,
        romanizer: Arc<dyn Romanizer>,
    ) -> Self {
        let category_query = category_query.unwrap_or_default();
        let public_playlist = PlaylistSelection::parse(&category_query)
            .filter(|sel| sel.provider == TrackProvider::Deezer);
        let rules = PlayersLikedRules {
            min_contributors: config.liked_min_contributors,
            min_total_tracks: config.liked_min_total_tracks,
        };
        Self {
            room_code,
            created_at_ms: now,
            is_public,
            players: Vec::new(),
            next_player_seq: 0,
            source_mode: SourceMode::PublicPlaylist,
            category_query,
            public_playlist,
            players_liked_rules: rules,
            track_pool: Vec::new(),
            distractor_pool: Vec::new(),
            players_liked_pool: None,
            total_rounds: 0,
            round_modes: Vec::new(),
            round_choices: HashMap::new(),
            phase: RoomPhase::Waiting,
            current_round: 0,
            deadline_ms: 0,
            round_started_at_ms: 0,
            results_at_ms: None,
            submitted: HashMap::new(),
            drafts: HashMap::new(),
            reveal: None,
            pool_build: PoolBuildMeta::default(),
            rebuild_requested: false,
            build_epoch: 0,
            config_generation: 0,
            chat: VecDeque::new(),
            config,
            romanizer,
        }
    }

    // -- players ---------------------------------------------------------

    /// Host is the earliest-joined surviving player.
    pub fn host_player_id(&self) -> Option<&PlayerId> {
        self.players.first().map(|p| &p.id)
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        self.host_player_id() == Some(player_id)
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == player_id)
    }

    pub fn add_player(
        &mut self,
        display_name: &str,
        user_id: Option<String>,
        now: u64,
    ) -> GameResult<PlayerId> {
        if self.phase == RoomPhase::Results {
            return Err(GameError::new(
                ErrorCode::RoomNotJoinable,
                "game already finished",
            ));
        }
        let name = display_name.trim();
        if name.is_empty() {
            return Err(GameError::new(
                ErrorCode::InvalidPayload,
                "display name must not be empty",
            ));
        }
        self.next_player_seq += 1;
        let id = PlayerId::from_seq(self.next_player_seq);
        self.players
            .push(Player::new(id.clone(), user_id, name.to_string(), now));
        // A roster change invalidates everyone's ready state.
        for p in &mut self.players {
            p.is_ready = false;
        }
        Ok(id)
    }

    /// Removes a player; returns true when the room is now empty and must be
    /// destroyed by the store.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> GameResult<bool> {
        let before = self.players.len();
        self.players.retain(|p| &p.id != player_id);
        if self.players.len() == before {
            return Err(GameError::player_not_found(player_id));
        }
        self.submitted.remove(player_id);
        self.drafts.remove(player_id);
        Ok(self.players.is_empty())
    }

    pub fn kick_player(&mut self, requester: &PlayerId, target: &PlayerId) -> GameResult<()> {
        if !self.is_host(requester) {
            return Err(GameError::host_only());
        }
        if self.phase != RoomPhase::Waiting {
            return Err(GameError::invalid_state("can only kick in the lobby"));
        }
        if requester == target {
            return Err(GameError::new(
                ErrorCode::InvalidPayload,
                "cannot kick yourself",
            ));
        }
        if self.player(target).is_none() {
            return Err(GameError::new(
                ErrorCode::TargetNotFound,
                format!("no such player: {}", target),
            ));
        }
        self.remove_player(target)?;
        Ok(())
    }

    pub fn set_ready(&mut self, player_id: &PlayerId, ready: bool) -> GameResult<()> {
        if self.phase != RoomPhase::Waiting {
            return Err(GameError::invalid_state("ready state only applies in the lobby"));
        }
        let player = self
            .player_mut(player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))?;
        player.is_ready = ready;
        Ok(())
    }

    // -- source config ---------------------------------------------------

    fn check_host_in_lobby(&self, requester: &PlayerId) -> GameResult<()> {
        if !self.is_host(requester) {
            return Err(GameError::host_only());
        }
        if self.phase != RoomPhase::Waiting {
            return Err(GameError::invalid_state(
                "source can only change in the lobby",
            ));
        }
        Ok(())
    }

    fn touch_source_config(&mut self) {
        self.config_generation += 1;
        for p in &mut self.players {
            p.is_ready = false;
        }
    }

    pub fn set_source_mode(&mut self, requester: &PlayerId, mode: SourceMode) -> GameResult<()> {
        self.check_host_in_lobby(requester)?;
        if self.source_mode != mode {
            self.source_mode = mode;
            self.track_pool.clear();
            self.distractor_pool.clear();
            self.players_liked_pool = None;
            self.reset_pool_build();
        }
        self.touch_source_config();
        Ok(())
    }

    pub fn set_category_query(&mut self, requester: &PlayerId, query: &str) -> GameResult<()> {
        self.check_host_in_lobby(requester)?;
        self.category_query = query.trim().to_string();
        self.public_playlist = PlaylistSelection::parse(&self.category_query)
            .filter(|sel| sel.provider == TrackProvider::Deezer);
        self.touch_source_config();
        Ok(())
    }

    pub fn set_public_playlist(
        &mut self,
        requester: &PlayerId,
        selection: PlaylistSelection,
    ) -> GameResult<()> {
        self.check_host_in_lobby(requester)?;
        self.public_playlist = Some(selection);
        self.touch_source_config();
        Ok(())
    }

    /// The query handed to the track source when the game starts.
    pub fn source_query(&self) -> Option<String> {
        match self.source_mode {
            SourceMode::PlayersLiked => Some("players:liked".to_string()),
            SourceMode::PublicPlaylist => {
                if let Some(selection) = &self.public_playlist {
                    Some(selection.source_query())
                } else if self.category_query.is_empty() {
                    None
                } else {
                    Some(self.category_query.clone())
                }
            }
        }
    }

    // -- player libraries ------------------------------------------------

    pub fn set_library_contribution(
        &mut self,
        player_id: &PlayerId,
        provider: TrackProvider,
        include: bool,
    ) -> GameResult<()> {
        let player = self
            .player_mut(player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))?;
        player.library.include_in_pool.insert(provider, include);
        if self.source_mode == SourceMode::PlayersLiked {
            self.invalidate_pool_build_meta();
        }
        Ok(())
    }

    pub fn set_library_links(
        &mut self,
        player_id: &PlayerId,
        updates: Vec<LibraryLinkUpdate>,
        sync_status: Option<LibrarySyncStatus>,
        last_error: Option<String>,
    ) -> GameResult<()> {
        let player = self
            .player_mut(player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))?;
        for update in updates {
            player
                .library
                .linked_providers
                .insert(update.provider, update.status);
            if let Some(count) = update.estimated_track_count {
                player
                    .library
                    .estimated_track_count
                    .insert(update.provider, count);
            }
        }
        if let Some(status) = sync_status {
            player.library.sync_status = status;
        }
        player.library.last_error = last_error;
        if self.source_mode == SourceMode::PlayersLiked {
            self.invalidate_pool_build_meta();
        }
        Ok(())
    }

    /// Players who can feed the players-liked pool right now.
    pub fn eligible_contributors(&self) -> Vec<ContributorSpec> {
        self.players
            .iter()
            .filter_map(|p| {
                let user_id = p.user_id.clone()?;
                let providers = p.library.contributable_providers();
                if providers.is_empty() {
                    return None;
                }
                Some(ContributorSpec { user_id, providers })
            })
            .collect()
    }

    // -- pool build bookkeeping -----------------------------------------

    /// Hard reset: forgets the build state and invalidates any in-flight
    /// job. Used when the source mode changes, on replay, and on teardown.
    pub fn reset_pool_build(&mut self) {
        self.pool_build = PoolBuildMeta::default();
        self.rebuild_requested = false;
        self.build_epoch += 1;
    }

    /// Soft reset after a contributor change: the cached pool and any
    /// finished status are stale, but a running job is left alone (the store
    /// coalesces the change into a follow-up build), keeping a single job in
    /// flight per room.
    pub fn invalidate_pool_build_meta(&mut self) {
        self.players_liked_pool = None;
        if self.pool_build.status != PoolBuildStatus::Building {
            self.pool_build = PoolBuildMeta::default();
        }
    }

    /// Marks the build as running and returns the epoch the job must present
    /// when committing.
    pub fn begin_liked_build(&mut self) -> u64 {
        self.pool_build.status = PoolBuildStatus::Building;
        self.pool_build.error_code = None;
        self.pool_build.contributors_count = self.eligible_contributors().len();
        self.build_epoch
    }

    /// Publishes a finished build. Returns false when the result belongs to
    /// an invalidated epoch and was discarded.
    pub fn finish_liked_build(
        &mut self,
        epoch: u64,
        outcome: Result<BuiltPool, GameError>,
        now: u64,
    ) -> bool {
        if epoch != self.build_epoch {
            return false;
        }
        match outcome {
            Ok(pool) => {
                self.pool_build.merged_tracks_count = pool.merged_count;
                self.pool_build.playable_tracks_count = pool.playable_count;
                self.pool_build.last_built_at_ms = Some(now);
                if pool.answers.len() >= self.config.max_rounds {
                    self.pool_build.status = PoolBuildStatus::Ready;
                    self.pool_build.error_code = None;
                } else {
                    self.pool_build.status = PoolBuildStatus::Failed;
                    self.pool_build.error_code = Some(ErrorCode::NoTracksFound);
                }
                self.players_liked_pool = Some(LikedPool {
                    answers: pool.answers,
                    distractors: pool.distractors,
                });
            }
            Err(err) => {
                self.pool_build.status = PoolBuildStatus::Failed;
                self.pool_build.error_code = Some(err.code);
                self.pool_build.last_built_at_ms = Some(now);
            }
        }
        true
    }

    pub fn take_rebuild_request(&mut self) -> bool {
        std::mem::take(&mut self.rebuild_requested)
    }

    // -- starting --------------------------------------------------------

    pub fn check_start(&self, requester: &PlayerId) -> GameResult<()> {
        if !self.is_host(requester) {
            return Err(GameError::host_only());
        }
        if self.phase != RoomPhase::Waiting {
            return Err(GameError::invalid_state("game already running"));
        }
        if self.players.is_empty() {
            return Err(GameError::new(ErrorCode::NoPlayers, "room has no players"));
        }
        match self.source_mode {
            SourceMode::PublicPlaylist => {
                if self.source_query().is_none() {
                    return Err(GameError::new(
                        ErrorCode::SourceNotSet,
                        "no playlist or query configured",
                    ));
                }
            }
            SourceMode::PlayersLiked => {
                let contributors = self.eligible_contributors().len();
                if contributors < self.players_liked_rules.min_contributors {
                    return Err(GameError::new(
                        ErrorCode::PlayersLibraryNotReady,
                        format!(
                            "need {} contributing players, have {}",
                            self.players_liked_rules.min_contributors, contributors
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Lobby-level "start button enabled" signal; host identity aside, the
    /// same checks as [`check_start`].
    pub fn can_start(&self) -> bool {
        match self.host_player_id() {
            Some(host) => {
                let host = host.clone();
                self.check_start(&host).is_ok()
            }
            None => false,
        }
    }

    /// Installs the built pool, plans the rounds (downgrading MCQ rounds the
    /// pool cannot support) and enters the countdown.
    pub fn commit_start(&mut self, pool: BuiltPool, total_rounds: usize, now: u64) {
        self.track_pool = pool.answers;
        self.track_pool.truncate(total_rounds);
        self.distractor_pool = pool.distractors;
        self.total_rounds = total_rounds;

        self.round_modes = (1..=total_rounds)
            .map(|round| {
                if round % 2 == 1 {
                    RoundMode::Mcq
                } else {
                    RoundMode::Text
                }
            })
            .collect();

        self.round_choices.clear();
        for round in 1..=total_rounds {
            if self.round_modes[round - 1] != RoundMode::Mcq {
                continue;
            }
            let answer = &self.track_pool[round - 1];
            let candidates: Vec<&Track> = self
                .track_pool
                .iter()
                .skip(round)
                .chain(self.distractor_pool.iter())
                .collect();
            match build_choices(answer, &candidates) {
                Some(options) => {
                    self.round_choices.insert(round, options);
                }
                None => {
                    self.round_modes[round - 1] = RoundMode::Text;
                }
            }
        }

        // Warm the romanization cache for the whole pool; reveals and the
        // matcher will only consult it synchronously.
        for track in self.track_pool.iter().chain(self.distractor_pool.iter()) {
            self.romanizer.schedule(&track.title);
            self.romanizer.schedule(&track.artist);
        }

        self.reveal = None;
        self.current_round = 0;
        self.phase = RoomPhase::Countdown;
        self.deadline_ms = now + self.config.countdown_ms;
    }

    // -- the machine -----------------------------------------------------

    /// Replays every transition whose deadline has passed. Idempotent:
    /// `progress(t1); progress(t2)` is the same as `progress(t2)` for
    /// `t1 <= t2`.
    pub fn progress(&mut self, now: u64) {
        loop {
            match self.phase {
                RoomPhase::Waiting | RoomPhase::Results => return,
                RoomPhase::Countdown => {
                    if now < self.deadline_ms {
                        return;
                    }
                    let start = self.deadline_ms;
                    self.enter_playing(1, start);
                }
                RoomPhase::Playing => {
                    if now < self.deadline_ms {
                        return;
                    }
                    let close_at = self.deadline_ms;
                    self.close_current_round(close_at);
                }
                RoomPhase::Reveal => {
                    if now < self.deadline_ms {
                        return;
                    }
                    self.phase = RoomPhase::Leaderboard;
                    self.deadline_ms += self.config.leaderboard_ms;
                }
                RoomPhase::Leaderboard => {
                    if now < self.deadline_ms {
                        return;
                    }
                    let at = self.deadline_ms;
                    if self.current_round < self.total_rounds {
                        let next = self.current_round + 1;
                        self.enter_playing(next, at);
                    } else {
                        self.phase = RoomPhase::Results;
                        self.results_at_ms = Some(at);
                    }
                }
            }
        }
    }

    fn enter_playing(&mut self, round: usize, start: u64) {
        self.phase = RoomPhase::Playing;
        self.current_round = round;
        self.round_started_at_ms = start;
        self.deadline_ms = start + self.config.playing_ms;
        self.submitted.clear();
        self.drafts.clear();
    }

    pub fn current_mode(&self) -> Option<RoundMode> {
        if self.current_round == 0 {
            return None;
        }
        self.round_modes.get(self.current_round - 1).copied()
    }

    pub fn current_track(&self) -> Option<&Track> {
        if self.current_round == 0 {
            return None;
        }
        self.track_pool.get(self.current_round - 1)
    }

    /// Closes the open round: promotes drafts, scores every player, builds
    /// the reveal, and advances the machine.
    fn close_current_round(&mut self, close_at: u64) {
        let round = self.current_round;
        let Some(track) = self.track_pool.get(round - 1).cloned() else {
            // Defensive: a playing phase without a track cannot be scored.
            self.phase = RoomPhase::Results;
            self.results_at_ms = Some(close_at);
            return;
        };
        let mode = self
            .round_modes
            .get(round - 1)
            .copied()
            .unwrap_or(RoundMode::Text);

        // A non-empty draft from a player who never pressed submit counts as
        // a submission at the instant the round closes.
        let mut submitted = std::mem::take(&mut self.submitted);
        let drafts = std::mem::take(&mut self.drafts);
        for player in &self.players {
            if submitted.contains_key(&player.id) {
                continue;
            }
            if let Some(draft) = drafts.get(&player.id) {
                let draft = draft.trim();
                if !draft.is_empty() {
                    submitted.insert(
                        player.id.clone(),
                        SubmittedAnswer {
                            value: draft.to_string(),
                            submitted_at_ms: close_at,
                        },
                    );
                }
            }
        }

        let title_romaji = self.romanizer.cached(&track.title);
        let artist_romaji = self.romanizer.cached(&track.artist);
        let variants = text_variants(&track, title_romaji.as_deref(), artist_romaji.as_deref());

        let playing_ms = self.config.playing_ms;
        let base_score = self.config.base_score;
        let streak_step = self.config.streak_step;
        let streak_cap = self.config.streak_cap;
        let round_start = self.round_started_at_ms;

        let mut player_answers = Vec::new();
        for player in &mut self.players {
            let submission = submitted.get(&player.id).cloned();
            let (is_correct, response_ms) = match &submission {
                Some(answer) => {
                    let correct = match mode {
                        RoundMode::Mcq => is_correct_choice(&answer.value, &track),
                        RoundMode::Text => is_correct_text(&answer.value, &variants),
                    };
                    (correct, answer.submitted_at_ms.saturating_sub(round_start))
                }
                None => (false, 0),
            };

            let outcome = apply_score(
                is_correct,
                response_ms,
                playing_ms,
                player.streak,
                base_score,
                streak_step,
                streak_cap,
            );
            player.score += outcome.earned;
            player.last_round_score = outcome.earned;
            player.streak = outcome.next_streak;
            player.max_streak = player.max_streak.max(player.streak);
            if is_correct {
                player.correct_answers += 1;
                player.total_response_ms += response_ms;
            }

            if let Some(answer) = submission {
                player_answers.push(RevealAnswer {
                    player_id: player.id.clone(),
                    display_name: player.display_name.clone(),
                    value: answer.value,
                    submitted_at_ms: answer.submitted_at_ms,
                    is_correct,
                    earned_score: outcome.earned,
                    response_ms,
                });
            }
        }

        self.reveal = Some(Reveal {
            round,
            accepted_answer: track.canonical_label(),
            title_romaji,
            artist_romaji,
            mode,
            choices: self.round_choices.get(&round).cloned(),
            player_answers,
            track,
        });

        // Keep the submissions visible (for `hasAnsweredCurrentRound`) until
        // the next round opens.
        self.submitted = submitted;
        self.phase = RoomPhase::Reveal;
        self.deadline_ms = close_at + self.config.reveal_ms;
    }

    // -- in-round operations --------------------------------------------

    /// Records an answer. Never fails: the result only says whether the
    /// submission counted (open round, known player, first submission).
    pub fn submit_answer(&mut self, player_id: &PlayerId, value: &str, now: u64) -> bool {
        if self.phase != RoomPhase::Playing {
            return false;
        }
        if self.player(player_id).is_none() {
            return false;
        }
        if self.submitted.contains_key(player_id) {
            return false;
        }
        self.submitted.insert(
            player_id.clone(),
            SubmittedAnswer {
                value: value.to_string(),
                submitted_at_ms: now,
            },
        );

        // Everyone in -> no reason to sit out the rest of the window.
        let all_in = self
            .players
            .iter()
            .all(|p| self.submitted.contains_key(&p.id));
        if all_in {
            self.close_current_round(now);
        }
        true
    }

    /// Stores a draft (last-writer-wins, capped). Drafts become submissions
    /// when the round closes.
    pub fn submit_draft(&mut self, player_id: &PlayerId, value: &str, _now: u64) -> bool {
        if self.phase != RoomPhase::Playing {
            return false;
        }
        if self.player(player_id).is_none() {
            return false;
        }
        if self.submitted.contains_key(player_id) {
            return false;
        }
        let capped: String = value.chars().take(self.config.draft_max_len).collect();
        self.drafts.insert(player_id.clone(), capped);
        true
    }

    pub fn skip_current_round(&mut self, requester: &PlayerId, now: u64) -> GameResult<()> {
        if !self.is_host(requester) {
            return Err(GameError::host_only());
        }
        if self.phase != RoomPhase::Playing {
            return Err(GameError::invalid_state("no round to skip"));
        }
        self.close_current_round(now);
        Ok(())
    }

    // -- chat ------------------------------------------------------------

    pub fn post_chat(
        &mut self,
        player_id: &PlayerId,
        text: &str,
        now: u64,
    ) -> GameResult<ChatMessage> {
        let player = self
            .player(player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GameError::new(
                ErrorCode::InvalidPayload,
                "empty chat message",
            ));
        }
        let text: String = trimmed
            .chars()
            .take(self.config.chat_message_max_len)
            .collect();
        let message = ChatMessage {
            id: chat_message_id(now),
            player_id: player.id.clone(),
            display_name: player.display_name.clone(),
            text,
            at_ms: now,
        };
        self.chat.push_back(message.clone());
        while self.chat.len() > self.config.chat_history_limit {
            self.chat.pop_front();
        }
        Ok(message)
    }

    // -- replay ----------------------------------------------------------

    pub fn reset_for_replay(&mut self, requester: &PlayerId, _now: u64) -> GameResult<()> {
        if !self.is_host(requester) {
            return Err(GameError::host_only());
        }
        if self.phase != RoomPhase::Results {
            return Err(GameError::invalid_state("replay is only possible after results"));
        }

        for player in &mut self.players {
            player.reset_game_stats();
            // Contribution opt-ins survive a replay only while the provider
            // is still usable (live link or already-synced tracks).
            let retained = player.library.contributable_providers();
            player.library.include_in_pool.clear();
            for provider in retained {
                player.library.include_in_pool.insert(provider, true);
            }
        }

        self.track_pool.clear();
        self.distractor_pool.clear();
        self.players_liked_pool = None;
        self.total_rounds = 0;
        self.round_modes.clear();
        self.round_choices.clear();
        self.current_round = 0;
        self.deadline_ms = 0;
        self.round_started_at_ms = 0;
        self.results_at_ms = None;
        self.submitted.clear();
        self.drafts.clear();
        self.reveal = None;
        self.chat.clear();
        self.category_query.clear();
        self.public_playlist = None;
        self.reset_pool_build();
        self.config_generation += 1;
        self.phase = RoomPhase::Waiting;
        Ok(())
    }

    // -- ranking & suggestions ------------------------------------------

    /// Stable ranking: score, then max streak, then average correct-answer
    /// response time (players without a correct answer last), then join
    /// order.
    pub fn ranking(&self) -> Vec<&Player> {
        let mut ordered: Vec<&Player> = self.players.iter().collect();
        ordered.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.max_streak.cmp(&a.max_streak))
                .then_with(|| compare_avg_response(a, b))
        });
        ordered
    }

    /// Deduplicated title/artist/romaji strings from the pools this room has
    /// already merged.
    pub fn pool_suggestions(&self, limit: usize) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let liked = self.players_liked_pool.iter().flat_map(|pool| {
            pool.answers.iter().chain(pool.distractors.iter())
        });
        let all = self
            .track_pool
            .iter()
            .chain(self.distractor_pool.iter())
            .chain(liked);
        for track in all {
            let mut candidates = vec![track.title.clone(), track.artist.clone()];
            if let Some(romaji) = self.romanizer.cached(&track.title) {
                candidates.push(romaji);
            }
            if let Some(romaji) = self.romanizer.cached(&track.artist) {
                candidates.push(romaji);
            }
            for candidate in candidates {
                if out.len() >= limit {
                    return out;
                }
                let key = candidate.to_lowercase();
                if !key.is_empty() && seen.insert(key) {
                    out.push(candidate);
                }
            }
        }
        out
    }
}

fn compare_avg_response(a: &Player, b: &Player) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.correct_answers, b.correct_answers) {
        (0, 0) => Ordering::Equal,
        (0, _) => Ordering::Greater,
        (_, 0) => Ordering::Less,
        (ca, cb) => {
            // avg_a < avg_b  <=>  total_a * cb < total_b * ca
            let left = a.total_response_ms as u128 * cb as u128;
            let right = b.total_response_ms as u128 * ca as u128;
            left.cmp(&right)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryLinkUpdate {
    pub provider: TrackProvider,
    pub status: ProviderLinkStatus,
    #[serde(default)]
    pub estimated_track_count: Option<u64>,
}
