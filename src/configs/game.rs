use serde::{Deserialize, Serialize};

/// Tunables for the room session engine. Every field has a sensible default
/// so a bare `config.toml` runs a standard 10-round game.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GameConfig {
    pub countdown_ms: u64,
    pub playing_ms: u64,
    pub reveal_ms: u64,
    pub leaderboard_ms: u64,
    pub base_score: u32,
    pub max_rounds: usize,
    /// Streak divisor for the score multiplier: `1 + streak / streak_step`.
    pub streak_step: u32,
    /// Optional bound on the streak fed into the multiplier.
    pub streak_cap: Option<u32>,

    pub pool_min: usize,
    pub pool_max: usize,
    /// Per-attempt fetch budget for the public-playlist pool builder.
    pub pool_fetch_timeout_ms: u64,
    pub pool_attempts: u32,
    pub pool_retry_count: u32,
    pub pool_retry_delay_ms: u64,

    /// Aggregate budget for resolving all contributors' libraries.
    pub library_fetch_timeout_ms: u64,
    /// Extra tracks requested per contributor beyond the round count.
    pub library_fetch_buffer: usize,
    /// How long `startGame` waits for an in-flight players-liked build.
    pub start_build_wait_ms: u64,
    pub liked_min_contributors: usize,
    pub liked_min_total_tracks: usize,

    pub chat_history_limit: usize,
    pub chat_message_max_len: usize,
    pub chat_snapshot_limit: usize,
    pub draft_max_len: usize,

    pub suggestion_limit: usize,
    pub suggestion_bulk_rows: usize,
    pub suggestion_bulk_max: usize,

    pub leaderboard_limit: usize,
    /// How long a finished room lingers before the sweeper removes it.
    pub results_ttl_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            countdown_ms: 3000,
            playing_ms: 12_000,
            reveal_ms: 4000,
            leaderboard_ms: 3000,
            base_score: 1000,
            max_rounds: 10,
            streak_step: 2,
            streak_cap: None,

            pool_min: 24,
            pool_max: 100,
            pool_fetch_timeout_ms: 15_000,
            pool_attempts: 6,
            pool_retry_count: 3,
            pool_retry_delay_ms: 900,

            library_fetch_timeout_ms: 45_000,
            library_fetch_buffer: 10,
            start_build_wait_ms: 12_000,
            liked_min_contributors: 1,
            liked_min_total_tracks: 24,

            chat_history_limit: 120,
            chat_message_max_len: 400,
            chat_snapshot_limit: 80,
            draft_max_len: 120,

            suggestion_limit: 1000,
            suggestion_bulk_rows: 16_000,
            suggestion_bulk_max: 24_000,

            leaderboard_limit: 10,
            results_ttl_ms: 600_000,
        }
    }
}
