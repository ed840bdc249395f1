use std::{collections::HashSet, time::Duration};

use futures::future::join_all;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::{
    common::errors::{ErrorCode, GameError, GameResult},
    configs::GameConfig,
    game::track::{Track, TrackProvider},
    pool::{BuiltPool, LibrarySource, LikedTracksRequest, SourceError},
};

/// One opted-in player whose library feeds the merged pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorSpec {
    pub user_id: String,
    pub providers: Vec<TrackProvider>,
}

/// Resolves and merges the contributors' liked tracks into an
/// answer/distractor pool. The whole fan-out shares one aggregate timeout;
/// a single failing contributor fails the build (the store records the error
/// code and the room can retry).
pub async fn build_players_liked_pool(
    library: &dyn LibrarySource,
    contributors: &[ContributorSpec],
    requested_rounds: usize,
    min_total_tracks: usize,
    config: &GameConfig,
) -> GameResult<BuiltPool> {
    let per_contributor_size =
        min_total_tracks.max(requested_rounds) + config.library_fetch_buffer;

    let fetches = contributors.iter().map(|contributor| {
        library.fetch_user_liked_tracks(LikedTracksRequest {
            user_id: contributor.user_id.clone(),
            providers: contributor.providers.clone(),
            size: per_contributor_size,
            allow_external_resolve: true,
        })
    });

    let timeout = Duration::from_millis(config.library_fetch_timeout_ms);
    let results: Vec<Result<Vec<Track>, SourceError>> =
        match tokio::time::timeout(timeout, join_all(fetches)).await {
            Ok(results) => results,
            Err(_) => {
                warn!(
                    "players-liked build timed out after {}ms ({} contributors)",
                    config.library_fetch_timeout_ms,
                    contributors.len()
                );
                return Err(GameError::new(
                    ErrorCode::PlayersLibraryTimeout,
                    "library fetch exceeded the aggregate budget",
                ));
            }
        };

    let mut merged: Vec<Track> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut fetched_total = 0usize;
    for result in results {
        let tracks = result.map_err(|err| match err {
            SourceError::RateLimited { retry_after_ms } => GameError::retryable(
                ErrorCode::SpotifyRateLimited,
                "library provider rate limited",
                retry_after_ms,
            ),
            SourceError::Unavailable(message) => {
                GameError::new(ErrorCode::PlayersLibrarySyncTimeout, message)
            }
        })?;
        fetched_total += tracks.len();
        for track in tracks {
            if !track.is_playable() || track.is_promotional() {
                continue;
            }
            if seen.insert(track.signature()) {
                merged.push(track);
            }
        }
    }

    debug!(
        "players-liked merge: {} fetched, {} unique playable from {} contributors",
        fetched_total,
        merged.len(),
        contributors.len()
    );

    let merged_count = merged.len();
    merged.shuffle(&mut rand::thread_rng());
    let distractors = merged.split_off(requested_rounds.min(merged.len()));
    Ok(BuiltPool {
        playable_count: merged_count,
        merged_count,
        answers: merged,
        distractors,
    })
}
