use std::{collections::HashSet, time::Duration};

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::{
    common::errors::{ErrorCode, GameError, GameResult},
    configs::GameConfig,
    game::track::Track,
    pool::{SourceError, TrackPoolSource},
};

/// Answer/distractor split produced by a pool build.
#[derive(Debug, Clone)]
pub struct BuiltPool {
    pub answers: Vec<Track>,
    pub distractors: Vec<Track>,
    /// Unique playable tracks collected before the split.
    pub merged_count: usize,
    pub playable_count: usize,
}

/// How many candidates to aim for before splitting: enough for the rounds
/// plus a healthy distractor margin, clamped to `[pool_min, pool_max]`.
pub fn target_pool_size(requested_rounds: usize, config: &GameConfig) -> usize {
    (requested_rounds + 3)
        .max(requested_rounds * 5)
        .max(config.pool_min)
        .min(config.pool_max)
}

fn split_pool(mut collected: Vec<Track>, requested_rounds: usize) -> BuiltPool {
    let merged_count = collected.len();
    collected.shuffle(&mut rand::thread_rng());
    let distractors = collected.split_off(requested_rounds.min(collected.len()));
    BuiltPool {
        playable_count: merged_count,
        merged_count,
        answers: collected,
        distractors,
    }
}

/// Collects candidates from the source until the target is reached, growing
/// the request size geometrically. Filters to playable, non-promotional
/// tracks and dedupes by signature.
async fn collect_candidates(
    source: &dyn TrackPoolSource,
    query: &str,
    target: usize,
    config: &GameConfig,
) -> GameResult<Vec<Track>> {
    let mut collected: Vec<Track> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut request_size = target;

    for attempt in 0..config.pool_attempts {
        let fetch = source.fetch(query, request_size);
        let timeout = Duration::from_millis(config.pool_fetch_timeout_ms);
        let tracks = match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(tracks)) => tracks,
            Ok(Err(SourceError::RateLimited { retry_after_ms })) => {
                return Err(GameError::retryable(
                    ErrorCode::SpotifyRateLimited,
                    "upstream rate limited",
                    retry_after_ms,
                ));
            }
            Ok(Err(SourceError::Unavailable(message))) => {
                warn!("track source failed for '{}': {}", query, message);
                return Err(GameError::new(ErrorCode::NoTracksFound, message));
            }
            Err(_) => {
                return Err(GameError::new(
                    ErrorCode::TrackPoolLoadTimeout,
                    format!("source did not answer within {}ms", config.pool_fetch_timeout_ms),
                ));
            }
        };

        let returned = tracks.len();
        let mut fresh: Vec<Track> = tracks
            .into_iter()
            .filter(|t| t.is_playable() && !t.is_promotional())
            .collect();
        fresh.shuffle(&mut rand::thread_rng());

        let mut added = 0usize;
        for track in fresh {
            if collected.len() >= target {
                break;
            }
            if seen.insert(track.signature()) {
                collected.push(track);
                added += 1;
            }
        }

        debug!(
            "pool attempt {}: requested {}, got {}, kept {} ({} total)",
            attempt + 1,
            request_size,
            returned,
            added,
            collected.len()
        );

        if collected.len() >= target {
            break;
        }
        // Source exhausted, or maxed-out requests stopped yielding anything
        // new: more attempts cannot help.
        if returned < request_size {
            break;
        }
        if added == 0 && request_size >= config.pool_max {
            break;
        }
        request_size = (request_size * 2).min(config.pool_max);
    }

    Ok(collected)
}

/// Builds the answer/distractor pools for a public-playlist game. Retries a
/// thin harvest a few times before giving up; a Deezer playlist that keeps
/// coming up short is reported as still resolving rather than empty.
pub async fn build_public_pool(
    source: &dyn TrackPoolSource,
    query: &str,
    requested_rounds: usize,
    config: &GameConfig,
) -> GameResult<BuiltPool> {
    let target = target_pool_size(requested_rounds, config);

    let mut last_len = 0usize;
    for retry in 0..=config.pool_retry_count {
        if retry > 0 {
            tokio::time::sleep(Duration::from_millis(config.pool_retry_delay_ms)).await;
        }
        let collected = collect_candidates(source, query, target, config).await?;
        last_len = collected.len();
        if collected.len() >= requested_rounds {
            return Ok(split_pool(collected, requested_rounds));
        }
        debug!(
            "pool retry {}: only {} playable tracks for {} rounds",
            retry, last_len, requested_rounds
        );
    }

    if query.starts_with("deezer:playlist:") {
        // Deezer fills large playlists asynchronously; a short read usually
        // means the upstream is still resolving entries.
        return Err(GameError::retryable(
            ErrorCode::PlaylistTracksResolving,
            format!(
                "playlist still resolving: {} of {} tracks available",
                last_len, requested_rounds
            ),
            1500,
        ));
    }

    Err(GameError::new(
        ErrorCode::NoTracksFound,
        format!(
            "found {} playable tracks, need {}",
            last_len, requested_rounds
        ),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::game::track::TrackProvider;

    fn test_config() -> GameConfig {
        GameConfig {
            pool_retry_delay_ms: 1,
            ..GameConfig::default()
        }
    }

    fn yt_track(id: usize) -> Track {
        Track {
            provider: TrackProvider::Youtube,
            id: format!("v{}", id),
            title: format!("Track {}", id),
            artist: format!("Artist {}", id % 7),
            preview_url: None,
            source_url: None,
            duration_sec: Some(200),
        }
    }

    struct FixedSource {
        tracks: Vec<Track>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(tracks: Vec<Track>) -> Self {
            Self {
                tracks,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TrackPoolSource for FixedSource {
        async fn fetch(&self, _query: &str, size: usize) -> Result<Vec<Track>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tracks.iter().take(size).cloned().collect())
        }
    }

    struct RateLimitedSource;

    #[async_trait]
    impl TrackPoolSource for RateLimitedSource {
        async fn fetch(&self, _query: &str, _size: usize) -> Result<Vec<Track>, SourceError> {
            Err(SourceError::RateLimited {
                retry_after_ms: 30_000,
            })
        }
    }

    #[test]
    fn test_target_size_formula() {
        let config = GameConfig::default();
        // 10 rounds -> 50 wanted, within [24, 100]
        assert_eq!(target_pool_size(10, &config), 50);
        // tiny games still gather the minimum
        assert_eq!(target_pool_size(2, &config), 24);
        // huge requests clamp to the max
        assert_eq!(target_pool_size(40, &config), 100);
    }

    #[tokio::test]
    async fn test_build_splits_answers_and_distractors() {
        let source = FixedSource::new((0..40).map(yt_track).collect());
        let pool = build_public_pool(&source, "test query", 10, &test_config())
            .await
            .unwrap();
        assert_eq!(pool.answers.len(), 10);
        assert_eq!(pool.answers.len() + pool.distractors.len(), pool.merged_count);
        assert!(pool.merged_count >= 24);

        // No signature appears twice across the split.
        let mut sigs: Vec<String> = pool
            .answers
            .iter()
            .chain(pool.distractors.iter())
            .map(|t| t.signature())
            .collect();
        let before = sigs.len();
        sigs.sort();
        sigs.dedup();
        assert_eq!(before, sigs.len());
    }

    #[tokio::test]
    async fn test_unplayable_and_promo_tracks_filtered() {
        let mut tracks: Vec<Track> = (0..30).map(yt_track).collect();
        for t in tracks.iter_mut().take(10) {
            t.provider = TrackProvider::Spotify; // unplayable without a yt url
        }
        tracks[10].title = "Deezer Session".to_string();
        let source = FixedSource::new(tracks);
        let pool = build_public_pool(&source, "q", 5, &test_config())
            .await
            .unwrap();
        assert_eq!(pool.merged_count, 19);
        assert!(
            pool.answers
                .iter()
                .chain(pool.distractors.iter())
                .all(|t| t.is_playable() && !t.is_promotional())
        );
    }

    #[tokio::test]
    async fn test_short_deezer_playlist_reports_resolving() {
        let source = FixedSource::new((0..3).map(yt_track).collect());
        let err = build_public_pool(&source, "deezer:playlist:42", 10, &test_config())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PlaylistTracksResolving);
        assert_eq!(err.retry_after_ms, Some(1500));
    }

    #[tokio::test]
    async fn test_short_generic_source_reports_no_tracks() {
        let source = FixedSource::new((0..3).map(yt_track).collect());
        let err = build_public_pool(&source, "some search", 10, &test_config())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoTracksFound);
    }

    #[tokio::test]
    async fn test_rate_limit_passes_through() {
        let err = build_public_pool(&RateLimitedSource, "spotify:popular", 10, &test_config())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SpotifyRateLimited);
        assert_eq!(err.retry_after_ms, Some(30_000));
    }

    #[tokio::test]
    async fn test_exhausted_source_stops_early() {
        // 30 tracks, 10 rounds: first fetch returns fewer than requested
        // (target 50), so one call must be enough.
        let source = FixedSource::new((0..30).map(yt_track).collect());
        let pool = build_public_pool(&source, "q", 10, &test_config())
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.answers.len(), 10);
    }
}
