use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    common::errors::ErrorCode,
    game::track::{Track, TrackProvider},
};

pub mod builder;
pub mod liked;

pub use builder::*;
pub use liked::*;

/// Failure surfaced by an external track source. Pool builders catch these
/// and translate them into the public error codes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("upstream rate limited")]
    RateLimited { retry_after_ms: u64 },
    #[error("{0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimited { .. } => ErrorCode::SpotifyRateLimited,
            Self::Unavailable(_) => ErrorCode::NoTracksFound,
        }
    }
}

/// Resolves a source query (`deezer:playlist:<id>`, `spotify:popular`,
/// free-form search text, ...) into candidate tracks.
#[async_trait]
pub trait TrackPoolSource: Send + Sync {
    async fn fetch(&self, source_query: &str, size: usize) -> Result<Vec<Track>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct LikedTracksRequest {
    pub user_id: String,
    pub providers: Vec<TrackProvider>,
    pub size: usize,
    /// Whether the source may reach out to providers to resolve missing
    /// entries instead of serving only what is already synced.
    pub allow_external_resolve: bool,
}

/// One row of the bulk answer-suggestion query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRow {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_romaji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_romaji: Option<String>,
}

/// Access to players' personal libraries, kept in sync by external workers.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    async fn fetch_user_liked_tracks(
        &self,
        request: LikedTracksRequest,
    ) -> Result<Vec<Track>, SourceError>;

    /// Bulk title/artist strings for the answer-suggestion list, in an order
    /// randomised by `seed`. Sources without a suggestion table serve none.
    async fn fetch_answer_suggestions(
        &self,
        _seed: &str,
        _row_limit: usize,
    ) -> Result<Vec<SuggestionRow>, SourceError> {
        Ok(Vec::new())
    }
}

/// Romanization cache. `cached` must answer synchronously; `schedule` only
/// hints the cache to warm itself and never blocks.
pub trait Romanizer: Send + Sync {
    fn cached(&self, s: &str) -> Option<String>;
    fn schedule(&self, s: &str);
}

/// Library source for deployments without a persistent library backend.
pub struct NullLibrarySource;

#[async_trait]
impl LibrarySource for NullLibrarySource {
    async fn fetch_user_liked_tracks(
        &self,
        _request: LikedTracksRequest,
    ) -> Result<Vec<Track>, SourceError> {
        Ok(Vec::new())
    }
}

/// Romanizer with no backing cache.
pub struct NoopRomanizer;

impl Romanizer for NoopRomanizer {
    fn cached(&self, _s: &str) -> Option<String> {
        None
    }

    fn schedule(&self, _s: &str) {}
}
