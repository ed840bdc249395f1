use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{
    common::http::HttpClient,
    game::track::{Track, TrackProvider},
    pool::SourceError,
    sources::QuerySource,
};

/// Public Deezer API adapter. Serves `deezer:playlist:<id>`,
/// `deezer:chart`, and free-form search queries. Tracks come back tagged
/// with the Deezer provider; a downstream resolver is expected to attach
/// playable source URLs before they reach a game.
pub struct DeezerSource {
    client: reqwest::Client,
    api_base: String,
}

impl DeezerSource {
    pub fn new(api_base: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::new()?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        let url = format!("{}/{}", self.api_base, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("deezer request failed: {}", e)))?;
        if response.status().as_u16() == 429 {
            return Err(SourceError::RateLimited {
                retry_after_ms: 5000,
            });
        }
        response
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("deezer returned junk: {}", e)))
    }

    fn parse_track(&self, json: &Value) -> Option<Track> {
        let id = json.get("id")?.to_string();
        let title = json.get("title")?.as_str()?.to_string();
        let artist = json.get("artist")?.get("name")?.as_str()?.to_string();
        let duration_sec = json
            .get("duration")
            .and_then(|v| v.as_u64())
            .map(|d| d as u32);
        let preview_url = json
            .get("preview")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let source_url = json
            .get("link")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Some(Track {
            provider: TrackProvider::Deezer,
            id,
            title,
            artist,
            preview_url,
            source_url,
            duration_sec,
        })
    }

    fn parse_track_list(&self, json: &Value) -> Vec<Track> {
        json.get("data")
            .and_then(|d| d.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| self.parse_track(item))
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn playlist_tracks(&self, id: &str, size: usize) -> Result<Vec<Track>, SourceError> {
        let json = self
            .get_json(&format!("playlist/{}/tracks?limit={}", id, size))
            .await?;
        Ok(self.parse_track_list(&json))
    }

    async fn chart_tracks(&self, size: usize) -> Result<Vec<Track>, SourceError> {
        let json = self.get_json(&format!("chart/0/tracks?limit={}", size)).await?;
        Ok(self.parse_track_list(&json))
    }

    async fn search_tracks(&self, query: &str, size: usize) -> Result<Vec<Track>, SourceError> {
        let json = self
            .get_json(&format!(
                "search/track?q={}&limit={}",
                urlencoding::encode(query),
                size
            ))
            .await?;
        Ok(self.parse_track_list(&json))
    }
}

#[async_trait]
impl QuerySource for DeezerSource {
    fn name(&self) -> &str {
        "deezer"
    }

    fn can_handle(&self, query: &str) -> bool {
        // Free-form text lands here too: Deezer search is the catch-all.
        !query.starts_with("spotify:") && !query.starts_with("players:")
    }

    async fn fetch(&self, query: &str, size: usize) -> Result<Vec<Track>, SourceError> {
        if let Some(id) = query.strip_prefix("deezer:playlist:") {
            debug!("deezer: loading playlist {}", id);
            return self.playlist_tracks(id, size).await;
        }
        if query == "deezer:chart" || query == "deezer:popular" {
            return self.chart_tracks(size).await;
        }
        let text = query.strip_prefix("anime:").unwrap_or(query);
        self.search_tracks(text, size).await
    }
}
