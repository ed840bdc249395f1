use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    configs::Config,
    game::track::Track,
    pool::{SourceError, TrackPoolSource},
};

pub mod deezer;

pub use deezer::DeezerSource;

/// Routes source queries to the adapter that can serve them. The session
/// engine only ever sees the [`TrackPoolSource`] trait.
pub struct SourceManager {
    sources: Vec<Arc<dyn QuerySource>>,
}

/// A registered adapter: claims query shapes via `can_handle`.
#[async_trait]
pub trait QuerySource: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, query: &str) -> bool;
    async fn fetch(&self, query: &str, size: usize) -> Result<Vec<Track>, SourceError>;
}

impl SourceManager {
    pub fn new(config: &Config) -> Self {
        let mut sources: Vec<Arc<dyn QuerySource>> = Vec::new();
        if config.sources.deezer {
            if let Ok(deezer) = DeezerSource::new(&config.sources.deezer_api_base) {
                sources.push(Arc::new(deezer));
            }
        }
        Self { sources }
    }
}

#[async_trait]
impl TrackPoolSource for SourceManager {
    async fn fetch(&self, query: &str, size: usize) -> Result<Vec<Track>, SourceError> {
        for source in &self.sources {
            if source.can_handle(query) {
                debug!("loading '{}' with source: {}", query, source.name());
                return source.fetch(query, size).await;
            }
        }
        Err(SourceError::Unavailable(format!(
            "no source can handle query: {}",
            query
        )))
    }
}
