use std::sync::Arc;

use crate::{configs::Config, monitoring::ProviderMetrics, store::RoomStore};

/// Shared state handed to every transport handler.
pub struct AppState {
    pub start_time: std::time::Instant,
    pub store: Arc<RoomStore>,
    pub metrics: Arc<ProviderMetrics>,
    pub config: Config,
}
