use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// Monotonic counters for external source traffic. The only cross-room
/// shared state besides the store index; counters only ever increment.
pub struct ProviderMetrics {
    registry: Registry,
    fetch_total: IntCounterVec,
    liked_build_total: IntCounterVec,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let fetch_total = IntCounterVec::new(
            Opts::new("track_fetch_total", "Track pool fetches by provider and outcome"),
            &["provider", "outcome"],
        )
        .expect("static metric definition");
        let liked_build_total = IntCounterVec::new(
            Opts::new(
                "players_liked_build_total",
                "Players-liked pool builds by outcome",
            ),
            &["outcome"],
        )
        .expect("static metric definition");

        for metric in [&fetch_total, &liked_build_total] {
            if let Err(e) = registry.register(Box::new(metric.clone())) {
                warn!("failed to register metric: {}", e);
            }
        }

        Self {
            registry,
            fetch_total,
            liked_build_total,
        }
    }

    pub fn observe_fetch(&self, provider: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.fetch_total.with_label_values(&[provider, outcome]).inc();
    }

    pub fn observe_liked_build(&self, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.liked_build_total.with_label_values(&[outcome]).inc();
    }

    /// Prometheus text exposition for the `/metrics` endpoint.
    pub fn export(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for ProviderMetrics {
    fn default() -> Self {
        Self::new()
    }
}
