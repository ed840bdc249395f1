use std::{net::SocketAddr, sync::Arc, time::Duration};

use blindlink::{
    common::types::AnyResult,
    game::clock::SystemClock,
    monitoring::ProviderMetrics,
    pool::{NoopRomanizer, NullLibrarySource},
    server::AppState,
    sources::SourceManager,
    store::RoomStore,
    transport,
};
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = blindlink::configs::Config::load()?;

    blindlink::common::logger::init(&config);
    blindlink::common::banner::print_banner(&blindlink::common::banner::BannerInfo::default());

    info!("Blindlink server starting...");

    let metrics = Arc::new(ProviderMetrics::new());
    let track_source = Arc::new(SourceManager::new(&config));

    let store = Arc::new(RoomStore::new(
        config.game.clone(),
        track_source,
        Arc::new(NullLibrarySource),
        Arc::new(NoopRomanizer),
        Arc::new(SystemClock),
        metrics.clone(),
    ));

    // Reap finished and abandoned rooms in the background.
    let sweeper_store = store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sweeper_store.sweep_expired().await;
        }
    });

    let shared_state = Arc::new(AppState {
        start_time: std::time::Instant::now(),
        store,
        metrics,
        config: config.clone(),
    });

    let app = transport::http_server::router()
        .with_state(shared_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let ip: std::net::IpAddr = config.server.host.parse()?;
    let address = SocketAddr::from((ip, config.server.port));
    info!("Blindlink server listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
