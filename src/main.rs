use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use links::app_state::AppState;
use links::cache::{LinkCache, MemoryCache, RedisCache};
use links::config::{self, Config};
use links::fetcher::HttpFetcher;
use links::metrics::ServiceMetrics;
use links::{http, metrics};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load(Path::new(&config_path)).expect("Failed to load configuration");

    let providers = config::load_provider_names(Path::new(&config.provider_names_file))
        .expect("Failed to load provider names");
    info!(count = providers.len(), "loaded provider names");

    let cache: Arc<dyn LinkCache> = if config.cache_host.is_empty() {
        info!("no cache host configured, using the in-process cache");
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(
            RedisCache::connect(&config.cache_host, config.cache_db)
                .await
                .expect("Failed to connect to cache backend"),
        )
    };

    let fetcher =
        HttpFetcher::new(config.http_get_timeout()).expect("Failed to build HTTP client");
    let service_metrics = ServiceMetrics::new();

    let listen_addr = format!("0.0.0.0:{}", config.listen_port);
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let state = AppState::new(config, cache, fetcher, providers, service_metrics.clone());

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&metrics_addr)
            .await
            .expect("Failed to bind metrics port");
        info!("metrics listening on {metrics_addr}");
        if let Err(err) = axum::serve(listener, metrics::router(service_metrics)).await {
            error!(%err, "metrics server error");
        }
    });

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .expect("Failed to bind listen port");
    info!("listening on {listen_addr}");
    axum::serve(listener, http::router(state))
        .await
        .expect("HTTP server error");
}
