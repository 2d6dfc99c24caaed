use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use marketsync::auth::{CredentialStore, MemoryCredentialStore};
use marketsync::backend::{HttpBackend, TradingBackend};
use marketsync::config::{SocketArgs, SyncArgs};
use marketsync::db::{initialize_pool, SqliteCredentialStore};
use marketsync::market::cache::PriceCache;
use marketsync::market::feed::PriceFeed;
use marketsync::market::poller::PricePoller;
use marketsync::sim::SimulationService;
use marketsync::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend_url =
        env::var("MARKETSYNC_BACKEND_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let socket_url = env::var("MARKETSYNC_SOCKET_URL")
        .unwrap_or_else(|_| "ws://127.0.0.1:8000/ws/prices".to_string());
    let symbols: Vec<String> = env::var("MARKETSYNC_SYMBOLS")
        .unwrap_or_else(|_| "BTC,ETH".to_string())
        .split(',')
        .map(|symbol| symbol.trim().to_ascii_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .collect();

    let sync_config = SyncArgs {
        debounce_window_ms: env_parse("MARKETSYNC_DEBOUNCE_MS"),
        periodic_refresh_ms: env_parse("MARKETSYNC_PERIODIC_MS"),
        refresh_floor_ms: env_parse("MARKETSYNC_REFRESH_FLOOR_MS"),
        settle_delay_ms: env_parse("MARKETSYNC_SETTLE_DELAY_MS"),
        signal_refetch_ms: env_parse("MARKETSYNC_SIGNAL_REFETCH_MS"),
        poll_interval_ms: env_parse("MARKETSYNC_POLL_INTERVAL_MS"),
        trade_log_limit: env_parse("MARKETSYNC_TRADE_LOG_LIMIT"),
        backfill_years: env_parse("MARKETSYNC_BACKFILL_YEARS"),
    }
    .normalize()?;

    let socket_config = SocketArgs {
        url: socket_url,
        reconnect_delay_ms: env_parse("MARKETSYNC_RECONNECT_DELAY_MS"),
        auto_reconnect: None,
    }
    .normalize()?;

    // Tokens outlive restarts only when a database path is configured.
    let credentials: Arc<dyn CredentialStore> = match env::var("MARKETSYNC_DB_PATH") {
        Ok(path) => {
            let pool = initialize_pool(&PathBuf::from(path)).await?;
            Arc::new(SqliteCredentialStore::new(pool))
        }
        Err(_) => {
            warn!("MARKETSYNC_DB_PATH not set, session token will not persist");
            Arc::new(MemoryCredentialStore::new())
        }
    };
    if let Ok(token) = env::var("MARKETSYNC_TOKEN") {
        credentials.store(&token).await?;
    }

    let backend: Arc<dyn TradingBackend> =
        Arc::new(HttpBackend::new(backend_url, Arc::clone(&credentials)));
    let cache = Arc::new(PriceCache::new());

    // Log every cache change; downstream consumers subscribe the same way.
    let log_subscription = cache.on_change(None, |entry| {
        info!(
            symbol = %entry.symbol,
            price = entry.price,
            change_percent = entry.price_change_percent,
            "price update"
        );
    });

    let feed = PriceFeed::new(
        Arc::clone(&cache),
        socket_config,
        Arc::clone(&credentials),
    );
    feed.connect();

    let poller = PricePoller::spawn(
        Arc::clone(&backend),
        Arc::clone(&cache),
        symbols,
        Duration::from_millis(sync_config.poll_interval_ms),
    );

    let service = SimulationService::new(backend, Arc::clone(&cache), sync_config);
    match service.resume().await {
        Ok(Some(record)) => info!(id = %record.id, symbol = %record.symbol, "resumed simulation"),
        Ok(None) => info!("no active simulation to resume"),
        Err(err) => error!(error = %err, "resume failed"),
    }

    info!("marketsyncd running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    drop(log_subscription);
    service.stop().await;
    poller.shutdown().await;
    feed.disconnect().await;

    Ok(())
}
