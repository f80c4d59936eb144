//! Tickscope Stream Binary
//!
//! Runs the ingestion core headless: both feeds stream into the rolling
//! series and every series change is logged at debug level.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tickscope-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `POLYGON_API_KEY`: Polygon API key (legacy name `POLYGONIO_API_KEY`)
//!
//! ## Optional
//! - `TICKSCOPE_STOCK_SYMBOL`: Equity ticker (default: TSLA)
//! - `TICKSCOPE_OPTION_SYMBOL`: OCC option contract (default: TSLA240315C00220000)
//! - `TICKSCOPE_SUBSCRIBE_QUOTES`: Subscribe to quotes (default: true)
//! - `TICKSCOPE_SERIES_CAPACITY`: Points per series (default: 2500)
//! - `TICKSCOPE_EXCHANGES_PATH`: Exchange reference file (default: exchanges.json)
//! - `TICKSCOPE_METRICS_PORT`: Prometheus port, 0 disables (default: 9090)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `tickscope_stream=info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tickscope_stream::infrastructure::metrics;
use tickscope_stream::infrastructure::telemetry;
use tickscope_stream::{
    ChannelRegistry, ContextRunner, ExchangeDirectory, FeedClient, FeedConfig, FeedHandle,
    FeedSettings, SymbolClass, TickscopeConfig, channel_context,
};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between scheduler gauge updates.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Tickscope Stream");

    let config = TickscopeConfig::from_env()?;
    log_config(&config);

    if config.metrics_port != 0 {
        let addr = metrics::init_metrics(config.metrics_port)
            .context("failed to start Prometheus exporter")?;
        tracing::info!(addr = %addr, "Metrics listening");
    }

    let exchanges = match ExchangeDirectory::load(&config.exchanges_path) {
        Ok(directory) => directory,
        Err(e) => {
            tracing::warn!(error = %e, "Exchange directory unavailable, using numeric ids");
            ExchangeDirectory::default()
        }
    };
    tracing::info!(exchanges = exchanges.len(), "Exchange directory loaded");

    let shutdown_token = CancellationToken::new();
    let registry = Arc::new(
        ChannelRegistry::builder()
            .capacity(config.series_capacity)
            .feed_channels(SymbolClass::Equity)
            .feed_channels(SymbolClass::Option)
            .exchange_names(Arc::new(exchanges))
            .build()?,
    );

    // Headless consumer per channel
    for channel in registry.channel_names() {
        let (context, runner) = channel_context();
        registry.attach(channel, Arc::new(context));
        tokio::spawn(log_changes(runner, shutdown_token.clone()));
    }

    let (stock_handle, stock_task) =
        spawn_feed(&config, &config.stock, &registry, &shutdown_token)?;
    let (option_handle, option_task) =
        spawn_feed(&config, &config.option, &registry, &shutdown_token)?;

    tokio::spawn(publish_stats(Arc::clone(&registry), shutdown_token.clone()));

    tracing::info!(
        stock = %stock_handle.active_symbol(),
        option = %option_handle.active_symbol(),
        "Tickscope Stream ready"
    );

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = tokio::join!(stock_task, option_task);
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Feeds did not stop within the shutdown timeout");
    }

    tracing::info!("Tickscope Stream stopped");
    Ok(())
}

/// Create a feed for `settings` and run it on its own task.
fn spawn_feed(
    config: &TickscopeConfig,
    settings: &FeedSettings,
    registry: &Arc<ChannelRegistry>,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<(FeedHandle, JoinHandle<()>)> {
    let feed_config = FeedConfig::from_settings(
        settings,
        config.api_key.clone(),
        config.subscribe_quotes,
        &config.connection,
    );
    let feed = settings.symbol_class.as_str();
    let (client, handle) =
        FeedClient::new(feed_config, Arc::clone(registry), shutdown_token.clone())
            .with_context(|| format!("invalid {feed} feed configuration"))?;

    let task = tokio::spawn(async move {
        if let Err(e) = client.run().await {
            tracing::error!(feed, error = %e, "Feed terminated");
        }
    });
    Ok((handle, task))
}

/// Apply and log series changes for one channel until shutdown.
async fn log_changes(mut runner: ContextRunner, shutdown_token: CancellationToken) {
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => {
                runner.close();
                for change in runner.drain_ready() {
                    tracing::trace!(channel = %change.channel, len = change.len, "Drained on shutdown");
                }
                return;
            }
            change = runner.next_change() => {
                let Some(change) = change else { return };
                let (low, high) = change.padded_range;
                tracing::debug!(
                    channel = %change.channel,
                    len = change.len,
                    low,
                    high,
                    reset = change.was_reset,
                    "Series updated"
                );
            }
        }
    }
}

/// Publish scheduler counters and pending depths as gauges, and log the
/// busiest exchanges per feed.
async fn publish_stats(registry: Arc<ChannelRegistry>, shutdown_token: CancellationToken) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => return,
            _ = interval.tick() => {
                metrics::set_scheduler_stats(registry.stats());
                for channel in registry.channel_names() {
                    metrics::set_pending_depth(channel, registry.pending_len(channel).unwrap_or(0));
                }
                for class in [SymbolClass::Equity, SymbolClass::Option] {
                    if let Some(top) = registry.exchange_counts(class).first() {
                        tracing::debug!(
                            feed = class.as_str(),
                            exchange = %top.name,
                            trades = top.trades,
                            volume = top.volume,
                            "Busiest exchange"
                        );
                    }
                }
            }
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &TickscopeConfig) {
    tracing::info!(
        stock_symbol = %config.stock.symbol,
        option_symbol = %config.option.symbol,
        subscribe_quotes = config.subscribe_quotes,
        series_capacity = config.series_capacity,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        stock_url = %config.stock.url,
        option_url = %config.option.url,
        exchanges_path = %config.exchanges_path.display(),
        "WebSocket endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
