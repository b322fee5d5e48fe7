use std::sync::Arc;

use killboard_relay::config::RelayConfig;
use killboard_relay::delivery::{
    DeliveryHandle, DeliveryWorker, JsonlStatsRecorder, LogSink, NoArtifactRenderer, NoopStats,
    Sink, StatsRecorder, WebhookSink,
};
use killboard_relay::error::RelayError;
use killboard_relay::feed::GameInfoClient;
use killboard_relay::scanner::FeedScanner;
use killboard_relay::server::build_router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "killboard_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(RelayConfig::from_env()).await {
        error!(error = %e, "Relay stopped");
        std::process::exit(1);
    }
}

async fn run(config: RelayConfig) -> Result<(), RelayError> {
    if config.watch.is_empty() {
        warn!("No guild, alliance or players configured; nothing will be relayed");
    }
    info!(
        guild = config.watch.guild_name().unwrap_or(""),
        alliance = config.watch.alliance_name().unwrap_or(""),
        players = config.watch.player_names().len(),
        feed_url = %config.feed_url,
        "Starting relay"
    );

    let shutdown = CancellationToken::new();
    let feed = GameInfoClient::new(&config.feed_url, config.http_timeout)?;

    let (delivery, worker_task) = match &config.webhook_url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .timeout(config.delivery.post_timeout)
                .build()?;
            spawn_delivery(&config, WebhookSink::new(client, url), shutdown.clone())
        }
        None => {
            info!("No webhook configured, running as a dry run");
            spawn_delivery(&config, LogSink, shutdown.clone())
        }
    };

    let scanner = Arc::new(FeedScanner::new(
        config.scan.clone(),
        feed,
        config.watch.clone(),
        delivery,
    ));
    let scanner_task = scanner.spawn(shutdown.clone());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);

    let server_token = shutdown.clone();
    let served = axum::serve(listener, build_router())
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await;
    // A server error still has to stop the background tasks.
    shutdown.cancel();

    for (name, task) in [("scanner", scanner_task), ("delivery worker", worker_task)] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "Task panicked");
        }
    }
    served?;

    info!("Relay stopped cleanly");
    Ok(())
}

fn spawn_delivery<S>(
    config: &RelayConfig,
    sink: S,
    shutdown: CancellationToken,
) -> (DeliveryHandle, JoinHandle<()>)
where
    S: Sink + Send + Sync + 'static,
{
    match &config.stats_path {
        Some(path) => {
            info!(path = %path.display(), "Recording stats");
            start_worker(config, sink, JsonlStatsRecorder::new(path), shutdown)
        }
        None => start_worker(config, sink, NoopStats, shutdown),
    }
}

fn start_worker<S, T>(
    config: &RelayConfig,
    sink: S,
    stats: T,
    shutdown: CancellationToken,
) -> (DeliveryHandle, JoinHandle<()>)
where
    S: Sink + Send + Sync + 'static,
    T: StatsRecorder + Send + Sync + 'static,
{
    DeliveryWorker::new(config.delivery.clone(), NoArtifactRenderer, sink, stats)
        .with_watch_config(config.watch.clone())
        .spawn(shutdown)
}
