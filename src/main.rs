//! Webhook delivery daemon.
//!
//! Connects the durable Redis queue to the configured HTTP sink: starts
//! the delivery worker, logs queue depths at startup, and shuts down
//! gracefully on SIGINT/SIGTERM.

mod config;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wahook_core::RealClock;
use wahook_delivery::{DeliveryWorker, QueueAdmin, QueueKeys, RedisQueueStore, SinkClient};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("starting webhook delivery daemon");

    let config = Config::load()?;
    let sink_url = config.resolved_sink_url();
    info!(
        sink_url = %sink_url,
        redis_url = %config.redis_url,
        max_retries = config.max_retries,
        poll_interval_ms = config.poll_interval_ms,
        "configuration loaded"
    );

    let store = Arc::new(
        RedisQueueStore::connect(&config.redis_url)
            .await
            .context("failed to connect to Redis queue store")?,
    );
    info!("queue store connected");

    let keys = QueueKeys::default();
    let admin = QueueAdmin::new(store.clone(), keys.clone());
    match (admin.queue_depth().await, admin.dead_letter_depth().await) {
        (Ok(queued), Ok(dead)) => {
            info!(queue_depth = queued, dead_letter_depth = dead, "queue state at startup");
        },
        (queued, dead) => {
            warn!(?queued, ?dead, "could not read queue depths at startup");
        },
    }

    let client = SinkClient::new(config.to_sink_config()).context("failed to build sink client")?;

    let cancellation_token = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store,
        keys,
        client,
        config.to_worker_config(),
        Arc::new(RealClock::new()),
        cancellation_token.clone(),
    );
    let worker_handle = tokio::spawn(async move { worker.run().await });

    info!("webhook delivery daemon is ready");

    shutdown_signal().await;
    info!("shutdown signal received, stopping worker");
    cancellation_token.cancel();

    match tokio::time::timeout(Duration::from_secs(30), worker_handle).await {
        Ok(Ok(())) => info!("worker stopped cleanly"),
        Ok(Err(join_error)) => error!(error = %join_error, "worker task panicked"),
        Err(_) => error!("worker did not stop within the shutdown grace period"),
    }

    info!("webhook delivery daemon shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,wahook=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received CTRL+C signal");
        },
        _ = terminate => {
            info!("received SIGTERM signal");
        },
    }
}
