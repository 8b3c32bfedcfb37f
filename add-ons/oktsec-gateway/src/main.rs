mod http;
mod state;
mod stdio;

use anyhow::Context;
use oktsec_audit::{spawn_expiry_sweeper, spawn_retention_sweeper, AuditStore, Hub, QuarantineQueue};
use oktsec_config::{ConfigStore, ConfigView};
use oktsec_identity::KeyStore;
use oktsec_ratelimit::RateLimiter;
use oktsec_scan::RegexScanEngine;
use oktsec_anomaly::AnomalyLoop;
use oktsec_policy::PolicyPipeline;
use oktsec_webhook::{WebhookEndpoint, WebhookNotifier};
use state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Entry point: config load -> component construction -> sweepers/anomaly
/// loop spawn -> HTTP server bind/serve -> graceful shutdown.
///
/// Logging is a global `tracing_subscriber::registry()` with an `EnvFilter`
/// read from `RUST_LOG`. Shutdown is a `tokio::select!` against
/// `tokio::signal::ctrl_c()` around `axum::serve`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "oktsec.yaml".to_string());
    let config_store = Arc::new(
        ConfigStore::load(&config_path)
            .with_context(|| format!("loading config from {config_path}"))?,
    );
    let config: Arc<dyn ConfigView> = config_store.clone();
    let snapshot = config_store.snapshot();

    let keys_dir = snapshot
        .identity
        .keys_dir
        .clone()
        .unwrap_or_else(|| "keys".to_string());
    std::fs::create_dir_all(&keys_dir).context("creating keys_dir")?;
    let keystore = Arc::new(KeyStore::load(&keys_dir).context("loading keystore")?);

    let rate_limiter = Arc::new(RateLimiter::new(
        snapshot.rate_limit.per_agent,
        snapshot.rate_limit.window,
    ));

    let scan_engine: Arc<dyn oktsec_scan::ScanEngine> = match &snapshot.custom_rules_dir {
        Some(dir) => Arc::new(
            RegexScanEngine::with_custom_rules_dir(std::path::Path::new(dir))
                .context("loading custom scan rules")?,
        ),
        None => Arc::new(RegexScanEngine::new().context("loading built-in scan rules")?),
    };

    let db_path = std::env::var("OKTSEC_DB_PATH").unwrap_or_else(|_| "oktsec.db".to_string());
    let audit = Arc::new(AuditStore::open(&db_path).context("opening audit store")?);
    let quarantine = Arc::new(QuarantineQueue::new(&db_path));
    let hub = Arc::new(Hub::new());

    let endpoints = snapshot
        .webhooks
        .iter()
        .map(|w| WebhookEndpoint {
            url: w.url.clone(),
            events: w.events.clone(),
        })
        .collect();
    let webhook = Arc::new(WebhookNotifier::new(endpoints));

    let pipeline = Arc::new(PolicyPipeline::new(
        Arc::clone(&config),
        Arc::clone(&keystore),
        Arc::clone(&rate_limiter),
        Arc::clone(&scan_engine),
        Arc::clone(&audit),
        Arc::clone(&quarantine),
        Arc::clone(&hub),
        Arc::clone(&webhook),
    ));

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();
    tasks.push(spawn_retention_sweeper(
        Arc::clone(&audit),
        snapshot.quarantine.retention_days,
        cancel.clone(),
    ));
    tasks.push(spawn_expiry_sweeper(Arc::clone(&quarantine), cancel.clone()));

    if snapshot.anomaly.check_interval > 0 {
        let anomaly_loop = AnomalyLoop::new(
            Arc::clone(&audit),
            config_store.clone(),
            Arc::clone(&webhook),
            snapshot.anomaly.check_interval,
            snapshot.anomaly.risk_threshold,
            snapshot.anomaly.min_messages,
            snapshot.anomaly.auto_suspend,
        );
        let anomaly_cancel = cancel.clone();
        tasks.push(tokio::spawn(anomaly_loop.run(anomaly_cancel)));
    }

    if snapshot.gateway.enabled {
        let app_state = AppState {
            pipeline: Arc::clone(&pipeline),
            hub: Arc::clone(&hub),
        };
        let router = http::router(app_state, &snapshot.gateway.endpoint_path);
        let addr = format!("{}:{}", snapshot.gateway.bind, snapshot.gateway.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding gateway to {addr}"))?;
        tracing::info!(%addr, "oktsec-gateway listening");

        tokio::select! {
            result = axum::serve(listener, router) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "gateway server error");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
            }
        }
    } else if let Some((name, server)) = snapshot
        .mcp_servers
        .iter()
        .find(|(_, s)| matches!(s.transport, oktsec_config::McpTransport::Stdio))
    {
        let command = server
            .command
            .clone()
            .with_context(|| format!("mcp_servers.{name} has stdio transport but no command"))?;
        tracing::info!(%name, %command, "starting stdio wrapper");
        let wrapper = stdio::StdioWrapper::new(Arc::clone(&pipeline), "client".to_string(), name.clone());
        wrapper.run(&command, &server.args, &server.env).await?;
    } else {
        tracing::info!("no gateway or stdio mcp server configured; running sweepers and anomaly loop only");
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    }

    cancel.cancel();
    let grace = tokio::time::Duration::from_secs(10);
    let _ = tokio::time::timeout(grace, async {
        for task in tasks {
            let _ = task.await;
        }
    })
    .await;
    if let Err(e) = audit.flush().await {
        tracing::warn!(error = %e, "audit flush failed during shutdown");
    }

    Ok(())
}
