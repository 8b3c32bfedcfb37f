mod error;
mod hub;
mod quarantine;
mod schema;
mod store;

pub use error::AuditError;
pub use hub::Hub;
pub use quarantine::{QuarantineQueue, QuarantineStats};
pub use store::{AgentRisk, AuditStats, AuditStore, HourlyBucket, QueryOpts, TopRule};

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawns the hourly retention sweeper. The caller owns the
/// `CancellationToken` and controls shutdown; nothing auto-spawns from a
/// constructor.
pub fn spawn_retention_sweeper(
    store: std::sync::Arc<AuditStore>,
    retention_days: u32,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if retention_days == 0 {
            debug!("retention disabled (retention_days = 0); sweeper exiting immediately");
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("retention sweeper cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    match store.purge_older_than(retention_days) {
                        Ok(deleted) if deleted > 0 => info!(deleted, "retention sweep purged old audit rows"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "retention sweep failed"),
                    }
                }
            }
        }
    })
}

/// Spawns the per-minute quarantine expiry sweeper.
pub fn spawn_expiry_sweeper(
    queue: std::sync::Arc<QuarantineQueue>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("quarantine expiry sweeper cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    match queue.expire() {
                        Ok(expired) if expired > 0 => info!(expired, "quarantine expiry sweep reaped items"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "quarantine expiry sweep failed"),
                    }
                }
            }
        }
    })
}
