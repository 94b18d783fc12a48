//! Scheduled cleanup of expired cache entries and idle throttle keys.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::gateway::Gateway;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Run all cleanup tasks once.
pub fn run_cleanup(gateway: &Gateway) {
    gateway.cache().purge_expired();
    debug!(entries = gateway.cache().len(), "Purged expired cache entries");

    let before = gateway.throttle().len();
    gateway.throttle().retain_recent();
    let after = gateway.throttle().len();
    if before > after {
        debug!("Dropped {} idle throttle entries", before - after);
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(gateway: Arc<Gateway>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&gateway);
        }
    })
}
