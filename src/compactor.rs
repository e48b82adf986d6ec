use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::store::WalStore;

/// Background task that rewrites the WAL once `threshold` events have been
/// appended since the last compaction.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// Returns true if a compaction ran.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => {
            info!("compacted {} after {appends} appends", store.path().display());
            metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            true
        }
        Err(e) => {
            error!("compaction of {} failed: {e}", store.path().display());
            false
        }
    }
}
