use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use super::Store;

const CHECK_EVERY: Duration = Duration::from_secs(30);

/// Compact the WAL whenever more than `threshold` appends have piled up since
/// the last compaction. Returns when `shutdown` flips to true.
pub async fn run_compactor(store: Arc<Store>, threshold: u64, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(CHECK_EVERY);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }
        let appends = store.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => error!("WAL compaction failed: {e}"),
        }
    }
}
