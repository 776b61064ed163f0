//! Background hard-expiry worker.
//!
//! The worker ticks at the configured interval and deletes every key whose
//! hard TTL has passed, cascading to dependents. It holds only a weak
//! reference to the manager.
//!
//! # Example
//!
//! ```ignore
//! let worker = manager.spawn_expiry_worker();
//! // ...
//! worker.shutdown().await;
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::manager::WeakCacheManager;

/// Handle to a running expiry worker.
///
/// Dropping the handle stops the worker at its next wake-up.
#[derive(Debug)]
pub struct ExpiryWorker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpiryWorker {
    pub(crate) fn new(shutdown_tx: watch::Sender<bool>, handle: JoinHandle<()>) -> Self {
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the worker to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Expiry worker ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub(crate) async fn run_expiry_loop(
    manager: WeakCacheManager,
    tick: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(tick_ms = tick.as_millis() as u64, "Expiry worker started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Expiry worker shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                let Some(manager) = manager.upgrade() else {
                    info!("Cache manager dropped; expiry worker stopping");
                    break;
                };
                if let Err(e) = manager.expire_due().await {
                    warn!(error = %e, "Hard expiry pass failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use layercache_core::CacheConfig;

    use crate::cache::CacheManager;
    use crate::tier::{MemoryTier, TierRef};

    fn manager() -> CacheManager {
        let tiers: Vec<TierRef> = vec![Arc::new(MemoryTier::new("memory", 10))];
        CacheManager::new(
            tiers,
            CacheConfig::default().with_expiry_tick(std::time::Duration::from_millis(10)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let manager = manager();
        let worker = manager.spawn_expiry_worker();
        assert!(!worker.is_finished());
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_stops_when_manager_dropped() {
        let manager = manager();
        let worker = manager.spawn_expiry_worker();
        drop(manager);

        for _ in 0..50 {
            if worker.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(worker.is_finished());
    }
}
