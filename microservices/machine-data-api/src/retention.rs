//! Retention Sweeper

use std::sync::Arc;
use std::time::Duration;

use ingest_core::Result;
use ingest_store::RecordStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn RecordStore>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Irreversibly delete records received more than `retention_days` ago
    pub async fn sweep(&self, retention_days: u32) -> Result<u64> {
        let deleted = self.store.delete_older_than(retention_days).await?;
        info!(retention_days, deleted, "Retention sweep finished");
        Ok(deleted)
    }

    /// Sweep on a fixed interval in the background; the first sweep runs immediately
    pub fn spawn_periodic(&self, retention_days: u32, every: Duration) -> JoinHandle<()> {
        let sweeper = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = sweeper.sweep(retention_days).await {
                    error!(error = %e, "Scheduled retention sweep failed");
                }
            }
        })
    }
}
