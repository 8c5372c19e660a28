//! Focus statistics: the persisted ledger, its single writer, and the
//! dashboard summary.

mod ledger;
mod summary;

pub use ledger::{date_key, local_date, parse_date_key, StatsLedger, RETENTION_DAYS};
pub use summary::StatsSummary;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::session::accountant::SESSION_CEILING_MINUTES;
use crate::storage::ConfigStore;

/// Serializes every read-modify-write of the persisted ledger.
///
/// `tokio::sync::Mutex` hands the lock out in arrival order, so queued
/// commits run FIFO and none of them is lost to an interleaved write.
pub struct LedgerWriter {
    store: Arc<ConfigStore>,
    lock: Mutex<()>,
    ceiling_minutes: u64,
    retention_days: u32,
}

impl LedgerWriter {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            ceiling_minutes: SESSION_CEILING_MINUTES,
            retention_days: RETENTION_DAYS,
        }
    }

    pub fn with_limits(mut self, ceiling_minutes: u64, retention_days: u32) -> Self {
        self.ceiling_minutes = ceiling_minutes;
        self.retention_days = retention_days;
        self
    }

    /// Commit `minutes` of focus that ended at `end_ms`. Returns the minutes
    /// actually recorded.
    pub async fn commit(&self, minutes: u64, end_ms: i64, now_ms: i64) -> Result<u64> {
        if minutes == 0 {
            return Ok(0);
        }
        let ceiling = self.ceiling_minutes;
        let recorded = self
            .update(now_ms, |ledger| ledger.record(minutes, end_ms, ceiling))
            .await?;
        debug!(minutes = recorded, end_ms, "focus minutes committed");
        Ok(recorded)
    }

    /// Run `f` against the stored ledger under the writer lock, prune, and
    /// save.
    pub async fn update<R>(
        &self,
        now_ms: i64,
        f: impl FnOnce(&mut StatsLedger) -> R,
    ) -> Result<R> {
        let _guard = self.lock.lock().await;
        let mut ledger = self.store.load_stats()?;
        let out = f(&mut ledger);
        if let Some(today) = local_date(now_ms) {
            ledger.prune(today, self.retention_days);
        }
        self.store.save_stats(&ledger)?;
        Ok(out)
    }

    pub fn load(&self) -> Result<StatsLedger> {
        Ok(self.store.load_stats()?)
    }
}
