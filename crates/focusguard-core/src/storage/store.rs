//! Typed access to the two storage tiers.
//!
//! Shared keys are read synced-first with a per-key fallback to local, and
//! written to both tiers. A failed synced write degrades to a local-only
//! save; only a write rejected by both tiers is an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::keys;
use super::{Items, StorageArea, Tier};
use crate::blocking::{BlockingConfig, BlockingDuration};
use crate::error::StorageError;
use crate::host::TabId;
use crate::session::accountant::{sanitize_minutes, sanitize_timestamp};
use crate::session::SessionRecord;
use crate::sites::{BlockedSites, Pattern};
use crate::stats::StatsLedger;

/// Emitted after every successful write, per tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub tier: Tier,
    pub keys: Vec<String>,
}

/// Values from a priority-ordered read, plus where they primarily came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TieredRead {
    pub items: Items,
    /// `Local` when the synced tier could not be read at all.
    pub source: Tier,
}

impl TieredRead {
    /// Value for `key`, treating JSON `null` as absent.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.items.get(key).filter(|v| !v.is_null())
    }
}

pub struct ConfigStore {
    synced: Arc<dyn StorageArea>,
    local: Arc<dyn StorageArea>,
    changes: broadcast::Sender<StorageChange>,
}

impl ConfigStore {
    pub fn new(synced: Arc<dyn StorageArea>, local: Arc<dyn StorageArea>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            synced,
            local,
            changes,
        }
    }

    /// Subscribe to write notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    /// Read shared keys: synced first, local for whatever synced lacks.
    pub fn read(&self, keys: &[&str]) -> Result<TieredRead, StorageError> {
        match self.synced.get(keys) {
            Ok(mut items) => {
                let missing: Vec<&str> = keys
                    .iter()
                    .copied()
                    .filter(|k| items.get(*k).map_or(true, Value::is_null))
                    .collect();
                if !missing.is_empty() {
                    match self.local.get(&missing) {
                        Ok(fallback) => {
                            for (k, v) in fallback {
                                if !v.is_null() {
                                    items.insert(k, v);
                                }
                            }
                        }
                        Err(e) => debug!(error = %e, "local fallback read failed"),
                    }
                }
                Ok(TieredRead {
                    items,
                    source: Tier::Synced,
                })
            }
            Err(e) => {
                warn!(error = %e, "synced storage unreadable, reading local tier");
                let items = self.local.get(keys)?;
                Ok(TieredRead {
                    items,
                    source: Tier::Local,
                })
            }
        }
    }

    /// Write shared keys to both tiers.
    pub fn write(&self, items: Items) -> Result<(), StorageError> {
        let synced = self.synced.set(&items);
        let local = self.local.set(&items);
        match (synced, local) {
            (Err(s), Err(l)) => {
                warn!(synced = %s, local = %l, "write failed on both tiers");
                return Err(StorageError::WriteFailed {
                    keys: items.keys().cloned().collect(),
                });
            }
            (Err(e), Ok(())) => {
                warn!(error = %e, "synced write failed, saved locally only");
                self.notify(Tier::Local, &items);
            }
            (Ok(()), Err(e)) => {
                warn!(error = %e, "local mirror write failed");
                self.notify(Tier::Synced, &items);
            }
            (Ok(()), Ok(())) => {
                self.notify(Tier::Synced, &items);
                self.notify(Tier::Local, &items);
            }
        }
        Ok(())
    }

    /// Write device-only keys.
    pub fn write_local(&self, items: Items) -> Result<(), StorageError> {
        self.local.set(&items)?;
        self.notify(Tier::Local, &items);
        Ok(())
    }

    fn notify(&self, tier: Tier, items: &Items) {
        // No subscribers is fine.
        let _ = self.changes.send(StorageChange {
            tier,
            keys: items.keys().cloned().collect(),
        });
    }

    // ── Blocking config ──────────────────────────────────────────────

    pub fn load_blocking(&self) -> Result<BlockingConfig, StorageError> {
        let mut wanted = keys::BLOCKING_KEYS.to_vec();
        wanted.push(keys::CUSTOM_MINUTES);
        let read = self.read(&wanted)?;

        let blocked_sites: BlockedSites = read
            .value(keys::BLOCKED_SITES)
            .and_then(Value::as_array)
            .map(|sites| {
                sites
                    .iter()
                    .filter_map(Value::as_str)
                    .map(Pattern::parse)
                    .collect()
            })
            .unwrap_or_default();

        let duration = read
            .value(keys::BLOCKING_DURATION)
            .and_then(Value::as_str)
            .and_then(|s| stored_duration(s, read.value(keys::CUSTOM_MINUTES)));

        Ok(BlockingConfig {
            enabled: read
                .value(keys::BLOCKING_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            blocked_sites,
            end_time: sanitize_timestamp(read.value(keys::BLOCKING_END_TIME)),
            duration,
        })
    }

    pub fn save_blocking(&self, config: &BlockingConfig) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(keys::BLOCKING_ENABLED.into(), json!(config.enabled));
        items.insert(
            keys::BLOCKED_SITES.into(),
            serde_json::to_value(&config.blocked_sites)?,
        );
        items.insert(keys::BLOCKING_END_TIME.into(), json!(config.end_time));
        items.insert(
            keys::BLOCKING_DURATION.into(),
            json!(config.duration.map(|d| d.to_string())),
        );
        self.write(items)
    }

    // ── Session ──────────────────────────────────────────────────────

    pub fn load_session(&self) -> Result<SessionRecord, StorageError> {
        let shared = self.read(&[keys::BLOCKING_START_TIME])?;
        let device = self
            .local
            .get(&[keys::LAST_HEARTBEAT, keys::ACCUMULATED_MINUTES, keys::WAS_IDLE])
            .unwrap_or_else(|e| {
                warn!(error = %e, "local session fields unreadable");
                Items::new()
            });

        Ok(SessionRecord {
            start_time: sanitize_timestamp(shared.value(keys::BLOCKING_START_TIME)),
            last_heartbeat: sanitize_timestamp(device.get(keys::LAST_HEARTBEAT)),
            accumulated_minutes: sanitize_minutes(device.get(keys::ACCUMULATED_MINUTES)),
            was_idle: device
                .get(keys::WAS_IDLE)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    pub fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut shared = Items::new();
        shared.insert(keys::BLOCKING_START_TIME.into(), json!(record.start_time));
        self.write(shared)?;

        let mut device = Items::new();
        device.insert(keys::LAST_HEARTBEAT.into(), json!(record.last_heartbeat));
        device.insert(
            keys::ACCUMULATED_MINUTES.into(),
            json!(record.accumulated_minutes),
        );
        device.insert(keys::WAS_IDLE.into(), json!(record.was_idle));
        self.write_local(device)
    }

    /// Only refresh the heartbeat.
    pub fn save_heartbeat(&self, now_ms: i64) -> Result<(), StorageError> {
        let mut device = Items::new();
        device.insert(keys::LAST_HEARTBEAT.into(), json!(now_ms));
        self.write_local(device)
    }

    // ── Stats ────────────────────────────────────────────────────────

    /// Missing stats read as an empty ledger; unreadable storage is an
    /// error so a commit never overwrites history with an empty ledger.
    pub fn load_stats(&self) -> Result<StatsLedger, StorageError> {
        let read = self.read(&[keys::STATS])?;
        Ok(read
            .value(keys::STATS)
            .map(StatsLedger::from_value)
            .unwrap_or_default())
    }

    pub fn save_stats(&self, ledger: &StatsLedger) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(keys::STATS.into(), serde_json::to_value(ledger)?);
        self.write(items)
    }

    // ── Muted tabs ───────────────────────────────────────────────────

    pub fn load_muted(&self) -> Result<BTreeSet<TabId>, StorageError> {
        let items = self.local.get(&[keys::MUTED_BY_EXTENSION])?;
        Ok(items
            .get(keys::MUTED_BY_EXTENSION)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).map(TabId).collect())
            .unwrap_or_default())
    }

    pub fn save_muted(&self, muted: &BTreeSet<TabId>) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(keys::MUTED_BY_EXTENSION.into(), serde_json::to_value(muted)?);
        self.write_local(items)
    }
}

/// Decode a stored duration. Older versions wrote a bare `"custom"` with
/// the minutes under their own key.
fn stored_duration(raw: &str, custom_minutes: Option<&Value>) -> Option<BlockingDuration> {
    if raw.trim().eq_ignore_ascii_case("custom") {
        let minutes = u32::try_from(sanitize_minutes(custom_minutes)).unwrap_or(0);
        if minutes == 0 {
            warn!("ignoring custom duration without minutes");
            return None;
        }
        return Some(BlockingDuration::Custom(minutes));
    }
    match raw.parse() {
        Ok(d) => Some(d),
        Err(e) => {
            warn!(error = %e, "ignoring stored duration");
            None
        }
    }
}
