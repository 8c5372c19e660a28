//! Backup file format for the block list and stats.
//!
//! ```json
//! {"version": 1, "exportedAt": "2024-03-10T09:00:00+00:00",
//!  "blockedSites": ["*youtube.com"], "stats": {"daily": {...}, ...}}
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::sites::{BlockedSites, Pattern};
use crate::stats::StatsLedger;

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub version: u32,
    #[serde(default)]
    pub exported_at: Option<String>,
    pub blocked_sites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsLedger>,
}

/// What an import changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub sites_added: usize,
    /// Days whose minutes were raised by the imported stats.
    pub days_raised: usize,
}

/// Build an export of the current state. An empty block list has nothing
/// worth backing up and is rejected.
pub fn export(
    sites: &BlockedSites,
    stats: Option<&StatsLedger>,
    now_ms: i64,
) -> Result<ExportFile, ValidationError> {
    if sites.is_empty() {
        return Err(ValidationError::InvalidTransfer(
            "no blocked sites to export".into(),
        ));
    }
    Ok(ExportFile {
        version: EXPORT_VERSION,
        exported_at: DateTime::from_timestamp_millis(now_ms).map(|t| t.to_rfc3339()),
        blocked_sites: sites.iter().map(ToString::to_string).collect(),
        stats: stats.cloned(),
    })
}

/// Parse an import file. The only hard requirement is a `blockedSites`
/// array; non-string entries are skipped and stats are decoded leniently.
pub fn parse(text: &str) -> Result<ExportFile, ValidationError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ValidationError::InvalidTransfer(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::InvalidTransfer("expected a JSON object".into()))?;

    let blocked_sites = obj
        .get("blockedSites")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::InvalidTransfer("missing blockedSites array".into()))?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    Ok(ExportFile {
        version: obj
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(EXPORT_VERSION),
        exported_at: obj
            .get("exportedAt")
            .and_then(Value::as_str)
            .map(str::to_string),
        blocked_sites,
        stats: obj
            .get("stats")
            .filter(|v| v.is_object())
            .map(StatsLedger::from_value),
    })
}

impl ExportFile {
    /// Union the imported sites into `sites`: existing order kept, new ones
    /// appended, each normalized as if typed by the user.
    pub fn merge_sites(&self, sites: &mut BlockedSites) -> usize {
        sites.union(
            self.blocked_sites
                .iter()
                .filter_map(|raw| Pattern::from_input(raw).ok()),
        )
    }

    /// Max-merge the imported stats into `ledger`.
    pub fn merge_stats(&self, ledger: &mut StatsLedger) -> usize {
        self.stats
            .as_ref()
            .map(|theirs| ledger.merge_max(theirs))
            .unwrap_or(0)
    }
}
