//! Per-day and per-hour focus aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::accountant::{sanitize_minutes, MINUTE_MS};

/// Days of history kept in the ledger.
pub const RETENTION_DAYS: u32 = 90;

/// Aggregated focus minutes.
///
/// `daily` and `hourly_by_date` are pruned to the retention window;
/// `total_minutes` is all-time and only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsLedger {
    #[serde(default)]
    pub daily: BTreeMap<String, u64>,
    #[serde(default)]
    pub hourly_by_date: BTreeMap<String, BTreeMap<u8, u64>>,
    #[serde(default)]
    pub total_minutes: u64,
}

impl StatsLedger {
    /// Lenient decode of a persisted ledger; malformed entries are dropped
    /// and malformed numbers read as zero.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let daily = obj
            .get("daily")
            .and_then(Value::as_object)
            .map(|days| {
                days.iter()
                    .filter(|(k, _)| parse_date_key(k).is_some())
                    .map(|(k, v)| (k.clone(), sanitize_minutes(Some(v))))
                    .filter(|(_, m)| *m > 0)
                    .collect()
            })
            .unwrap_or_default();

        let hourly_by_date = obj
            .get("hourlyByDate")
            .and_then(Value::as_object)
            .map(|days| {
                days.iter()
                    .filter(|(k, _)| parse_date_key(k).is_some())
                    .filter_map(|(k, hours)| {
                        let hours: BTreeMap<u8, u64> = hours
                            .as_object()?
                            .iter()
                            .filter_map(|(h, v)| {
                                let hour = h.parse::<u8>().ok().filter(|h| *h < 24)?;
                                Some((hour, sanitize_minutes(Some(v))))
                            })
                            .filter(|(_, m)| *m > 0)
                            .collect();
                        Some((k.clone(), hours))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            daily,
            hourly_by_date,
            total_minutes: sanitize_minutes(obj.get("totalMinutes")),
        }
    }

    pub fn minutes_on(&self, date_key: &str) -> u64 {
        self.daily.get(date_key).copied().unwrap_or(0)
    }

    /// Add `minutes` of focus ending at `end_ms`, spread minute by minute
    /// over the local hours (and days) they fell in. Returns the minutes
    /// actually recorded after applying `ceiling`.
    pub fn record(&mut self, minutes: u64, end_ms: i64, ceiling: u64) -> u64 {
        let minutes = minutes.min(ceiling);
        if minutes == 0 {
            return 0;
        }
        let start_ms = end_ms - minutes as i64 * MINUTE_MS;
        for i in 0..minutes as i64 {
            let Some(at) = local_time(start_ms + i * MINUTE_MS) else {
                continue;
            };
            let key = at.format("%Y-%m-%d").to_string();
            let hour = at.hour() as u8;
            *self.daily.entry(key.clone()).or_insert(0) += 1;
            *self
                .hourly_by_date
                .entry(key)
                .or_default()
                .entry(hour)
                .or_insert(0) += 1;
        }
        self.total_minutes = self.total_minutes.saturating_add(minutes);
        minutes
    }

    /// Drop per-day detail older than `retention_days` before `today`.
    /// Unparseable date keys are dropped too. The total is untouched.
    pub fn prune(&mut self, today: NaiveDate, retention_days: u32) {
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) else {
            return;
        };
        let keep = |key: &String| parse_date_key(key).is_some_and(|d| d > cutoff);
        self.daily.retain(|k, _| keep(k));
        self.hourly_by_date.retain(|k, _| keep(k));
    }

    /// Merge another ledger by taking the larger value per day and per hour.
    /// The total grows only by how much days were raised, so overlapping
    /// days are never counted twice. Returns the number of raised days.
    pub fn merge_max(&mut self, other: &StatsLedger) -> usize {
        let mut raised = 0;
        for (day, &theirs) in &other.daily {
            let ours = self.daily.entry(day.clone()).or_insert(0);
            if theirs > *ours {
                self.total_minutes = self.total_minutes.saturating_add(theirs - *ours);
                *ours = theirs;
                raised += 1;
            }
        }
        for (day, hours) in &other.hourly_by_date {
            let ours = self.hourly_by_date.entry(day.clone()).or_default();
            for (&hour, &theirs) in hours {
                let slot = ours.entry(hour).or_insert(0);
                *slot = (*slot).max(theirs);
            }
        }
        raised
    }
}

/// Local calendar day of an epoch-ms instant, as `YYYY-MM-DD`.
pub fn date_key(ms: i64) -> String {
    local_time(ms)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Local calendar day of an epoch-ms instant.
pub fn local_date(ms: i64) -> Option<NaiveDate> {
    local_time(ms).map(|t| t.date_naive())
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

fn local_time(ms: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&Local))
}
