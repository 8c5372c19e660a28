//! Focus-minute arithmetic over persisted session fields.
//!
//! Pure functions only. The heartbeat is the sole proof the process was
//! alive: once `now - last_heartbeat` exceeds the gap threshold, everything
//! after the last heartbeat is treated as sleep or a dead process and is not
//! counted.

use serde_json::Value;

use super::SessionRecord;

pub const MINUTE_MS: i64 = 60_000;

/// Heartbeat silence longer than this is a gap.
pub const GAP_THRESHOLD_MS: i64 = 30 * MINUTE_MS;

/// Upper bound for one session's accounted minutes (24h).
pub const SESSION_CEILING_MINUTES: u64 = 24 * 60;

/// Tunables for the accountant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub gap_threshold_ms: i64,
    pub ceiling_minutes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            gap_threshold_ms: GAP_THRESHOLD_MS,
            ceiling_minutes: SESSION_CEILING_MINUTES,
        }
    }
}

/// Result of accounting a session at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    /// Carried plus current-segment minutes, capped at the ceiling.
    pub minutes: u64,
    /// Heartbeats stopped for longer than the threshold.
    pub gap: bool,
    /// Instant the current segment was measured up to.
    pub effective_end: i64,
}

/// Whether the heartbeat has been silent for longer than the threshold.
pub fn has_gap(record: &SessionRecord, now_ms: i64, limits: &Limits) -> bool {
    record
        .last_heartbeat
        .is_some_and(|hb| now_ms - hb > limits.gap_threshold_ms)
}

/// Elapsed focus minutes at `now_ms`, discarding time after the last
/// heartbeat when a gap is detected.
pub fn elapsed(record: &SessionRecord, now_ms: i64, limits: &Limits) -> Elapsed {
    let gap = record.start_time.is_some() && has_gap(record, now_ms, limits);
    let effective_end = match (gap, record.last_heartbeat) {
        (true, Some(hb)) => hb,
        _ => now_ms,
    };
    Elapsed {
        minutes: elapsed_until(record, effective_end, limits),
        gap,
        effective_end,
    }
}

/// Elapsed focus minutes with the current segment cut at `end_ms`.
pub fn elapsed_until(record: &SessionRecord, end_ms: i64, limits: &Limits) -> u64 {
    let carried = record.accumulated_minutes.min(limits.ceiling_minutes);
    let segment = record
        .start_time
        .map(|start| segment_minutes(start, end_ms))
        .unwrap_or(0);
    carried.saturating_add(segment).min(limits.ceiling_minutes)
}

/// Whole minutes in `[start, end)`; zero when the clock ran backwards.
pub fn segment_minutes(start_ms: i64, end_ms: i64) -> u64 {
    if end_ms <= start_ms {
        return 0;
    }
    ((end_ms - start_ms) / MINUTE_MS) as u64
}

/// Coerce a persisted minute count. Anything non-finite, negative or
/// non-numeric becomes 0.
pub fn sanitize_minutes(value: Option<&Value>) -> u64 {
    finite_non_negative(value).map(|v| v.floor() as u64).unwrap_or(0)
}

/// Coerce a persisted epoch-ms timestamp. Zero and garbage read as unset.
pub fn sanitize_timestamp(value: Option<&Value>) -> Option<i64> {
    finite_non_negative(value)
        .map(|v| v.floor() as i64)
        .filter(|ms| *ms > 0)
}

fn finite_non_negative(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some(n)
}
