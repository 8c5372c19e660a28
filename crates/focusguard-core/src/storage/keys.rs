//! Persisted key names.
//!
//! Shared keys are written to both tiers and read synced-first. Device keys
//! live only in the local tier.

pub const BLOCKING_ENABLED: &str = "blockingEnabled";
pub const BLOCKED_SITES: &str = "blockedSites";
pub const BLOCKING_END_TIME: &str = "blockingEndTime";
pub const BLOCKING_DURATION: &str = "blockingDuration";
pub const BLOCKING_START_TIME: &str = "blockingStartTime";
pub const STATS: &str = "stats";
/// Minutes of a bare `"custom"` duration, as older versions stored it.
pub const CUSTOM_MINUTES: &str = "customMinutes";

pub const LAST_HEARTBEAT: &str = "lastHeartbeat";
pub const ACCUMULATED_MINUTES: &str = "accumulatedMinutes";
pub const WAS_IDLE: &str = "wasIdle";
pub const MUTED_BY_EXTENSION: &str = "mutedByExtension";

/// Keys whose change means the blocking state itself moved.
pub const BLOCKING_KEYS: [&str; 4] = [
    BLOCKING_ENABLED,
    BLOCKED_SITES,
    BLOCKING_END_TIME,
    BLOCKING_DURATION,
];

pub fn is_blocking_key(key: &str) -> bool {
    BLOCKING_KEYS.contains(&key)
}
