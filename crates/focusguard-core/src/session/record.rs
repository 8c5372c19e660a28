use serde::{Deserialize, Serialize};

/// Lifecycle state derived from a [`SessionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Off,
    Running,
    /// Device locked; time so far is carried in `accumulated_minutes`.
    Paused,
}

/// Persisted fields of the session in progress.
///
/// `start_time` is mirrored to the synced tier so other surfaces can show a
/// live session; the rest only matter on this device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub start_time: Option<i64>,
    pub last_heartbeat: Option<i64>,
    pub accumulated_minutes: u64,
    pub was_idle: bool,
}

impl SessionRecord {
    /// A fresh running segment starting at `now_ms`.
    pub fn running(now_ms: i64, accumulated_minutes: u64) -> Self {
        Self {
            start_time: Some(now_ms),
            last_heartbeat: Some(now_ms),
            accumulated_minutes,
            was_idle: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.start_time {
            Some(_) => SessionState::Running,
            None if self.was_idle || self.accumulated_minutes > 0 => SessionState::Paused,
            None => SessionState::Off,
        }
    }

    /// Nothing left to finalize.
    pub fn is_empty(&self) -> bool {
        self.state() == SessionState::Off
    }
}
