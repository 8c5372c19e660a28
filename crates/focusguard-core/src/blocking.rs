//! The declared blocking state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::host::TimerNotice;
use crate::sites::BlockedSites;

/// Duration picked when blocking was switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlockingDuration {
    /// Until switched off.
    Infinite,
    /// One of the preset lengths, in minutes.
    Minutes(u32),
    /// A user-typed length, in minutes.
    Custom(u32),
}

impl BlockingDuration {
    /// Length in minutes, or `None` when unbounded.
    pub fn minutes(&self) -> Option<u32> {
        match self {
            BlockingDuration::Infinite => None,
            BlockingDuration::Minutes(m) | BlockingDuration::Custom(m) => Some(*m),
        }
    }

    /// End time for a session switched on at `now_ms`.
    pub fn end_time_from(&self, now_ms: i64) -> Option<i64> {
        self.minutes().map(|m| now_ms + i64::from(m) * 60_000)
    }
}

impl fmt::Display for BlockingDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingDuration::Infinite => f.write_str("infinite"),
            BlockingDuration::Minutes(m) => write!(f, "{m}"),
            BlockingDuration::Custom(m) => write!(f, "custom:{m}"),
        }
    }
}

impl FromStr for BlockingDuration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ValidationError::InvalidDuration(s.to_string());
        if s.eq_ignore_ascii_case("infinite") {
            return Ok(BlockingDuration::Infinite);
        }
        let (custom, digits) = match s.strip_prefix("custom:") {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let minutes: u32 = digits.parse().map_err(|_| invalid())?;
        if minutes == 0 {
            return Err(invalid());
        }
        Ok(if custom {
            BlockingDuration::Custom(minutes)
        } else {
            BlockingDuration::Minutes(minutes)
        })
    }
}

impl TryFrom<String> for BlockingDuration {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockingDuration> for String {
    fn from(d: BlockingDuration) -> Self {
        d.to_string()
    }
}

/// What the user declared: on/off, which sites, and until when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingConfig {
    pub enabled: bool,
    pub blocked_sites: BlockedSites,
    /// Epoch ms at which a bounded session ends.
    pub end_time: Option<i64>,
    pub duration: Option<BlockingDuration>,
}

impl BlockingConfig {
    /// Whether a bounded session has reached its end.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.enabled && self.end_time.is_some_and(|end| now_ms >= end)
    }

    /// Milliseconds left, `None` when unbounded or off.
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        if !self.enabled {
            return None;
        }
        self.end_time.map(|end| (end - now_ms).max(0))
    }

    /// Switched off: end time and duration are cleared with it.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self.end_time = None;
        self.duration = None;
        self
    }

    pub fn notice(&self) -> TimerNotice {
        TimerNotice {
            end_time: if self.enabled { self.end_time } else { None },
            enabled: self.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parses_all_forms() {
        assert_eq!("infinite".parse::<BlockingDuration>().unwrap(), BlockingDuration::Infinite);
        assert_eq!("25".parse::<BlockingDuration>().unwrap(), BlockingDuration::Minutes(25));
        assert_eq!(
            "custom:40".parse::<BlockingDuration>().unwrap(),
            BlockingDuration::Custom(40)
        );
        assert!("0".parse::<BlockingDuration>().is_err());
        assert!("custom:".parse::<BlockingDuration>().is_err());
        assert!("soon".parse::<BlockingDuration>().is_err());
    }

    #[test]
    fn duration_serializes_as_string() {
        let json = serde_json::to_string(&BlockingDuration::Custom(40)).unwrap();
        assert_eq!(json, "\"custom:40\"");
        let back: BlockingDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BlockingDuration::Custom(40));
    }

    #[test]
    fn end_time_only_for_bounded() {
        assert_eq!(BlockingDuration::Minutes(25).end_time_from(0), Some(25 * 60_000));
        assert_eq!(BlockingDuration::Infinite.end_time_from(0), None);
    }

    #[test]
    fn expiry_and_remaining() {
        let cfg = BlockingConfig {
            enabled: true,
            end_time: Some(10_000),
            duration: Some(BlockingDuration::Minutes(1)),
            ..Default::default()
        };
        assert!(!cfg.is_expired(9_999));
        assert!(cfg.is_expired(10_000));
        assert_eq!(cfg.remaining_ms(4_000), Some(6_000));
        assert_eq!(cfg.remaining_ms(20_000), Some(0));

        let off = cfg.disabled();
        assert!(!off.is_expired(20_000));
        assert_eq!(off.end_time, None);
        assert_eq!(off.duration, None);
        assert_eq!(off.notice(), TimerNotice { end_time: None, enabled: false });
    }
}
