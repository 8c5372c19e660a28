//! Capabilities the background engine borrows from its host.
//!
//! The engine never talks to a browser, an alarm service or the wall clock
//! directly. Each is injected as a trait object so the same state machine
//! runs inside an extension shim, the CLI, or a test harness.

mod memory;

pub use memory::{ManualClock, MemoryAlarms, MemoryTabs, SystemClock};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TabError;

/// Host-assigned tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of one open tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    /// `None` while the tab has no committed URL yet.
    pub url: Option<String>,
    /// Current audible state, whoever set it.
    pub muted: bool,
}

/// What the block-page overlay needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    /// Matched pattern with its wildcard marker stripped, for display.
    pub site: String,
    pub end_time: Option<i64>,
}

/// Broadcast to every tab whenever the timer changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerNotice {
    pub end_time: Option<i64>,
    pub enabled: bool,
}

/// Tab control surface of the host.
pub trait TabHost: Send + Sync {
    /// Every open tab, in host order.
    fn query(&self) -> Result<Vec<Tab>, TabError>;

    fn set_muted(&self, tab: TabId, muted: bool) -> Result<(), TabError>;

    /// Inject (or refresh) the blocking overlay.
    fn inject_overlay(&self, tab: TabId, overlay: &Overlay) -> Result<(), TabError>;

    fn remove_overlay(&self, tab: TabId) -> Result<(), TabError>;

    fn reload(&self, tab: TabId) -> Result<(), TabError>;

    /// Fire-and-forget message to all tabs.
    fn broadcast(&self, notice: &TimerNotice);
}

/// When a durable alarm fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSchedule {
    /// First fire time (epoch ms). `None` means one period from now.
    pub when_ms: Option<i64>,
    /// Repeat interval. `None` fires once.
    pub period_minutes: Option<u32>,
}

/// Host-scheduled alarms that survive process suspension.
pub trait AlarmHost: Send + Sync {
    /// Create or replace the alarm called `name`.
    fn create(&self, name: &str, schedule: AlarmSchedule);

    /// Returns whether an alarm was removed.
    fn clear(&self, name: &str) -> bool;
}

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The capabilities handed to the engine at construction.
#[derive(Clone)]
pub struct Host {
    pub tabs: Arc<dyn TabHost>,
    pub alarms: Arc<dyn AlarmHost>,
    pub clock: Arc<dyn Clock>,
}
