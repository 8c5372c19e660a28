use serde::{Deserialize, Serialize};

use crate::blocking::BlockingDuration;
use crate::host::{Tab, TabId};
use crate::storage::Tier;

/// System idle state as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    /// No input for a while. Does not pause a session.
    Idle,
    /// Screen locked. Pauses a running session.
    Locked,
}

/// Messages sent by the popup and options page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Blocking was switched on or off. The config has already been saved
    /// by the sender; this asks the engine to act on it.
    #[serde(rename_all = "camelCase")]
    UpdateBlocking {
        enabled: bool,
        #[serde(default)]
        end_time: Option<i64>,
        #[serde(default)]
        duration: Option<BlockingDuration>,
    },
    /// The site list changed.
    UpdateRules,
}

/// Everything the host delivers to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Process started (install, browser start, or wake from suspension).
    Started,
    ConfigChanged { tier: Tier, keys: Vec<String> },
    NavigationCompleted(Tab),
    TabClosed(TabId),
    AlarmFired(String),
    IdleStateChanged(IdleState),
    Message(Command),
}
