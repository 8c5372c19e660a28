//! # Focusguard Core Library
//!
//! The background engine of a personal website blocker. The user declares a
//! set of blocked sites and an optional duration; matching tabs are muted and
//! covered until the duration elapses or blocking is switched off, and the
//! focused minutes are recorded.
//!
//! The engine runs in a process the host may suspend or restart at any time,
//! so every piece of session state lives in storage and each transition
//! re-reads it.
//!
//! ## Architecture
//!
//! - **Sites**: pattern normalization and URL matching
//! - **Session**: the state machine, time accountant and expiry scheduler
//! - **Stats**: the per-day / per-hour ledger and its single writer
//! - **Tabs**: keeps open tabs in line with the blocking state
//! - **Storage**: synced and local tiers, engine config, import/export
//! - **Host**: injected tab, alarm and clock capabilities
//!
//! ## Key Components
//!
//! - [`SessionManager`]: entry point for host events and user commands
//! - [`ConfigStore`]: typed access to both storage tiers
//! - [`StatsLedger`]: persisted focus aggregates
//! - [`EngineConfig`]: engine tunables from `config.toml`

pub mod blocking;
pub mod error;
pub mod events;
pub mod host;
pub mod session;
pub mod sites;
pub mod stats;
pub mod storage;
pub mod tabs;

pub use blocking::{BlockingConfig, BlockingDuration};
pub use error::{ConfigError, CoreError, StorageError, TabError, ValidationError};
pub use events::{Command, HostEvent, IdleState};
pub use host::{AlarmHost, Clock, Host, TabHost, TabId};
pub use session::{SessionManager, SessionRecord, SessionState};
pub use sites::{BlockedSites, Pattern};
pub use stats::{StatsLedger, StatsSummary};
pub use storage::{ConfigStore, EngineConfig, JsonFileArea, MemoryArea, Tier};
pub use tabs::{ResyncOutcome, TabSynchronizer};
