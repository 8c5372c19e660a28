pub mod accountant;
mod expiry;
mod manager;
mod record;

pub use expiry::{ExpiryScheduler, HEARTBEAT_ALARM, TIMER_ALARM};
pub use manager::SessionManager;
pub use record::{SessionRecord, SessionState};
