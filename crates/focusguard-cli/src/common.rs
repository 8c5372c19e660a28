//! Engine wiring shared by every command.
//!
//! Each invocation is one short-lived run of the background process: the
//! engine is rebuilt over the JSON files in the data directory and handed a
//! startup event before the command runs.

use std::sync::Arc;

use focusguard_core::host::{MemoryAlarms, MemoryTabs, SystemClock};
use focusguard_core::storage::data_dir;
use focusguard_core::{ConfigStore, EngineConfig, Host, JsonFileArea, SessionManager};
use serde::Serialize;
use tracing::debug;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub async fn open_engine() -> CliResult<SessionManager> {
    let dir = data_dir()?;
    debug!(dir = %dir.display(), "opening engine");
    let store = Arc::new(ConfigStore::new(
        Arc::new(JsonFileArea::new(dir.join("synced.json"))),
        Arc::new(JsonFileArea::new(dir.join("local.json"))),
    ));
    // No browser behind the CLI: tabs and alarms live for this run only.
    let host = Host {
        tabs: Arc::new(MemoryTabs::new()),
        alarms: Arc::new(MemoryAlarms::new()),
        clock: Arc::new(SystemClock),
    };
    let manager = SessionManager::new(store, host, &EngineConfig::load_or_default());
    manager.on_startup().await?;
    Ok(manager)
}

/// Stop the in-process expiry timer before the runtime shuts down.
pub fn close(manager: &SessionManager) {
    manager.expiry().stop_timer();
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
