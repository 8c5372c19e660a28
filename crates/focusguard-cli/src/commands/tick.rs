use focusguard_core::session::{HEARTBEAT_ALARM, TIMER_ALARM};
use focusguard_core::SessionManager;

use crate::commands::blocking::status;
use crate::common::{close, open_engine, CliResult};

/// What the host's periodic alarms would do, run once. Meant for cron or a
/// systemd timer.
pub async fn run() -> CliResult {
    let manager = open_engine().await?;
    let result = fire_alarms(&manager).await;
    close(&manager);
    result
}

async fn fire_alarms(manager: &SessionManager) -> CliResult {
    manager.on_alarm(HEARTBEAT_ALARM).await?;
    manager.on_alarm(TIMER_ALARM).await?;
    status(manager)
}
