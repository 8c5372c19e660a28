use clap::Subcommand;
use focusguard_core::{BlockingDuration, SessionManager};
use serde_json::json;

use crate::common::{close, open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum BlockingAction {
    /// Start blocking
    On {
        /// Minutes (e.g. "25"), "custom:<minutes>", or "infinite"
        #[arg(long)]
        duration: Option<BlockingDuration>,
    },
    /// Stop blocking and record the session
    Off,
    /// Print blocking and session state as JSON
    Status,
}

pub async fn run(action: BlockingAction) -> CliResult {
    let manager = open_engine().await?;
    let result = apply(&manager, action).await;
    close(&manager);
    result
}

async fn apply(manager: &SessionManager, action: BlockingAction) -> CliResult {
    match action {
        BlockingAction::On { duration } => {
            manager.set_blocking(true, duration).await?;
        }
        BlockingAction::Off => {
            manager.set_blocking(false, None).await?;
        }
        BlockingAction::Status => {}
    }
    status(manager)
}

pub fn status(manager: &SessionManager) -> CliResult {
    let config = manager.blocking()?;
    print_json(&json!({
        "enabled": config.enabled,
        "endTime": config.end_time,
        "remainingMs": manager.remaining_ms()?,
        "duration": config.duration,
        "blockedSites": config.blocked_sites,
        "session": manager.session_state()?,
        "currentMinutes": manager.current_minutes()?,
    }))
}
