use clap::Subcommand;
use focusguard_core::SessionManager;

use crate::common::{close, open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today, week, streaks and totals
    Summary,
    /// The raw per-day and per-hour ledger
    Ledger,
}

pub async fn run(action: StatsAction) -> CliResult {
    let manager = open_engine().await?;
    let result = show(&manager, action);
    close(&manager);
    result
}

fn show(manager: &SessionManager, action: StatsAction) -> CliResult {
    match action {
        StatsAction::Summary => print_json(&manager.summary()?),
        StatsAction::Ledger => print_json(&manager.ledger()?),
    }
}
