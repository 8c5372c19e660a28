use clap::Subcommand;
use focusguard_core::SessionManager;

use crate::common::{close, open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum SiteAction {
    /// Add a site ("youtube.com" blocks everywhere, "https://youtube.com" only that host)
    Add {
        site: String,
    },
    /// Remove a site (only while blocking is off)
    Remove {
        site: String,
    },
    /// List blocked sites, newest first
    List,
}

pub async fn run(action: SiteAction) -> CliResult {
    let manager = open_engine().await?;
    let result = apply(&manager, action).await;
    close(&manager);
    result
}

async fn apply(manager: &SessionManager, action: SiteAction) -> CliResult {
    match action {
        SiteAction::Add { site } => {
            let pattern = manager.add_site(&site).await?;
            println!("added: {pattern}");
        }
        SiteAction::Remove { site } => {
            let pattern = manager.remove_site(&site).await?;
            println!("removed: {pattern}");
        }
        SiteAction::List => print_json(&manager.blocking()?.blocked_sites)?,
    }
    Ok(())
}
