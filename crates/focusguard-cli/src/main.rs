use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "focusguard-cli", version, about = "Focusguard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch blocking on or off
    Blocking {
        #[command(subcommand)]
        action: commands::blocking::BlockingAction,
    },
    /// Manage the block list
    Site {
        #[command(subcommand)]
        action: commands::site::SiteAction,
    },
    /// Focus statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Export the block list and stats as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<std::path::PathBuf>,
    },
    /// Merge a previously exported file
    Import {
        /// Path to the export file
        file: std::path::PathBuf,
    },
    /// Report a screen lock or unlock
    Idle {
        #[arg(value_enum)]
        state: commands::idle::IdleArg,
    },
    /// Run the periodic heartbeat and expiry check once
    Tick,
    /// Engine configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSGUARD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Blocking { action } => commands::blocking::run(action).await,
        Commands::Site { action } => commands::site::run(action).await,
        Commands::Stats { action } => commands::stats::run(action).await,
        Commands::Export { output } => commands::transfer::export(output).await,
        Commands::Import { file } => commands::transfer::import(file).await,
        Commands::Idle { state } => commands::idle::run(state).await,
        Commands::Tick => commands::tick::run().await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
