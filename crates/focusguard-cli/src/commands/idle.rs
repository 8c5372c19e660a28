use clap::ValueEnum;
use focusguard_core::IdleState;

use crate::commands::blocking::status;
use crate::common::{close, open_engine, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum IdleArg {
    Active,
    Idle,
    Locked,
}

impl From<IdleArg> for IdleState {
    fn from(arg: IdleArg) -> Self {
        match arg {
            IdleArg::Active => IdleState::Active,
            IdleArg::Idle => IdleState::Idle,
            IdleArg::Locked => IdleState::Locked,
        }
    }
}

pub async fn run(state: IdleArg) -> CliResult {
    let manager = open_engine().await?;
    let result = match manager.on_idle_state(state.into()).await {
        Ok(()) => status(&manager),
        Err(e) => Err(e.into()),
    };
    close(&manager);
    result
}
