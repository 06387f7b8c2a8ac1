//! Runner switch command.

use anyhow::Result;
use clap::Args;

use crate::commands::Session;
use crate::components::ComponentKind;
use crate::output::Output;

#[derive(Debug, Args)]
pub struct RunnerArgs {
    /// Bottle name
    pub bottle: String,

    /// Runner to switch to; omit to list installed runners
    pub runner: Option<String>,
}

pub fn run(args: RunnerArgs, session: &Session) -> Result<()> {
    let Some(runner) = args.runner else {
        let snapshot = session.manager.components();
        return session.emit(Ok(snapshot.versions(ComponentKind::Runner).to_vec()), |runners| {
            for runner in runners {
                Output::list_item(runner);
            }
        });
    };
    let config = session.bottle(&args.bottle)?;
    session.emit(session.manager.runner_update(&config, &runner), |config| {
        Output::success(format!("{} now uses {}", config.name, config.runner));
    })
}
