use super::args::{Cli, Command};

pub mod plan;
pub mod run;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Plan(args) => plan::run(args),
        Command::Run(args) => run::run(args).await,
    }
}
