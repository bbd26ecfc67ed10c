use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tribunal",
    version,
    about = "Run an evaluation matrix of candidate models and have a judge model rank them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Expand the suite and print its variants and combination count
    Plan(PlanArgs),
    /// Run every combination, judge it, and print the summary
    Run(RunArgs),
}

#[derive(Args, Clone)]
pub struct PlanArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,

    /// Contact all candidates of a combination concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Use the offline fake provider instead of the HTTP endpoint
    #[arg(long)]
    pub fake: bool,

    /// Per-request timeout in seconds (overrides the suite setting)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the aggregation views as JSON instead of text
    #[arg(long)]
    pub json: bool,
}
