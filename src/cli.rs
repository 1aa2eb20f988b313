use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Point forecast verification.
#[derive(Parser)]
#[command(
    name = "verif",
    version,
    about = "Match point observations to forecasts and compute verification statistics"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Pair one case and compute per-partition statistics.
    Verify(VerifyArgs),
    /// Merge SL1L2 partial sums from earlier `verify` runs.
    Aggregate(AggregateArgs),
}

/// Arguments for the `verify` subcommand.
#[derive(clap::Args)]
pub struct VerifyArgs {
    /// Path to the TOML task file.
    #[arg(short, long, default_value = "verif.toml")]
    pub config: PathBuf,

    /// Path to the JSON case: grid, forecast planes and observations.
    #[arg(long)]
    pub case: PathBuf,

    /// Override the output JSON path from the task file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `aggregate` subcommand.
#[derive(clap::Args)]
pub struct AggregateArgs {
    /// Statistics JSON files written by `verify`.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Alpha for the normal confidence intervals; repeat for several.
    #[arg(long = "alpha", default_values_t = [0.05])]
    pub alphas: Vec<f64>,

    /// Path for the aggregated JSON. Printed to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
