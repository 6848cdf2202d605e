use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::FmtSubscriber;
use wflo_cli::{Cli, Commands};

mod commands;

use commands::optimize::OptimizeArgs;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries results; logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    match &cli.command {
        Commands::Aep {
            problem,
            model,
            out,
            threads,
        } => commands::aep::handle(problem, *model, out.as_deref(), threads),
        Commands::Optimize {
            problem,
            out,
            max_iterations,
            algorithm,
            timeout,
            threads,
        } => commands::optimize::handle(OptimizeArgs {
            problem,
            out: out.as_deref(),
            max_iterations: *max_iterations,
            algorithm: algorithm.as_deref(),
            timeout: *timeout,
            threads,
        }),
        Commands::Validate { problem } => commands::validate::handle(problem),
    }
}
