use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wflo", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annual energy production of the seed layout
    Aep {
        /// Problem file (TOML, or JSON by extension)
        #[arg(long, value_hint = ValueHint::FilePath)]
        problem: PathBuf,
        /// Override the wake deficit model of the problem file
        #[arg(long, value_enum)]
        model: Option<WakeKind>,
        /// Write the AEP report as JSON
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// Threads for direction sampling (auto = all cores)
        #[arg(long, default_value = "auto")]
        threads: String,
    },
    /// Optimize turbine positions for maximum AEP
    Optimize {
        /// Problem file (TOML, or JSON by extension)
        #[arg(long, value_hint = ValueHint::FilePath)]
        problem: PathBuf,
        /// Write the optimized layout, trace and termination state as JSON
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// Override the outer iteration limit of the problem file
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Override the optimizer backend (sqp, penalty-lbfgs)
        #[arg(long)]
        algorithm: Option<String>,
        /// Wall-clock budget in seconds; the best layout so far is kept
        #[arg(long)]
        timeout: Option<f64>,
        /// Threads for AEP and gradient evaluation (auto = all cores)
        #[arg(long, default_value = "auto")]
        threads: String,
    },
    /// Check a problem file and print diagnostics
    Validate {
        /// Problem file (TOML, or JSON by extension)
        #[arg(long, value_hint = ValueHint::FilePath)]
        problem: PathBuf,
    },
}

/// Wake deficit shape, selectable from the command line or the problem file
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeKind {
    #[default]
    Gaussian,
    TopHat,
    None,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
