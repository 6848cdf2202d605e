pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, WakeKind};
pub use config::ProblemFile;
