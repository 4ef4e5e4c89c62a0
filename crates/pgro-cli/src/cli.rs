use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every scenario's cascade on the base grid
    Simulate {
        /// Instance directory (grid_nodes.csv, grid_edges.csv, scenario_*.csv)
        #[arg(long)]
        instance: PathBuf,
        /// Simulator settings (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write one cascade_s<id>.csv per scenario here
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },
    /// Check a candidate assignment and print the resulting cuts as JSON
    Check {
        /// Instance directory
        #[arg(long)]
        instance: PathBuf,
        /// Candidate values as a name,value CSV
        #[arg(long)]
        candidate: PathBuf,
        /// Simulator settings (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use bounded cascades (stop at the first unasserted failure)
        #[arg(long)]
        bounded: bool,
    },
    /// Print instance diagnostics; exits non-zero on errors
    Validate {
        /// Instance directory
        #[arg(long)]
        instance: PathBuf,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
