pub mod cli;
pub mod commands;

pub use cli::{build_cli_command, Cli, Commands};
