/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{parse_key_value, Cli, Commands, GroupAction, MetaAction, OutputFormat};
pub use commands::handle_command;
