use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::FilterLogic;

#[derive(Parser, Debug)]
#[command(name = "cacher")]
#[command(version)]
#[command(about = "Named file caches with group and metadata queries", long_about = None)]
pub struct Cli {
    /// Directory holding the caches (overrides the configured root)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new cache
    Init {
        cache: String,
        /// Clear the cache if it already exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Copy a file into a cache
    Add {
        cache: String,
        file: PathBuf,
        /// Store under this name instead of the file's base name
        #[arg(long)]
        name: Option<String>,
        /// Metadata entry, repeatable (key=value)
        #[arg(short, long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
        /// Group to add the file to, repeatable
        #[arg(short, long = "group")]
        groups: Vec<String>,
        /// Replace an existing file with the same name
        #[arg(long)]
        overwrite: bool,
    },
    /// Remove files from a cache
    Remove {
        cache: String,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List files whose name contains a substring
    List {
        cache: String,
        /// Name substring (all files when omitted)
        substring: Option<String>,
    },
    /// Query files by name, group and metadata
    Query {
        cache: String,
        /// Name substring, repeatable (any may match)
        #[arg(long = "name")]
        names: Vec<String>,
        /// Required group, repeatable
        #[arg(short, long = "group")]
        groups: Vec<String>,
        /// How groups combine
        #[arg(long, default_value = "and", value_parser = parse_logic)]
        group_logic: FilterLogic,
        /// Required metadata entry, repeatable (key=value)
        #[arg(short, long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
        /// How metadata entries combine
        #[arg(long, default_value = "and", value_parser = parse_logic)]
        meta_logic: FilterLogic,
    },
    /// Inspect or change file metadata
    Meta {
        #[command(subcommand)]
        action: MetaAction,
    },
    /// Inspect or change group membership
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Show cache statistics
    Stats { cache: String },
    /// List all caches under the root
    Caches,
    /// Delete a cache and all its files
    Drop { cache: String },
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MetaAction {
    /// Show metadata of a file (one key or all)
    Get {
        cache: String,
        file: String,
        key: Option<String>,
    },
    /// Set metadata entries (key=value)
    Set {
        cache: String,
        file: String,
        #[arg(required = true, value_parser = parse_key_value)]
        entries: Vec<(String, String)>,
    },
    /// Remove metadata keys
    Unset {
        cache: String,
        file: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// List files that carry a key, optionally with a given value
    Find {
        cache: String,
        key: String,
        value: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupAction {
    /// List the members of a group
    Show { cache: String, group: String },
    /// Add a file to groups
    Add {
        cache: String,
        file: String,
        #[arg(required = true)]
        groups: Vec<String>,
    },
    /// Remove a file from groups
    Remove {
        cache: String,
        file: String,
        #[arg(required = true)]
        groups: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}

/// Parse a `key=value` pair; the value may itself contain `=`
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn parse_logic(s: &str) -> Result<FilterLogic, String> {
    s.parse::<FilterLogic>().map_err(|e| e.to_string())
}
