//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shop API command-line client
#[derive(Parser, Debug)]
#[command(name = "shopapi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON). Without it, SHOPAPI_* environment
    /// variables are used.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Shop id to operate on (0 = none)
    #[arg(short, long, global = true, default_value = "0")]
    pub shop: u64,

    /// Extra query parameter as key=value (repeatable)
    #[arg(short, long = "query", global = true, value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,

    /// Print payloads as returned, without stripping nulls and empty values
    #[arg(long, global = true)]
    pub raw: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate and list the shops the credentials may access
    Token,

    /// Fetch a single resource
    Get {
        /// Resource path (e.g., /api/v1/customers/42)
        path: String,
    },

    /// Fetch a paginated collection
    List {
        /// Collection path (e.g., /api/v1/repair-orders)
        path: String,

        /// Maximum pages to fetch (defaults to the config value)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Stop once this many items are collected
        #[arg(long)]
        limit: Option<usize>,

        /// Items per page (defaults to the config value)
        #[arg(long)]
        page_size: Option<u32>,
    },
}

/// Parse a `key=value` pair
pub(crate) fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
