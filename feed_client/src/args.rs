//! Command-line arguments for the feed client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use feed_common::net::DEFAULT_ENDPOINT;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// WebSocket URL of the echo exchange.
    #[clap(long, default_value = DEFAULT_ENDPOINT)]
    pub url: String,

    /// Path to a catalog file (`TICKER|Name|price|description` per line).
    /// The built-in stock list is used when omitted.
    #[clap(long)]
    pub catalog: Option<String>,

    /// Follow a single instrument instead of the whole watchlist.
    #[clap(long)]
    pub ticker: Option<String>,

    /// Tick period in milliseconds.
    #[clap(long)]
    pub tick_ms: Option<u64>,
}
