//! Feed Client — a terminal consumer of the instrument service. It seeds the service from
//! a catalog, streams synthetic price moves through the echo exchange and prints every
//! published snapshot to stdout.
//!
//! Usage example (CLI):
//! ```bash
//! feed_client --url ws://127.0.0.1:8090 --catalog ./stocks.txt --tick-ms 1000
//! feed_client --ticker NVDA
//! ```
//!
//! While running, type `pause`, `resume`, `retry` or `quit` (or `p`, `r`, `q`) followed by
//! Enter. `retry` re-subscribes after the stream ended or failed, which opens a fresh
//! connection to the exchange. Ctrl+C behaves like `quit`.
#![warn(missing_docs)]
mod args;
mod control;
mod view;

use crate::args::Args;
use crate::control::Control;
use chrono::Local;
use clap::Parser;
use feed_common::catalog::CatalogParser;
use feed_common::{Catalog, FeedError, Instrument, Result, StockError};
use feed_core::{
    CatalogRepository, InstrumentService, InstrumentSubscription, ServiceConfig, Subscription,
};
use log::{error, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the client is following.
enum Feed {
    Watchlist(Subscription),
    Details(InstrumentSubscription),
}

impl Feed {
    fn open(service: &InstrumentService, ticker: Option<&str>) -> Self {
        match ticker {
            Some(ticker) => {
                let subscription = service.get(&ticker.trim().to_uppercase());
                info!("Following {}", subscription.ticker());
                Feed::Details(subscription)
            }
            None => Feed::Watchlist(service.subscribe()),
        }
    }

    /// Next screen to print.
    async fn next(&mut self) -> Option<std::result::Result<Screen, StockError>> {
        match self {
            Feed::Watchlist(subscription) => subscription.next().await.map(|r| r.map(Screen::Watchlist)),
            Feed::Details(subscription) => subscription.next().await.map(|r| r.map(Screen::Details)),
        }
    }
}

enum Screen {
    Watchlist(Vec<Instrument>),
    Details(Instrument),
}

async fn next_screen(feed: &mut Option<Feed>) -> Option<std::result::Result<Screen, StockError>> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}

fn load_catalog(path: Option<&str>) -> Result<Catalog> {
    let Some(raw) = path else {
        return Ok(Catalog::builtin());
    };
    let file_path = normalize_path(raw);
    if !is_file_exist(&file_path) {
        return Err(FeedError::Format(format!(
            "catalog file {} does not exist",
            file_path.display()
        )));
    }
    let file = File::open(&file_path)?;
    let catalog = Catalog::parse_from_reader(BufReader::new(file))?;
    info!("Loaded {} instruments from {}", catalog.len(), file_path.display());
    Ok(catalog)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let catalog = load_catalog(args.catalog.as_deref())?;
    if catalog.is_empty() {
        return Err(FeedError::Format("catalog contains no instruments".into()));
    }
    let config = match args.tick_ms {
        Some(ms) => ServiceConfig::with_tick_interval(Duration::from_millis(ms.max(1))),
        None => ServiceConfig::default(),
    };
    let repository = Arc::new(CatalogRepository::new(catalog, args.url.trim()));
    let endpoint = repository.endpoint().to_string();
    let service = InstrumentService::new(repository, config);

    let (control_tx, mut controls) = mpsc::unbounded_channel();
    {
        let control_tx = control_tx.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            let _ = control_tx.send(Control::Quit);
        })
        .map_err(|e| FeedError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }
    control::spawn_reader(control_tx);

    info!("Streaming from {}. Type pause, resume, retry or quit.", endpoint);
    let mut feed = Some(Feed::open(&service, args.ticker.as_deref()));
    let mut connected = false;
    announce(&mut connected, true);
    let mut updating = service.is_updating();
    println!("{}", view::status(*updating.borrow_and_update(), &Local::now()));

    let outcome = loop {
        tokio::select! {
            screen = next_screen(&mut feed) => match screen {
                Some(Ok(Screen::Watchlist(snapshot))) => {
                    println!("{}", view::watchlist(&snapshot, &Local::now()));
                }
                Some(Ok(Screen::Details(instrument))) => {
                    println!("{}", view::details(&instrument, &Local::now()));
                }
                Some(Err(StockError::NotFound(ticker))) => {
                    error!("Instrument {} is not in the catalog", ticker);
                    break Err(StockError::NotFound(ticker).into());
                }
                Some(Err(err)) => {
                    println!("{}", view::failure(&err, &Local::now()));
                    announce(&mut connected, false);
                }
                None => {
                    announce(&mut connected, false);
                    info!("Stream ended. Type `retry` to re-subscribe or `quit` to exit.");
                    feed = None;
                }
            },
            changed = updating.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                println!("{}", view::status(*updating.borrow_and_update(), &Local::now()));
            },
            control = controls.recv() => match control {
                Some(Control::Pause) => service.pause(),
                Some(Control::Resume) => service.resume(),
                Some(Control::Retry) if feed.is_some() => {
                    warn!("Still streaming; `retry` only applies after the stream ended");
                }
                Some(Control::Retry) => {
                    info!("Re-subscribing to {}", endpoint);
                    feed = Some(Feed::open(&service, args.ticker.as_deref()));
                    announce(&mut connected, true);
                }
                Some(Control::Quit) | None => {
                    info!("Command {} received", Control::Quit);
                    break Ok(());
                }
            },
        }
    };

    if service.terminate() {
        info!("Service terminated");
    }
    outcome
}

/// Prints the connection banner when `now` differs from what was last shown.
fn announce(connected: &mut bool, now: bool) {
    if *connected != now {
        *connected = now;
        println!("{}", view::connection(now, &Local::now()));
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &Path) -> bool {
    path.exists() && path.is_file()
}
