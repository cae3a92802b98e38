//! Simulated exchange for the instrument feed.
//!
//! This binary listens on a TCP port, upgrades every connection to a WebSocket and
//! echoes each text frame back to its sender. The instrument service relies on this
//! round trip: every synthetic move it sends comes back as an inbound update and only
//! then lands in its cache.
//!
//! Building blocks:
//! - `EchoServer` accepts connections and spawns one task per client.
//! - `handle_connection` performs the upgrade and reflects frames until the client
//!   closes or the socket fails. Binary frames are reflected as well, which makes the
//!   client's channel fail with an invalid-payload error.
//!
//! Shutdown: Ctrl+C stops accepting; in-flight connections are dropped with the runtime.
//!
//! Usage example (CLI):
//! ```bash
//! RUST_LOG=debug feed_server --host 0.0.0.0 --port 8090
//! ```
#![warn(missing_docs)]
use crate::echo::EchoServer;
use clap::Parser;
use feed_common::Result;
use feed_common::net::{ECHO_PORT, addr, ws_url};
use log::info;

mod echo;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Interface to bind the exchange to.
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port accepting WebSocket upgrades.
    #[clap(long, default_value_t = ECHO_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let server = EchoServer::new(&addr(args.host.trim(), args.port)).await?;
    info!("Clients connect to {}", ws_url(args.host.trim(), args.port));
    tokio::select! {
        served = server.serve() => served?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl+C received. Shutting down exchange...");
        }
    }
    Ok(())
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
