//! Shared networking constants and helpers used by the exchange and the client.

/// TCP port the simulated exchange listens on for WebSocket upgrades.
pub const ECHO_PORT: u16 = 8090;
/// Endpoint the client connects to when no `--url` is given.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8090";

/// Helper to format a host with a port like "host:port".
pub fn addr(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

/// Helper to build a plain `ws://host:port` endpoint URL.
pub fn ws_url(host: &str, port: u16) -> String {
    format!("ws://{}", addr(host, port))
}
