//! Plain-text rendering of snapshots and status lines.
use chrono::{DateTime, Local};
use feed_common::{Instrument, StockError};
use rust_decimal::Decimal;

fn stamp(at: &DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Price rounded to cents, always with two decimals.
pub fn price(value: Decimal) -> String {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Watchlist table, one row per instrument in the order given.
pub fn watchlist(snapshot: &[Instrument], at: &DateTime<Local>) -> String {
    let mut out = format!("[{}] {} instruments\n", stamp(at), snapshot.len());
    out.push_str(&format!("{:<6} {:<32} {:>12}\n", "TICKER", "NAME", "PRICE"));
    for instrument in snapshot {
        out.push_str(&format!(
            "{:<6} {:<32} {:>12} {}\n",
            instrument.ticker,
            instrument.name,
            price(instrument.price),
            instrument.price_change.arrow()
        ));
    }
    out
}

/// Details card for one instrument.
pub fn details(instrument: &Instrument, at: &DateTime<Local>) -> String {
    let mut out = format!("[{}] {} {}\n", stamp(at), instrument.ticker, instrument.name);
    out.push_str(&format!(
        "  price: {} {} {}\n",
        price(instrument.price),
        instrument.price_change.arrow(),
        instrument.price_change
    ));
    if let Some(description) = &instrument.description {
        out.push_str(&format!("  {}\n", description));
    }
    out
}

/// LIVE/PAUSED banner.
pub fn status(updating: bool, at: &DateTime<Local>) -> String {
    let label = if updating { "LIVE" } else { "PAUSED" };
    format!("[{}] {}", stamp(at), label)
}

/// CONNECTED/DISCONNECTED banner, printed when a feed opens or ends.
pub fn connection(connected: bool, at: &DateTime<Local>) -> String {
    let label = if connected { "CONNECTED" } else { "DISCONNECTED" };
    format!("[{}] {}", stamp(at), label)
}

/// Terminal stream failure with a hint on how to recover.
pub fn failure(err: &StockError, at: &DateTime<Local>) -> String {
    format!(
        "[{}] stream failed: {}\n  type `retry` to reconnect or `quit` to exit",
        stamp(at),
        err
    )
}
