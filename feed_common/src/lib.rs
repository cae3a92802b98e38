//!
//! Common types and utilities shared by the feed exchange, the streaming core and the client.
//!
//! This crate aggregates:
//! - `error` — the channel/stream/stock error taxonomy and the unified `FeedError`.
//! - `result` — handy `Result<T, FeedError>` alias.
//! - `instrument` — the `Instrument` domain value and its `PriceChange` direction.
//! - `wire` — the JSON message exchanged over the duplex channel.
//! - `catalog` — seed instruments, descriptions and the catalog file parser.
//! - `net` — networking constants and small helpers.
#![warn(missing_docs)]
pub mod catalog;
pub mod error;
pub mod instrument;
pub mod net;
pub mod result;
pub mod wire;

pub use catalog::Catalog;
pub use error::{ChannelError, FeedError, StockError, StreamError};
pub use instrument::{Instrument, PriceChange};
pub use result::Result;
pub use wire::{InstrumentMessage, PriceChangeDto};
