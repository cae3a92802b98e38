//! Wire format exchanged over the duplex channel.
//!
//! Every instrument event travels as a single JSON text frame:
//!
//! ```json
//! {"ticker":"AAPL","name":"Apple Inc.","price":189.95,"priceChange":"increased"}
//! ```
//!
//! The description is a local enrichment and is never part of the message.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price direction as spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceChangeDto {
    /// Price went up.
    Increased,
    /// Price went down.
    Decreased,
    /// Price did not move.
    Unchanged,
}

/// One instrument event on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentMessage {
    /// Unique symbol.
    pub ticker: String,
    /// Display name.
    pub name: String,
    /// Price, carried as a JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Direction of the move that produced `price`.
    pub price_change: PriceChangeDto,
}
