//! Instrument domain model.
//!
//! An `Instrument` is an immutable value: an update produces a new value that replaces
//! the previous one in the service cache, it is never mutated in place.

use rust_decimal::Decimal;
use strum_macros::{Display, EnumString};

/// Direction of the last price move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PriceChange {
    /// Price went up.
    Increased,
    /// Price went down.
    Decreased,
    /// Price did not move.
    #[default]
    Unchanged,
}

impl PriceChange {
    /// Direction implied by a signed percent change.
    pub fn from_percent(percent: f64) -> Self {
        if percent > 0.0 {
            PriceChange::Increased
        } else if percent < 0.0 {
            PriceChange::Decreased
        } else {
            PriceChange::Unchanged
        }
    }

    /// Display glyph for the direction. Every presentation layer goes through here.
    pub fn arrow(self) -> &'static str {
        match self {
            PriceChange::Increased => "▲",
            PriceChange::Decreased => "▼",
            PriceChange::Unchanged => "•",
        }
    }
}

/// Current state of a tradable symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Unique symbol, e.g. `AAPL`.
    pub ticker: String,
    /// Display name.
    pub name: String,
    /// Last confirmed price.
    pub price: Decimal,
    /// Direction of the last move.
    pub price_change: PriceChange,
    /// Local enrichment from the catalog; never sent over the wire.
    pub description: Option<String>,
}

impl Instrument {
    /// Creates an instrument with an `Unchanged` direction and no description.
    pub fn new(ticker: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Instrument {
            ticker: ticker.into(),
            name: name.into(),
            price,
            price_change: PriceChange::Unchanged,
            description: None,
        }
    }

    /// Returns a copy carrying `description`.
    pub fn with_description(self, description: Option<String>) -> Self {
        Instrument {
            description,
            ..self
        }
    }

    /// Returns a copy moved to `price` in direction `price_change`.
    pub fn repriced(&self, price: Decimal, price_change: PriceChange) -> Self {
        Instrument {
            price,
            price_change,
            ..self.clone()
        }
    }
}

/// Sorts instruments by price, highest first. Equal prices fall back to ticker order.
pub fn sort_by_price_desc(instruments: &mut [Instrument]) {
    instruments.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.ticker.cmp(&b.ticker)));
}
