//! Synthetic price movement.
//!
//! Every tick a fresh set of movers is drawn without replacement. Each instrument gets a
//! percent change drawn uniformly from `[-v, +v]`, where `v` is the mover or base
//! volatility, and is repriced to `price + price * change`.
//!
//! The results are proposals: they are sent to the exchange and only land in the cache
//! when the echo comes back.

use std::collections::HashSet;

use feed_common::{Instrument, PriceChange};
use rand::Rng;
use rand::seq::index;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::config::MarketConfig;

/// Picks `count` distinct tickers uniformly at random, or all of them if there are fewer.
pub fn pick_movers<'a, R>(instruments: &'a [Instrument], count: usize, rng: &mut R) -> HashSet<&'a str>
where
    R: Rng,
{
    let amount = count.min(instruments.len());
    index::sample(rng, instruments.len(), amount)
        .into_iter()
        .map(|i| instruments[i].ticker.as_str())
        .collect()
}

/// Applies a percent change to `instrument`.
pub fn apply_change(instrument: &Instrument, percent: f64) -> Instrument {
    let factor = Decimal::from_f64(percent).unwrap_or_default();
    let price = instrument.price + instrument.price * factor;
    instrument.repriced(price, PriceChange::from_percent(percent))
}

/// Computes the next proposed move for every instrument.
pub fn next_moves<R>(instruments: &[Instrument], config: &MarketConfig, rng: &mut R) -> Vec<Instrument>
where
    R: Rng,
{
    let movers = pick_movers(instruments, config.mover_count, rng);

    instruments
        .iter()
        .map(|instrument| {
            let volatility = if movers.contains(instrument.ticker.as_str()) {
                config.mover_volatility
            } else {
                config.base_volatility
            };
            let percent = if volatility > 0.0 {
                rng.random_range(-volatility..=volatility)
            } else {
                0.0
            };
            apply_change(instrument, percent)
        })
        .collect()
}
