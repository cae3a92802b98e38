//! Service timing and synthetic market parameters.

use std::time::Duration;

/// Default period of the service tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);
/// Instruments picked as movers on every tick.
pub const DEFAULT_MOVER_COUNT: usize = 10;
/// Symmetric bound of a mover's percent change.
pub const DEFAULT_MOVER_VOLATILITY: f64 = 0.40;
/// Symmetric bound of every other instrument's percent change.
pub const DEFAULT_BASE_VOLATILITY: f64 = 0.03;

/// Parameters of the synthetic price generator.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    /// How many instruments move with `mover_volatility` per tick.
    pub mover_count: usize,
    /// Percent bound for movers, e.g. `0.40` for ±40%.
    pub mover_volatility: f64,
    /// Percent bound for the rest, e.g. `0.03` for ±3%.
    pub base_volatility: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            mover_count: DEFAULT_MOVER_COUNT,
            mover_volatility: DEFAULT_MOVER_VOLATILITY,
            base_volatility: DEFAULT_BASE_VOLATILITY,
        }
    }
}

/// Configuration of an `InstrumentService`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Period of the republish + synthesize tick. The first tick fires immediately.
    pub tick_interval: Duration,
    /// Synthetic market parameters.
    pub market: MarketConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            tick_interval: DEFAULT_TICK_INTERVAL,
            market: MarketConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Default configuration with a different tick period.
    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        ServiceConfig {
            tick_interval,
            ..ServiceConfig::default()
        }
    }
}
