//! Source of seed instruments, descriptions and streamers.

use feed_common::{Catalog, Instrument};

use crate::streamer::InstrumentStreamer;

/// Reference data and channel factory consumed by `InstrumentService`.
pub trait InstrumentRepository: Send + Sync + 'static {
    /// Seed snapshot, read once when the service is built.
    fn instruments(&self) -> Vec<Instrument>;

    /// A new streamer over a new channel. Called once per streaming cycle.
    fn streamer(&self) -> InstrumentStreamer;

    /// Static description used to enrich inbound updates.
    fn description(&self, ticker: &str) -> Option<String>;
}

/// Repository backed by a `Catalog`, streaming to one WebSocket endpoint.
pub struct CatalogRepository {
    catalog: Catalog,
    endpoint: String,
}

impl CatalogRepository {
    /// Serves `catalog` and builds streamers against `endpoint`.
    pub fn new(catalog: Catalog, endpoint: impl Into<String>) -> Self {
        CatalogRepository {
            catalog,
            endpoint: endpoint.into(),
        }
    }

    /// Endpoint every streamer connects to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InstrumentRepository for CatalogRepository {
    fn instruments(&self) -> Vec<Instrument> {
        self.catalog.instruments().to_vec()
    }

    fn streamer(&self) -> InstrumentStreamer {
        InstrumentStreamer::connect_to(self.endpoint.as_str())
    }

    fn description(&self, ticker: &str) -> Option<String> {
        self.catalog.description(ticker).map(str::to_string)
    }
}
