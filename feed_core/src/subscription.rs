//! Subscriber handles over the shared snapshot broadcast.
//!
//! The broadcast is a `watch` channel: it only ever holds the latest publication, so a
//! slow subscriber never holds up the service, it just skips to the newest snapshot.
//! The snapshot current at subscribe time is captured up front, so it is delivered
//! first even when a failure replaces it on the broadcast before the first read.

use feed_common::{Instrument, StockError};
use tokio::sync::watch;

/// Value carried by the snapshot broadcast.
#[derive(Debug, Clone)]
pub(crate) enum Publication {
    /// Full instrument set, highest price first.
    Snapshot(Vec<Instrument>),
    /// The streaming cycle stopped cleanly.
    Finished,
    /// The streaming cycle died.
    Failed(StockError),
}

/// One consumer's live view of the instrument set.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Publication>,
    first: Option<Vec<Instrument>>,
    done: bool,
}

impl Subscription {
    pub(crate) fn new(mut rx: watch::Receiver<Publication>) -> Self {
        let first = match &*rx.borrow_and_update() {
            Publication::Snapshot(snapshot) => Some(snapshot.clone()),
            Publication::Finished | Publication::Failed(_) => None,
        };
        if first.is_none() {
            // Joined a cycle that already ended; report how it ended.
            rx.mark_changed();
        }
        Subscription {
            rx,
            first,
            done: false,
        }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `Some(Ok(_))` for each snapshot, `Some(Err(_))` once if the cycle failed,
    /// and `None` after a clean finish or after the error.
    pub async fn next(&mut self) -> Option<Result<Vec<Instrument>, StockError>> {
        if self.done {
            return None;
        }
        if let Some(snapshot) = self.first.take() {
            return Some(Ok(snapshot));
        }
        if self.rx.changed().await.is_err() {
            self.done = true;
            return None;
        }

        let publication = self.rx.borrow_and_update().clone();
        match publication {
            Publication::Snapshot(snapshot) => Some(Ok(snapshot)),
            Publication::Finished => {
                self.done = true;
                None
            }
            Publication::Failed(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    /// Whether a snapshot newer than the last one returned is waiting.
    pub fn has_pending(&self) -> bool {
        !self.done && (self.first.is_some() || self.rx.has_changed().unwrap_or(false))
    }

    /// Narrows this subscription to one ticker.
    pub fn for_ticker(self, ticker: impl Into<String>) -> InstrumentSubscription {
        InstrumentSubscription {
            inner: self,
            ticker: ticker.into(),
            done: false,
        }
    }
}

/// Live view of a single instrument.
#[derive(Debug)]
pub struct InstrumentSubscription {
    inner: Subscription,
    ticker: String,
    done: bool,
}

impl InstrumentSubscription {
    /// Ticker being followed.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Waits for the instrument's next state.
    ///
    /// If a snapshot does not contain the ticker, yields `NotFound` once and ends. The
    /// shared broadcast is not affected.
    pub async fn next(&mut self) -> Option<Result<Instrument, StockError>> {
        if self.done {
            return None;
        }
        let item = match self.inner.next().await {
            Some(Ok(snapshot)) => snapshot
                .into_iter()
                .find(|instrument| instrument.ticker == self.ticker)
                .ok_or_else(|| StockError::NotFound(self.ticker.clone())),
            Some(Err(err)) => Err(err),
            None => {
                self.done = true;
                return None;
            }
        };
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
