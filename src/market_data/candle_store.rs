use std::collections::VecDeque;

use thiserror::Error;
use tracing::debug;

use super::candle::Candle;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a store mutation was refused. The series is untouched in every case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("snapshot not strictly ascending at index {index}: {time} follows {previous}")]
    NotAscending {
        index: usize,
        previous: i64,
        time: i64,
    },
    #[error("out-of-order update: time {time} is before the last candle at {last}")]
    OutOfOrder { time: i64, last: i64 },
    #[error("invalid candle at {time}: {reason}")]
    InvalidCandle { time: i64, reason: &'static str },
}

/// What a successful [`CandleStore::apply_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// The still-open last bar was refreshed in place.
    Replaced,
    /// A new bar was appended.
    Appended,
}

/// Receives the full series after every successful store mutation.
///
/// Observers only ever see a shared slice; they cannot mutate the series.
pub trait CandleObserver: Send {
    fn on_candles_changed(&mut self, candles: &[Candle]);
}

// ---------------------------------------------------------------------------
// CandleStore -- authoritative series for one (symbol, timeframe)
// ---------------------------------------------------------------------------

/// Bounded, strictly ascending candle series with exactly-once observer
/// notification.
///
/// The last candle is the still-forming bar and may be replaced in place;
/// every earlier candle is immutable. Once the series grows past
/// `max_candles` the oldest bars are evicted from the front.
pub struct CandleStore {
    candles: VecDeque<Candle>,
    max_candles: usize,
    observers: Vec<Box<dyn CandleObserver>>,
}

impl CandleStore {
    /// Create an empty store that retains at most `max_candles` bars
    /// (at least one).
    pub fn new(max_candles: usize) -> Self {
        let max_candles = max_candles.max(1);
        Self {
            candles: VecDeque::with_capacity(max_candles + 1),
            max_candles,
            observers: Vec::new(),
        }
    }

    /// Register an observer. It is notified after every successful mutation.
    pub fn subscribe(&mut self, observer: Box<dyn CandleObserver>) {
        self.observers.push(observer);
    }

    /// Replace the series wholesale with `snapshot`.
    ///
    /// The snapshot must be strictly ascending by time and every candle must
    /// satisfy the OHLCV invariants; otherwise nothing changes and the
    /// offending position is reported.
    pub fn initialize(&mut self, snapshot: Vec<Candle>) -> Result<(), StoreError> {
        for (index, candle) in snapshot.iter().enumerate() {
            candle.validate().map_err(|reason| StoreError::InvalidCandle {
                time: candle.time,
                reason,
            })?;
            if index > 0 {
                let previous = snapshot[index - 1].time;
                if candle.time <= previous {
                    return Err(StoreError::NotAscending {
                        index,
                        previous,
                        time: candle.time,
                    });
                }
            }
        }

        self.candles = VecDeque::from(snapshot);
        self.evict();
        debug!(count = self.candles.len(), "candle store initialized");
        self.notify();
        Ok(())
    }

    /// Merge one push update into the series.
    ///
    /// * same time as the last bar: the last bar is replaced
    /// * later than the last bar: appended
    /// * earlier than the last bar: rejected as out-of-order
    pub fn apply_update(&mut self, candle: Candle) -> Result<UpdateKind, StoreError> {
        candle.validate().map_err(|reason| StoreError::InvalidCandle {
            time: candle.time,
            reason,
        })?;

        let kind = match self.candles.back_mut() {
            Some(last) if candle.time == last.time => {
                *last = candle;
                UpdateKind::Replaced
            }
            Some(last) if candle.time < last.time => {
                return Err(StoreError::OutOfOrder {
                    time: candle.time,
                    last: last.time,
                });
            }
            _ => {
                self.candles.push_back(candle);
                UpdateKind::Appended
            }
        };

        self.evict();
        self.notify();
        Ok(kind)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Independent copy of the current series, oldest first.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    fn evict(&mut self) {
        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }
    }

    fn notify(&mut self) {
        let Self {
            candles, observers, ..
        } = self;
        let view: &[Candle] = candles.make_contiguous();
        for observer in observers.iter_mut() {
            observer.on_candles_changed(view);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
