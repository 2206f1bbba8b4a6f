// =============================================================================
// Live feed: snapshot + push stream with bounded linear-backoff reconnects
// =============================================================================
//
// The feed is split into the state machine (`manager`), the caller-owned
// session value and its command/status plumbing (`session`), and the two
// I/O collaborators it drives, abstracted below so the state machine can be
// exercised against scripted in-memory implementations.
// =============================================================================

pub mod manager;
pub mod session;

use std::future::Future;

use anyhow::Result;

use crate::market_data::{Candle, CandleKey};

pub use manager::{backoff_delay, FeedError, FeedManager, FeedSettings};
pub use session::{FeedCommand, FeedController, FeedSession, FeedStatus};

/// Source of the historical bars loaded before going live.
pub trait SnapshotSource: Send + Sync {
    /// Up to `limit` most recent bars for `key`, oldest first.
    fn fetch_snapshot(
        &self,
        key: &CandleKey,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

/// Opens a push stream of kline messages for one series.
pub trait PushTransport: Send + Sync {
    type Stream: KlineStream;

    fn open(&self, key: &CandleKey) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// An open push stream.
pub trait KlineStream: Send {
    /// Next text payload. `None` means the remote side closed the stream.
    fn next_message(&mut self) -> impl Future<Output = Option<Result<String>>> + Send;

    /// Close the stream on our side.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
