// =============================================================================
// Aurora Chart — live OHLCV charting engine
// =============================================================================
//
// A candle store fed by a reconnecting Binance kline feed, with every enabled
// indicator recomputed over the full series on each change and published to
// the dashboard API.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod binance;
pub mod feed;
pub mod indicators;
pub mod market_data;
pub mod recompute;
pub mod runtime_config;
pub mod types;
