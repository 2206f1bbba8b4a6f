pub mod candle;
pub mod candle_store;
pub mod kline;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, CandleKey};
pub use candle_store::{CandleObserver, CandleStore, StoreError, UpdateKind};
pub use kline::{parse_kline_message, parse_rest_klines, KlineUpdate};
