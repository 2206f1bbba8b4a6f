pub mod client;
pub mod kline_stream;

pub use client::BinanceClient;
pub use kline_stream::{BinanceKlineStream, BinanceKlineTransport};
