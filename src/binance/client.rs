// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unauthenticated endpoints are used: the chart needs historical klines
// and nothing account-related, so no API key is sent.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::feed::SnapshotSource;
use crate::market_data::{parse_rest_klines, Candle, CandleKey};

/// Binance serves at most this many klines per request.
pub const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Binance REST API client.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client for `base_url` (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// `limit` is clamped to `1..=1000`, the range the endpoint accepts.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = klines_url(&self.base_url, symbol, interval, limit);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let candles = parse_rest_klines(&body)?;
        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

impl SnapshotSource for BinanceClient {
    async fn fetch_snapshot(&self, key: &CandleKey, limit: usize) -> Result<Vec<Candle>> {
        self.get_klines(&key.symbol, key.timeframe.as_str(), limit).await
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn klines_url(base_url: &str, symbol: &str, interval: &str, limit: usize) -> String {
    let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);
    format!(
        "{}/api/v3/klines?symbol={}&interval={}&limit={}",
        base_url,
        symbol.to_uppercase(),
        interval,
        limit
    )
}
