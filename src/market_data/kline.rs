// =============================================================================
// Kline parsing -- REST snapshot rows and push-stream messages
// =============================================================================
//
// Binance reports open times in milliseconds and prices/volumes as JSON
// strings. Both are normalised here: times become seconds, numeric fields
// become `f64` whether they arrive as strings or numbers.
// =============================================================================

use anyhow::{Context, Result};
use tracing::warn;

use super::candle::Candle;

/// One decoded push message from the kline stream.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineUpdate {
    pub symbol: String,
    pub interval: String,
    pub candle: Candle,
    /// Whether the exchange has closed the bar. The store treats open and
    /// closed bars alike; only the presentation layer cares.
    pub is_closed: bool,
}

/// Parse a kline push message.
///
/// Accepts both the single-stream shape
/// ```json
/// { "e": "kline", "s": "BTCUSDT", "k": { ... } }
/// ```
/// and the combined-stream envelope `{ "stream": ..., "data": { ... } }`.
pub fn parse_kline_message(text: &str) -> Result<KlineUpdate> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let k = data.get("k").context("missing field k")?;

    let symbol = data["s"]
        .as_str()
        .or_else(|| k["s"].as_str())
        .context("missing field s")?
        .to_uppercase();
    let interval = k["i"].as_str().context("missing field k.i")?.to_string();

    let open_time_ms = k["t"].as_i64().context("missing field k.t")?;
    let candle = Candle {
        time: open_time_ms / 1000,
        open: parse_f64(&k["o"], "k.o")?,
        high: parse_f64(&k["h"], "k.h")?,
        low: parse_f64(&k["l"], "k.l")?,
        close: parse_f64(&k["c"], "k.c")?,
        volume: parse_f64(&k["v"], "k.v")?,
    };
    let is_closed = k["x"].as_bool().context("missing field k.x")?;

    Ok(KlineUpdate {
        symbol,
        interval,
        candle,
        is_closed,
    })
}

/// Parse the array-of-arrays body returned by `GET /api/v3/klines`.
///
/// Row indices:
///   [0] openTime (ms), [1] open, [2] high, [3] low, [4] close, [5] volume
///
/// Rows shorter than six elements are skipped with a warning; a row whose
/// numeric fields cannot be parsed fails the whole snapshot.
pub fn parse_rest_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let rows = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let arr = row.as_array().context("kline entry is not an array")?;
        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time_ms = arr[0].as_i64().context("kline open time is not an integer")?;
        candles.push(Candle {
            time: open_time_ms / 1000,
            open: parse_f64(&arr[1], "open")?,
            high: parse_f64(&arr[2], "high")?,
            low: parse_f64(&arr[3], "low")?,
            close: parse_f64(&arr[4], "close")?,
            volume: parse_f64(&arr[5], "volume")?,
        });
    }

    Ok(candles)
}

/// Binance sends numeric values as JSON strings inside kline objects.
fn parse_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}
