// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = (close_t - EMA_{t-1}) * multiplier + EMA_{t-1}
//
// The very first EMA value, at index `period - 1`, is seeded with the SMA of
// the first `period` closes.
// =============================================================================

use crate::market_data::Candle;

use super::{closes, IndicatorSeries};

/// Compute the EMA of `close` aligned with `candles`.
///
/// # Edge cases
/// - `period == 0` => empty (division by zero guard)
/// - `candles.len() < period` => empty
pub fn calculate_ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    ema_values(&closes(candles), period)
}

pub(crate) fn ema_values(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = vec![None; period - 1];
    result.reserve(values.len() - period + 1);
    result.push(Some(seed));

    let mut prev = seed;
    for &value in &values[period..] {
        prev = (value - prev) * multiplier + prev;
        result.push(Some(prev));
    }

    result
}
