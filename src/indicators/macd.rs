// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD      = EMA(fast) - EMA(slow)
//   Signal    = EMA(MACD, signal), seeded with the mean of the first `signal`
//               defined MACD values
//   Histogram = MACD - Signal
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::ema::ema_values;
use super::{apply_from_first_defined, closes, zip_defined, IndicatorSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// The three MACD lines, each aligned with the candles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

/// Compute MACD, signal and histogram.
///
/// The MACD line starts where the slower EMA does (index
/// `max(fast, slow) - 1`); the signal line `signal - 1` bars after that.
/// Empty when any period is zero or the input is shorter than
/// `max(fast, slow)`.
pub fn calculate_macd(candles: &[Candle], params: &MacdParams) -> MacdSeries {
    let MacdParams { fast, slow, signal } = *params;
    if fast == 0 || slow == 0 || signal == 0 || candles.len() < fast.max(slow) {
        return MacdSeries::default();
    }

    let values = closes(candles);
    let fast_ema = ema_values(&values, fast);
    let slow_ema = ema_values(&values, slow);

    let macd = zip_defined(&fast_ema, &slow_ema, |f, s| f - s);
    let signal_line = apply_from_first_defined(&macd, |v| ema_values(v, signal));
    let histogram = zip_defined(&macd, &signal_line, |m, s| m - s);

    MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    }
}
