// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the population standard deviation
// of the closes in the trailing window.

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::{closes, finite, IndicatorSeries};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerParams {
    pub period: usize,
    pub std_dev: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev: 2.0,
        }
    }
}

/// Upper, middle and lower bands aligned with the candles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerSeries {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

/// Calculate Bollinger Bands over `close`.
///
/// - `middle` = SMA(period)
/// - `upper`  = middle + `std_dev` * σ
/// - `lower`  = middle - `std_dev` * σ
///
/// Empty when `period == 0` or fewer than `period` candles. A band that
/// overflows `f64` is undefined for that bar.
pub fn calculate_bollinger(candles: &[Candle], params: &BollingerParams) -> BollingerSeries {
    let period = params.period;
    if period == 0 || candles.len() < period {
        return BollingerSeries::default();
    }

    let values = closes(candles);
    let warm_up = period - 1;
    let mut out = BollingerSeries {
        upper: vec![None; warm_up],
        middle: vec![None; warm_up],
        lower: vec![None; warm_up],
    };

    for window in values.windows(period) {
        let middle = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
        let band = params.std_dev * variance.sqrt();

        out.upper.push(finite(middle + band));
        out.middle.push(Some(middle));
        out.lower.push(finite(middle - band));
    }

    out
}
