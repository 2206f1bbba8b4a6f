// =============================================================================
// Volume-weighted indicators: OBV, ADL, VWAP
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::IndicatorSeries;

/// On-Balance Volume.
///
/// Starts at the first bar's volume, then adds the bar's volume on an up
/// close, subtracts it on a down close and carries on an unchanged close.
pub fn calculate_obv(candles: &[Candle]) -> IndicatorSeries {
    let Some(first) = candles.first() else {
        return Vec::new();
    };

    let mut obv = first.volume;
    let mut out = Vec::with_capacity(candles.len());
    out.push(Some(obv));

    for pair in candles.windows(2) {
        let (prev, bar) = (&pair[0], &pair[1]);
        if bar.close > prev.close {
            obv += bar.volume;
        } else if bar.close < prev.close {
            obv -= bar.volume;
        }
        out.push(Some(obv));
    }
    out
}

/// Accumulation/Distribution Line.
///
/// Cumulative sum of `((close - low) - (high - close)) / (high - low) * volume`.
/// A zero-range bar contributes nothing.
pub fn calculate_adl(candles: &[Candle]) -> IndicatorSeries {
    let mut adl = 0.0;
    candles
        .iter()
        .map(|bar| {
            let range = bar.high - bar.low;
            if range > 0.0 {
                let mfm = ((bar.close - bar.low) - (bar.high - bar.close)) / range;
                adl += mfm * bar.volume;
            }
            Some(adl)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VwapParams {
    /// Open time (unix seconds) to start accumulating from. `None` anchors
    /// at the first candle.
    #[serde(default)]
    pub anchor: Option<i64>,
}

/// Volume-weighted average price over typical price `(H + L + C) / 3`.
///
/// Bars before the anchor are undefined, as is any bar where the cumulative
/// volume is still zero.
pub fn calculate_vwap(candles: &[Candle], params: &VwapParams) -> IndicatorSeries {
    let mut pv = 0.0;
    let mut vol = 0.0;

    candles
        .iter()
        .map(|bar| {
            if params.anchor.is_some_and(|anchor| bar.time < anchor) {
                return None;
            }
            pv += bar.typical_price() * bar.volume;
            vol += bar.volume;
            (vol > 0.0).then(|| pv / vol)
        })
        .collect()
}
