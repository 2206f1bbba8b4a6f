// =============================================================================
// SuperTrend
// =============================================================================
//
// Built on ATR and the bar midpoint hl2 = (high + low) / 2:
//
//   basic_upper = hl2 + multiplier * ATR
//   basic_lower = hl2 - multiplier * ATR
//
// The final bands ratchet toward price. The upper band only tightens (moves
// down) unless the previous close broke above it; the lower band only rises
// unless the previous close broke below it. The trend line rides one band
// and flips to the other when the close crosses the band it is riding.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::atr::calculate_atr;
use super::IndicatorSeries;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperTrendParams {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for SuperTrendParams {
    fn default() -> Self {
        Self {
            period: 10,
            multiplier: 3.0,
        }
    }
}

/// SuperTrend output lines, aligned with the candles.
///
/// `direction` is +1.0 while the trend rides the lower band (uptrend) and
/// -1.0 while it rides the upper band (downtrend).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuperTrendSeries {
    pub trend: IndicatorSeries,
    pub upper: IndicatorSeries,
    pub lower: IndicatorSeries,
    pub direction: IndicatorSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// Compute SuperTrend.
///
/// The first `period` bars are undefined; the first value sits where ATR
/// does. Empty when `period` is zero or there are fewer than `period + 1`
/// candles.
pub fn calculate_supertrend(candles: &[Candle], params: &SuperTrendParams) -> SuperTrendSeries {
    let period = params.period;
    let atr = calculate_atr(candles, period);
    if atr.is_empty() {
        return SuperTrendSeries::default();
    }

    let mut out = SuperTrendSeries {
        trend: vec![None; period],
        upper: vec![None; period],
        lower: vec![None; period],
        direction: vec![None; period],
    };

    // Bands stay uninitialised until the first real computation; there is
    // no numeric default to compare against on the first bar.
    let mut bands: Option<(f64, f64)> = None;
    let mut direction: Option<Direction> = None;

    for i in period..candles.len() {
        let Some(atr_i) = atr[i] else { continue };
        let bar = &candles[i];
        let basic_upper = bar.hl2() + params.multiplier * atr_i;
        let basic_lower = bar.hl2() - params.multiplier * atr_i;
        if !(basic_upper.is_finite() && basic_lower.is_finite()) {
            out.trend.push(None);
            out.upper.push(None);
            out.lower.push(None);
            out.direction.push(None);
            continue;
        }

        let (final_upper, final_lower) = match bands {
            None => (basic_upper, basic_lower),
            Some((prev_upper, prev_lower)) => {
                let prev_close = candles[i - 1].close;
                let upper = if basic_upper < prev_upper || prev_close > prev_upper {
                    basic_upper
                } else {
                    prev_upper
                };
                let lower = if basic_lower > prev_lower || prev_close < prev_lower {
                    basic_lower
                } else {
                    prev_lower
                };
                (upper, lower)
            }
        };
        bands = Some((final_upper, final_lower));

        let next = match direction {
            None if bar.close <= final_upper => Direction::Down,
            None => Direction::Up,
            Some(Direction::Down) if bar.close > final_upper => Direction::Up,
            Some(Direction::Up) if bar.close < final_lower => Direction::Down,
            Some(current) => current,
        };
        direction = Some(next);

        let (value, sign) = match next {
            Direction::Up => (final_lower, 1.0),
            Direction::Down => (final_upper, -1.0),
        };
        out.trend.push(Some(value));
        out.upper.push(Some(final_upper));
        out.lower.push(Some(final_lower));
        out.direction.push(Some(sign));
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::approx;

    fn bar(i: usize, close: f64) -> Candle {
        Candle::new(i as i64 * 60, close, close + 2.0, close - 2.0, close, 10.0)
    }

    fn rising(n: usize) -> Vec<Candle> {
        (0..n).map(|i| bar(i, 100.0 + i as f64 * 3.0)).collect()
    }

    fn falling(n: usize) -> Vec<Candle> {
        (0..n).map(|i| bar(i, 400.0 - i as f64 * 3.0)).collect()
    }

    #[test]
    fn supertrend_warm_up_matches_period() {
        let out = calculate_supertrend(&rising(30), &SuperTrendParams::default());
        assert_eq!(out.trend.len(), 30);
        assert!(out.trend[..10].iter().all(Option::is_none));
        assert!(out.trend[10..].iter().all(Option::is_some));
    }

    #[test]
    fn overflowing_multiplier_leaves_bars_undefined() {
        let params = SuperTrendParams {
            period: 5,
            multiplier: 1e308,
        };
        let out = calculate_supertrend(&rising(20), &params);
        assert_eq!(out.trend.len(), 20);
        for series in [&out.trend, &out.upper, &out.lower, &out.direction] {
            assert!(series.iter().all(Option::is_none));
        }
    }

    #[test]
    fn supertrend_insufficient_data() {
        let out = calculate_supertrend(&rising(10), &SuperTrendParams::default());
        assert!(out.trend.is_empty());
        let out = calculate_supertrend(&rising(30), &SuperTrendParams { period: 0, multiplier: 3.0 });
        assert!(out.trend.is_empty());
    }

    #[test]
    fn first_bands_are_the_basic_bands() {
        let candles = rising(20);
        let params = SuperTrendParams { period: 5, multiplier: 2.0 };
        let out = calculate_supertrend(&candles, &params);
        let atr = calculate_atr(&candles, 5)[5].unwrap();
        assert!(approx(out.upper[5].unwrap(), candles[5].hl2() + 2.0 * atr));
        assert!(approx(out.lower[5].unwrap(), candles[5].hl2() - 2.0 * atr));
    }

    #[test]
    fn lower_band_ratchets_up_in_uptrend() {
        let out = calculate_supertrend(&rising(40), &SuperTrendParams::default());
        let lowers: Vec<f64> = out.lower.iter().flatten().copied().collect();
        assert!(lowers.windows(2).all(|w| w[1] >= w[0]));
        // A steady rise ends up riding the lower band.
        assert_eq!(*out.direction.last().unwrap(), Some(1.0));
        assert_eq!(out.trend.last().unwrap(), out.lower.last().unwrap());
    }

    #[test]
    fn upper_band_ratchets_down_in_downtrend() {
        let out = calculate_supertrend(&falling(40), &SuperTrendParams::default());
        let uppers: Vec<f64> = out.upper.iter().flatten().copied().collect();
        assert!(uppers.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*out.direction.last().unwrap(), Some(-1.0));
        assert_eq!(out.trend.last().unwrap(), out.upper.last().unwrap());
    }

    #[test]
    fn trend_flips_when_price_crosses_active_band() {
        // Fall for a while, then rip higher: the trend must flip from the
        // upper band to the lower band.
        let mut candles = falling(30);
        let base = candles.last().unwrap().close;
        for j in 1..=15 {
            candles.push(bar(29 + j, base + j as f64 * 15.0));
        }
        let out = calculate_supertrend(&candles, &SuperTrendParams::default());
        let dirs: Vec<f64> = out.direction.iter().flatten().copied().collect();
        assert_eq!(dirs.first(), Some(&-1.0));
        assert_eq!(dirs.last(), Some(&1.0));
        let flips = dirs.windows(2).filter(|w| w[0] != w[1]).count();
        assert!(flips >= 1);
    }
}
