// =============================================================================
// Simple, Weighted and Hull Moving Averages
// =============================================================================
//
//   SMA_t = mean(close_{t-p+1..=t})
//   WMA_t = Σ w_j * close_j / Σ w_j,   weights 1..=p oldest -> newest
//   HMA   = WMA(2 * WMA(p/2) - WMA(p), sqrt(p))   (floors for half and sqrt)
// =============================================================================

use crate::market_data::Candle;

use super::{apply_from_first_defined, closes, zip_defined, IndicatorSeries};

/// Arithmetic mean of `close` over the trailing `period` bars.
///
/// The first `period - 1` entries are undefined. Empty when `period == 0` or
/// the input is shorter than `period`.
pub fn calculate_sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    sma_values(&closes(candles), period)
}

/// Linearly weighted mean over the trailing `period` bars, newest bar
/// weighted heaviest.
pub fn calculate_wma(candles: &[Candle], period: usize) -> IndicatorSeries {
    wma_values(&closes(candles), period)
}

/// Hull Moving Average.
///
/// Needs `period >= 2` (so the half period is non-zero) and at least
/// `period + floor(sqrt(period)) - 1` candles; the first defined value sits
/// at that index minus one.
pub fn calculate_hma(candles: &[Candle], period: usize) -> IndicatorSeries {
    let half = period / 2;
    let root = (period as f64).sqrt().floor() as usize;
    if half == 0 || root == 0 {
        return Vec::new();
    }
    let min_len = period.checked_add(root - 1);
    if min_len.map_or(true, |n| candles.len() < n) {
        return Vec::new();
    }

    let values = closes(candles);
    let wma_half = wma_values(&values, half);
    let wma_full = wma_values(&values, period);
    let raw = zip_defined(&wma_half, &wma_full, |h, f| 2.0 * h - f);

    apply_from_first_defined(&raw, |v| wma_values(v, root))
}

pub(crate) fn sma_values(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut result = vec![None; period - 1];
    result.extend(
        values
            .windows(period)
            .map(|w| Some(w.iter().sum::<f64>() / period as f64)),
    );
    result
}

pub(crate) fn wma_values(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let weight_sum = (period * (period + 1)) as f64 / 2.0;
    let mut result = vec![None; period - 1];
    result.extend(values.windows(period).map(|w| {
        let weighted: f64 = w
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        Some(weighted / weight_sum)
    }));
    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::{approx, from_closes};

    fn ascending(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        from_closes(&closes)
    }

    // ---- SMA -------------------------------------------------------------

    #[test]
    fn sma_warm_up_and_first_value() {
        for period in 1..=10 {
            let candles = ascending(25);
            let sma = calculate_sma(&candles, period);
            assert_eq!(sma.len(), 25);
            assert!(sma[..period - 1].iter().all(Option::is_none));
            let expected = (1..=period).sum::<usize>() as f64 / period as f64;
            assert!(approx(sma[period - 1].unwrap(), expected));
        }
    }

    #[test]
    fn sma_insufficient_data_is_empty() {
        assert!(calculate_sma(&ascending(4), 5).is_empty());
        assert!(calculate_sma(&ascending(4), 0).is_empty());
        assert!(calculate_sma(&[], 3).is_empty());
    }

    #[test]
    fn sma_period_equals_length() {
        let sma = calculate_sma(&from_closes(&[2.0, 4.0, 6.0]), 3);
        assert_eq!(sma, vec![None, None, Some(4.0)]);
    }

    // ---- WMA -------------------------------------------------------------

    #[test]
    fn wma_weights_newest_heaviest() {
        // (1*1 + 2*2 + 3*3) / 6 = 14 / 6
        let wma = calculate_wma(&from_closes(&[1.0, 2.0, 3.0]), 3);
        assert!(approx(wma[2].unwrap(), 14.0 / 6.0));

        // Same closes reversed: (3*1 + 2*2 + 1*3) / 6 = 10 / 6
        let wma = calculate_wma(&from_closes(&[3.0, 2.0, 1.0]), 3);
        assert!(approx(wma[2].unwrap(), 10.0 / 6.0));
    }

    #[test]
    fn wma_of_constant_is_constant() {
        let wma = calculate_wma(&from_closes(&[7.0; 12]), 5);
        assert!(wma.iter().flatten().all(|v| approx(*v, 7.0)));
        assert_eq!(wma.iter().flatten().count(), 8);
    }

    // ---- HMA -------------------------------------------------------------

    #[test]
    fn hma_warm_up_length() {
        // period 9: half 4, sqrt 3 -> first value at 9 + 3 - 2 = 10
        let hma = calculate_hma(&ascending(30), 9);
        assert_eq!(hma.len(), 30);
        assert!(hma[..10].iter().all(Option::is_none));
        assert!(hma[10..].iter().all(Option::is_some));
    }

    #[test]
    fn hma_lag_on_linear_trend_is_constant() {
        // On a straight line WMA(p) lags by (p - 1) / 3. For p = 16
        // (half 8, sqrt 4) the Hull construction leaves a lag of 2/3.
        let hma = calculate_hma(&ascending(40), 16);
        assert!(hma.iter().flatten().count() > 10);
        for (i, v) in hma.iter().enumerate() {
            if let Some(v) = v {
                assert!(approx(*v, (i + 1) as f64 - 2.0 / 3.0), "index {i}: {v}");
            }
        }
    }

    #[test]
    fn hma_matches_manual_composition() {
        let closes: Vec<f64> = (0..20).map(|i| 50.0 + ((i * 7) % 5) as f64).collect();
        let candles = from_closes(&closes);
        let hma = calculate_hma(&candles, 4);

        let half = wma_values(&closes, 2);
        let full = wma_values(&closes, 4);
        let raw: Vec<f64> = (3..20)
            .map(|i| 2.0 * half[i].unwrap() - full[i].unwrap())
            .collect();
        let expected = wma_values(&raw, 2);
        for (offset, e) in expected.iter().enumerate() {
            assert_eq!(hma[3 + offset].is_some(), e.is_some());
            if let (Some(a), Some(b)) = (hma[3 + offset], e) {
                assert!(approx(a, *b));
            }
        }
    }

    #[test]
    fn hma_degenerate_periods_are_empty() {
        assert!(calculate_hma(&ascending(10), 1).is_empty());
        assert!(calculate_hma(&ascending(10), 0).is_empty());
        // period 9 needs 11 candles
        assert!(calculate_hma(&ascending(10), 9).is_empty());
    }
}
