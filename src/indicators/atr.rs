// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar after the first:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_period = mean of the first `period` TR values
//   ATR_t      = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// Default period: 14
// =============================================================================

use crate::market_data::Candle;

use super::IndicatorSeries;

/// Compute the ATR series aligned with `candles`.
///
/// The first bar has no previous close and therefore no true range, so the
/// first ATR value sits at index `period`.
///
/// Empty when `period` is zero or there are fewer than `period + 1` candles.
pub fn calculate_atr(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.len() <= period {
        return Vec::new();
    }

    let tr = true_range(candles);
    let period_f = period as f64;

    // --- Seed ATR with the mean of the first `period` TR values --------------
    let seed = tr[1..=period].iter().map(|v| v.unwrap_or(0.0)).sum::<f64>() / period_f;

    let mut result = vec![None; period];
    result.reserve(candles.len() - period);
    result.push(Some(seed));

    // --- Wilder's smoothing for remaining TR values --------------------------
    let mut atr = seed;
    for value in tr[period + 1..].iter().flatten() {
        atr = (atr * (period_f - 1.0) + value) / period_f;
        result.push(Some(atr));
    }

    result
}

/// True range per bar; undefined for the first bar.
pub(crate) fn true_range(candles: &[Candle]) -> IndicatorSeries {
    let mut out = Vec::with_capacity(candles.len());
    if candles.is_empty() {
        return out;
    }

    out.push(None);
    for pair in candles.windows(2) {
        let prev_close = pair[0].close;
        let bar = &pair[1];
        let hl = bar.high - bar.low;
        let hc = (bar.high - prev_close).abs();
        let lc = (bar.low - prev_close).abs();
        out.push(Some(hl.max(hc).max(lc)));
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

    /// Build a test candle with the given OHLC values.
    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 100.0)
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 20];
        assert!(calculate_atr(&candles, 0).is_empty());
    }

    #[test]
    fn atr_insufficient_data() {
        // Need period + 1 = 15 candles for period=14, only have 14.
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 14];
        assert!(calculate_atr(&candles, 14).is_empty());
    }

    #[test]
    fn atr_exact_minimum_data() {
        // period=3, need 4 candles to get 3 TR values.
        let candles = vec![
            candle(100.0, 102.0, 98.0, 101.0),
            candle(101.0, 104.0, 99.0, 103.0),
            candle(103.0, 106.0, 100.0, 105.0),
            candle(105.0, 108.0, 102.0, 107.0),
        ];
        let atr = calculate_atr(&candles, 3);
        assert_eq!(atr.len(), 4);
        assert!(atr[..3].iter().all(Option::is_none));
        // TRs: 5, 6, 6
        assert!(approx(atr[3].unwrap(), 17.0 / 3.0));
    }

    #[test]
    fn atr_wilder_step() {
        let candles = vec![
            candle(100.0, 102.0, 98.0, 101.0),
            candle(101.0, 104.0, 99.0, 103.0),
            candle(103.0, 106.0, 100.0, 105.0),
            candle(105.0, 108.0, 102.0, 107.0),
            candle(107.0, 117.0, 107.0, 115.0),
        ];
        let atr = calculate_atr(&candles, 3);
        // TR_4 = max(10, |117-107|, |107-107|) = 10
        let expected = (17.0 / 3.0 * 2.0 + 10.0) / 3.0;
        assert!(approx(atr[4].unwrap(), expected));
    }

    #[test]
    fn atr_constant_range() {
        // All candles have the same range (H-L=10), close at midpoint.
        // TR should be constant and ATR should converge to 10.
        let mut candles = Vec::new();
        for i in 0..30 {
            let base = 100.0 + i as f64 * 0.1; // slight drift
            candles.push(candle(base, base + 5.0, base - 5.0, base));
        }
        let atr = calculate_atr(&candles, 14);
        let last = atr.last().unwrap().unwrap();
        assert!((last - 10.0).abs() < 1.0, "expected ATR near 10.0, got {last}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        // Gap scenario: |H - prevClose| > H - L
        let candles = vec![
            candle(100.0, 105.0, 95.0, 95.0),   // close at low
            candle(110.0, 115.0, 108.0, 112.0), // gap up: |115-95|=20 > 115-108=7
            candle(112.0, 118.0, 110.0, 115.0),
            candle(115.0, 120.0, 113.0, 118.0),
        ];
        let tr = true_range(&candles);
        assert_eq!(tr[0], None);
        assert_eq!(tr[1], Some(20.0));
        let atr = calculate_atr(&candles, 3);
        assert!(atr[3].unwrap() > 7.0, "ATR should reflect the gap");
    }
}
