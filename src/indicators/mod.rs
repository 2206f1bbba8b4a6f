// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of every indicator the chart can
// overlay. Each function maps a candle series (oldest first) to an
// `IndicatorSeries` aligned 1:1 with it by index:
//
//   - `None` marks the warm-up span before enough history exists.
//   - An empty series means the input is shorter than the indicator's minimum
//     length for the given parameters (or a period is zero).
//
// No function ever emits NaN or infinity: every division by zero has an
// explicit fallback documented on the function, and products that overflow
// (huge band multipliers) are reported as undefined.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod supertrend;
pub mod volume;

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerParams, BollingerSeries};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdParams, MacdSeries};
pub use moving_average::{calculate_hma, calculate_sma, calculate_wma};
pub use rsi::{calculate_rsi, calculate_stoch_rsi, RsiParams, RsiZone, StochRsiParams, StochRsiSeries};
pub use supertrend::{calculate_supertrend, SuperTrendParams, SuperTrendSeries};
pub use volume::{calculate_adl, calculate_obv, calculate_vwap, VwapParams};

/// Indicator output aligned with the candle series; `None` is "undefined".
pub type IndicatorSeries = Vec<Option<f64>>;

/// Parameter record for indicators driven by a single look-back period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodParams {
    pub period: usize,
}

impl PeriodParams {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

/// The closed set of indicators the engine can compute, one variant per
/// formula, each carrying its own parameter record.
#[derive(Debug, Clone, PartialEq)]
pub enum Indicator {
    Sma(PeriodParams),
    Ema(PeriodParams),
    Wma(PeriodParams),
    Hma(PeriodParams),
    Rsi(RsiParams),
    Macd(MacdParams),
    Bollinger(BollingerParams),
    Atr(PeriodParams),
    SuperTrend(SuperTrendParams),
    Obv,
    Adl,
    Vwap(VwapParams),
    StochRsi(StochRsiParams),
}

impl Indicator {
    /// Run the indicator over `candles` and return its named output series.
    ///
    /// Names are stable keys for the rendering layer (`sma_20`, `bb_upper`,
    /// `macd_signal`, ...). Multi-line indicators return one entry per line.
    pub fn compute(&self, candles: &[Candle]) -> Vec<(String, IndicatorSeries)> {
        match self {
            Self::Sma(p) => vec![(format!("sma_{}", p.period), calculate_sma(candles, p.period))],
            Self::Ema(p) => vec![(format!("ema_{}", p.period), calculate_ema(candles, p.period))],
            Self::Wma(p) => vec![(format!("wma_{}", p.period), calculate_wma(candles, p.period))],
            Self::Hma(p) => vec![(format!("hma_{}", p.period), calculate_hma(candles, p.period))],
            Self::Rsi(p) => vec![(format!("rsi_{}", p.period), calculate_rsi(candles, p.period))],
            Self::Macd(p) => {
                let out = calculate_macd(candles, p);
                vec![
                    ("macd".to_string(), out.macd),
                    ("macd_signal".to_string(), out.signal),
                    ("macd_histogram".to_string(), out.histogram),
                ]
            }
            Self::Bollinger(p) => {
                let out = calculate_bollinger(candles, p);
                vec![
                    ("bb_upper".to_string(), out.upper),
                    ("bb_middle".to_string(), out.middle),
                    ("bb_lower".to_string(), out.lower),
                ]
            }
            Self::Atr(p) => vec![(format!("atr_{}", p.period), calculate_atr(candles, p.period))],
            Self::SuperTrend(p) => {
                let out = calculate_supertrend(candles, p);
                vec![
                    ("supertrend".to_string(), out.trend),
                    ("supertrend_upper".to_string(), out.upper),
                    ("supertrend_lower".to_string(), out.lower),
                    ("supertrend_direction".to_string(), out.direction),
                ]
            }
            Self::Obv => vec![("obv".to_string(), calculate_obv(candles))],
            Self::Adl => vec![("adl".to_string(), calculate_adl(candles))],
            Self::Vwap(p) => vec![("vwap".to_string(), calculate_vwap(candles, p))],
            Self::StochRsi(p) => {
                let out = calculate_stoch_rsi(candles, p);
                vec![
                    ("stoch_rsi_k".to_string(), out.k),
                    ("stoch_rsi_d".to_string(), out.d),
                ]
            }
        }
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// `Some(v)` only for finite values.
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub(crate) fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Apply `f` to the defined tail of `series` and re-align the result.
///
/// Used to chain indicators (signal EMA over the MACD line, WMA over the raw
/// Hull series, ...). The tail starts at the first defined value and is
/// expected to be contiguous; positions before it stay undefined. When `f`
/// has too little input the whole result is undefined.
pub(crate) fn apply_from_first_defined<F>(series: &[Option<f64>], f: F) -> IndicatorSeries
where
    F: Fn(&[f64]) -> IndicatorSeries,
{
    let mut out = vec![None; series.len()];
    let Some(start) = series.iter().position(Option::is_some) else {
        return out;
    };

    let tail: Vec<f64> = series[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in f(&tail).into_iter().enumerate() {
        out[start + offset] = value;
    }
    out
}

/// Pointwise combination of two aligned series; undefined wherever either
/// operand is.
pub(crate) fn zip_defined<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> IndicatorSeries
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(f(*x, *y)),
            _ => None,
        })
        .collect()
}
