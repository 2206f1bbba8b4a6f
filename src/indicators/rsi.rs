// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing, and Stochastic RSI
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the mean of the first
//          `period` gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Stochastic RSI runs the stochastic oscillator over the RSI series itself:
//   raw_t = (RSI_t - min(RSI, n)) / (max(RSI, n) - min(RSI, n)) * 100
//   %K    = SMA(raw, k_period)
//   %D    = SMA(%K, d_period)
// with the RSI period reused as the stochastic look-back `n`.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::moving_average::sma_values;
use super::{apply_from_first_defined, closes, IndicatorSeries};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// RSI look-back plus the guide levels drawn on the oscillator pane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

/// Where an RSI reading sits relative to the configured levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiParams {
    /// Classify `value`; the levels themselves count as inside the zone.
    pub fn zone(&self, value: f64) -> RsiZone {
        if value >= self.overbought {
            RsiZone::Overbought
        } else if value <= self.oversold {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochRsiParams {
    pub period: usize,
    pub k_period: usize,
    pub d_period: usize,
}

impl Default for StochRsiParams {
    fn default() -> Self {
        Self {
            period: 14,
            k_period: 3,
            d_period: 3,
        }
    }
}

/// %K and %D lines of the Stochastic RSI, both aligned with the candles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StochRsiSeries {
    pub k: IndicatorSeries,
    pub d: IndicatorSeries,
}

// ---------------------------------------------------------------------------
// RSI
// ---------------------------------------------------------------------------

/// Compute the RSI series aligned with `candles`.
///
/// The first value sits at index `period` (the first `period` deltas seed
/// the averages); everything before it is undefined. Values are always in
/// `[0, 100]`.
///
/// # Edge cases
/// - `period == 0` => empty
/// - `candles.len() < period + 1` => empty
/// - Average loss of zero yields exactly 100.0, never an infinite RS.
pub fn calculate_rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    rsi_values(&closes(candles), period)
}

pub(crate) fn rsi_values(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.len() <= period {
        return Vec::new();
    }

    // --- Compute price deltas ------------------------------------------------
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    // --- Seed averages with the mean of the first `period` deltas ------------
    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = vec![None; period];
    result.reserve(values.len() - period);
    result.push(Some(rsi_from_averages(avg_gain, avg_loss)));

    // --- Wilder's smoothing for subsequent values ----------------------------
    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        result.push(Some(rsi_from_averages(avg_gain, avg_loss)));
    }

    result
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// A zero average loss defines RSI as 100.0 rather than dividing by zero.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Stochastic RSI
// ---------------------------------------------------------------------------

/// Compute Stochastic RSI %K and %D aligned with `candles`.
///
/// %K is first defined at index `2 * period + k_period - 2`, %D
/// `d_period - 1` bars later. Both lines are empty when any period is zero
/// or the input is too short for a single %K value.
///
/// When the RSI window is flat (highest equals lowest) the raw stochastic is
/// 50.0, the neutral midpoint.
pub fn calculate_stoch_rsi(candles: &[Candle], params: &StochRsiParams) -> StochRsiSeries {
    let StochRsiParams {
        period,
        k_period,
        d_period,
    } = *params;
    let min_len = period
        .saturating_mul(2)
        .saturating_add(k_period.saturating_sub(1));
    if period == 0 || k_period == 0 || d_period == 0 || candles.len() < min_len {
        return StochRsiSeries::default();
    }

    let rsi = rsi_values(&closes(candles), period);
    let raw = apply_from_first_defined(&rsi, |v| stochastic_values(v, period));
    let k = apply_from_first_defined(&raw, |v| sma_values(v, k_period));
    let d = apply_from_first_defined(&k, |v| sma_values(v, d_period));

    StochRsiSeries { k, d }
}

fn stochastic_values(values: &[f64], lookback: usize) -> IndicatorSeries {
    if lookback == 0 || values.len() < lookback {
        return Vec::new();
    }

    let mut result = vec![None; lookback - 1];
    result.extend(values.windows(lookback).map(|w| {
        let highest = w.iter().copied().fold(f64::MIN, f64::max);
        let lowest = w.iter().copied().fold(f64::MAX, f64::min);
        let current = w[lookback - 1];
        let range = highest - lowest;
        if range == 0.0 {
            Some(50.0)
        } else {
            Some((current - lowest) / range * 100.0)
        }
    }));
    result
}
