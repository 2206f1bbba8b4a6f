// =============================================================================
// Runtime Configuration — Chart, feed and indicator settings with atomic save
// =============================================================================
//
// Central configuration hub for the Aurora chart engine. Feed tunables
// (symbol, timeframe, retry policy, endpoints) are read once at start-up;
// the indicator settings are shared behind a lock and may be changed at
// runtime through the API; a change re-publishes the chart frame at once.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry serde defaults so that adding new fields never
// breaks loading an older config file.
//
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::feed::FeedSettings;
use crate::indicators::{
    BollingerParams, Indicator, MacdParams, PeriodParams, RsiParams, StochRsiParams,
    SuperTrendParams, VwapParams,
};
use crate::market_data::CandleKey;
use crate::types::Timeframe;

pub const DEFAULT_CONFIG_PATH: &str = "chart_config.json";

/// Longest look-back accepted for any indicator.
pub const MAX_INDICATOR_PERIOD: usize = 5_000;

/// Largest band width multiplier (Bollinger σ, SuperTrend ATR).
pub const MAX_BAND_MULTIPLIER: f64 = 100.0;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_snapshot_limit() -> usize {
    500
}

fn default_retention_cap() -> usize {
    500
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    2000
}

fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

/// Unknown interval codes degrade to one minute instead of failing the load.
fn deserialize_timeframe<'de, D>(deserializer: D) -> std::result::Result<Timeframe, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(Timeframe::parse_or_default(&raw))
}

// =============================================================================
// IndicatorSettings
// =============================================================================

/// Moving-average family drawn once per configured period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiPeriodSettings {
    pub enabled: bool,
    pub periods: Vec<usize>,
}

/// Single-period overlay (WMA, HMA, ATR).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodSettings {
    pub enabled: bool,
    pub period: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiSettings {
    pub enabled: bool,
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: MacdParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: BollingerParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperTrendSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: SuperTrendParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VwapSettings {
    pub enabled: bool,
    pub anchor: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochRsiSettings {
    pub enabled: bool,
    pub period: usize,
    pub k_period: usize,
    pub d_period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiSettings {
    fn default() -> Self {
        let params = RsiParams::default();
        Self {
            enabled: true,
            period: params.period,
            overbought: params.overbought,
            oversold: params.oversold,
        }
    }
}

impl Default for StochRsiSettings {
    fn default() -> Self {
        let params = StochRsiParams::default();
        Self {
            enabled: false,
            period: params.period,
            k_period: params.k_period,
            d_period: params.d_period,
            overbought: 80.0,
            oversold: 20.0,
        }
    }
}

impl MultiPeriodSettings {
    fn new(enabled: bool, periods: &[usize]) -> Self {
        Self {
            enabled,
            periods: periods.to_vec(),
        }
    }
}

impl Default for MultiPeriodSettings {
    fn default() -> Self {
        Self::new(false, &[])
    }
}

impl PeriodSettings {
    fn disabled(period: usize) -> Self {
        Self {
            enabled: false,
            period,
        }
    }
}

impl Default for PeriodSettings {
    fn default() -> Self {
        Self::disabled(14)
    }
}

/// Which indicators the chart overlays, and with what parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub sma: MultiPeriodSettings,
    pub ema: MultiPeriodSettings,
    pub wma: PeriodSettings,
    pub hma: PeriodSettings,
    pub rsi: RsiSettings,
    pub macd: MacdSettings,
    pub bollinger: BollingerSettings,
    pub atr: PeriodSettings,
    pub supertrend: SuperTrendSettings,
    pub obv: ToggleSettings,
    pub adl: ToggleSettings,
    pub vwap: VwapSettings,
    pub stoch_rsi: StochRsiSettings,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma: MultiPeriodSettings::new(true, &[20, 50, 200]),
            ema: MultiPeriodSettings::new(false, &[12, 26]),
            wma: PeriodSettings::disabled(20),
            hma: PeriodSettings::disabled(9),
            rsi: RsiSettings::default(),
            macd: MacdSettings::default(),
            bollinger: BollingerSettings::default(),
            atr: PeriodSettings::disabled(14),
            supertrend: SuperTrendSettings::default(),
            obv: ToggleSettings::default(),
            adl: ToggleSettings::default(),
            vwap: VwapSettings::default(),
            stoch_rsi: StochRsiSettings::default(),
        }
    }
}

impl IndicatorSettings {
    /// Expand the enabled toggles into the indicator set to compute.
    pub fn enabled_indicators(&self) -> Vec<Indicator> {
        let mut out = Vec::new();

        if self.sma.enabled {
            out.extend(self.sma.periods.iter().map(|&p| Indicator::Sma(PeriodParams::new(p))));
        }
        if self.ema.enabled {
            out.extend(self.ema.periods.iter().map(|&p| Indicator::Ema(PeriodParams::new(p))));
        }
        if self.wma.enabled {
            out.push(Indicator::Wma(PeriodParams::new(self.wma.period)));
        }
        if self.hma.enabled {
            out.push(Indicator::Hma(PeriodParams::new(self.hma.period)));
        }
        if self.rsi.enabled {
            out.push(Indicator::Rsi(self.rsi_params()));
        }
        if self.macd.enabled {
            out.push(Indicator::Macd(self.macd.params));
        }
        if self.bollinger.enabled {
            out.push(Indicator::Bollinger(self.bollinger.params));
        }
        if self.atr.enabled {
            out.push(Indicator::Atr(PeriodParams::new(self.atr.period)));
        }
        if self.supertrend.enabled {
            out.push(Indicator::SuperTrend(self.supertrend.params));
        }
        if self.obv.enabled {
            out.push(Indicator::Obv);
        }
        if self.adl.enabled {
            out.push(Indicator::Adl);
        }
        if self.vwap.enabled {
            out.push(Indicator::Vwap(VwapParams {
                anchor: self.vwap.anchor,
            }));
        }
        if self.stoch_rsi.enabled {
            out.push(Indicator::StochRsi(StochRsiParams {
                period: self.stoch_rsi.period,
                k_period: self.stoch_rsi.k_period,
                d_period: self.stoch_rsi.d_period,
            }));
        }

        out
    }

    pub fn rsi_params(&self) -> RsiParams {
        RsiParams {
            period: self.rsi.period,
            overbought: self.rsi.overbought,
            oversold: self.rsi.oversold,
        }
    }

    /// Reject periods, multipliers and levels the indicators cannot use.
    ///
    /// Checks every section, enabled or not, so a stored set stays valid when
    /// a toggle is flipped later.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("wma.period", self.wma.period),
            ("hma.period", self.hma.period),
            ("rsi.period", self.rsi.period),
            ("macd.fast", self.macd.params.fast),
            ("macd.slow", self.macd.params.slow),
            ("macd.signal", self.macd.params.signal),
            ("bollinger.period", self.bollinger.params.period),
            ("atr.period", self.atr.period),
            ("supertrend.period", self.supertrend.params.period),
            ("stoch_rsi.period", self.stoch_rsi.period),
            ("stoch_rsi.k_period", self.stoch_rsi.k_period),
            ("stoch_rsi.d_period", self.stoch_rsi.d_period),
        ];
        let listed = self
            .sma
            .periods
            .iter()
            .map(|&p| ("sma.periods", p))
            .chain(self.ema.periods.iter().map(|&p| ("ema.periods", p)));

        for (name, period) in periods.into_iter().chain(listed) {
            if !(1..=MAX_INDICATOR_PERIOD).contains(&period) {
                bail!("{name} must be between 1 and {MAX_INDICATOR_PERIOD}, got {period}");
            }
        }
        if self.hma.period < 2 {
            bail!("hma.period must be at least 2, got {}", self.hma.period);
        }

        for (name, multiplier) in [
            ("bollinger.std_dev", self.bollinger.params.std_dev),
            ("supertrend.multiplier", self.supertrend.params.multiplier),
        ] {
            if !(multiplier > 0.0 && multiplier <= MAX_BAND_MULTIPLIER) {
                bail!("{name} must be in (0, {MAX_BAND_MULTIPLIER}], got {multiplier}");
            }
        }

        for (name, oversold, overbought) in [
            ("rsi", self.rsi.oversold, self.rsi.overbought),
            ("stoch_rsi", self.stoch_rsi.oversold, self.stoch_rsi.overbought),
        ] {
            if !(0.0..=100.0).contains(&oversold)
                || !(0.0..=100.0).contains(&overbought)
                || oversold >= overbought
            {
                bail!("{name} levels must satisfy 0 <= oversold < overbought <= 100");
            }
        }

        Ok(())
    }

    /// Oscillator guide levels drawn alongside the series.
    pub fn levels(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("rsi_overbought".to_string(), self.rsi.overbought),
            ("rsi_oversold".to_string(), self.rsi.oversold),
            ("stoch_rsi_overbought".to_string(), self.stoch_rsi.overbought),
            ("stoch_rsi_oversold".to_string(), self.stoch_rsi.oversold),
        ])
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the Aurora chart engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Series -------------------------------------------------------------

    /// Symbol charted at start-up.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Interval charted at start-up.
    #[serde(default, deserialize_with = "deserialize_timeframe")]
    pub timeframe: Timeframe,

    /// Number of bars requested for the initial snapshot.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,

    /// Maximum number of bars the candle store retains.
    #[serde(default = "default_retention_cap")]
    pub retention_cap: usize,

    // --- Reconnect policy ---------------------------------------------------

    /// Reconnect attempts after a failure before the feed gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Linear backoff step; attempt `n` waits `n * base`.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    // --- Endpoints ----------------------------------------------------------

    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,

    /// Address the dashboard API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Indicators ---------------------------------------------------------

    #[serde(default)]
    pub indicators: IndicatorSettings,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            timeframe: Timeframe::default(),
            snapshot_limit: default_snapshot_limit(),
            retention_cap: default_retention_cap(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
            bind_addr: default_bind_addr(),
            indicators: IndicatorSettings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        if let Err(e) = config.indicators.validate() {
            warn!(error = %e, "stored indicator settings invalid; using defaults");
            config.indicators = IndicatorSettings::default();
        }

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Load from `path`, or fall back to defaults with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default runtime config");
                Self::default()
            }
        }
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `AURORA_SYMBOL`, `AURORA_TIMEFRAME` and `AURORA_BIND_ADDR`
    /// from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(symbol) = lookup("AURORA_SYMBOL").filter(|s| !s.trim().is_empty()) {
            self.symbol = symbol;
        }
        if let Some(tf) = lookup("AURORA_TIMEFRAME") {
            self.timeframe = Timeframe::parse_or_default(&tf);
        }
        if let Some(addr) = lookup("AURORA_BIND_ADDR").filter(|s| !s.trim().is_empty()) {
            self.bind_addr = addr;
        }
    }

    /// The series charted at start-up.
    pub fn candle_key(&self) -> CandleKey {
        CandleKey::new(&self.symbol, self.timeframe)
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            snapshot_limit: self.snapshot_limit,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
        }
    }
}
