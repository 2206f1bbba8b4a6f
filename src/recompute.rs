// =============================================================================
// Recompute Orchestrator
// =============================================================================
//
// Observes the candle store and, on every change, re-runs each enabled
// indicator over the whole retained series. The result is published as an
// immutable `ChartFrame` on a watch channel; readers always see the latest
// complete frame and never a half-built one.
//
// Recomputing from scratch keeps every frame identical to the batch result.
// The retained window is bounded, so the cost is bounded too.
//
// The orchestrator is a cheap handle: the store owns one clone as its
// observer, the API holds another to `refresh` the latest frame after a
// settings change. Passes are serialised, so versions and candles published
// on the channel never go backwards.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::indicators::IndicatorSeries;
use crate::market_data::{Candle, CandleObserver};
use crate::runtime_config::IndicatorSettings;

/// Everything the rendering layer needs for one redraw.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartFrame {
    /// Increases by one on every publish; 0 is the empty start-up frame.
    pub version: u64,
    pub candles: Vec<Candle>,
    /// One aligned series per indicator output, keyed by name (`sma_20`, ...).
    pub indicators: BTreeMap<String, IndicatorSeries>,
    /// Oscillator guide levels (`rsi_overbought`, ...).
    pub levels: BTreeMap<String, f64>,
    /// RFC 3339 time the frame was computed.
    pub computed_at: String,
}

#[derive(Clone)]
pub struct RecomputeOrchestrator {
    shared: Arc<Shared>,
}

struct Shared {
    settings: Arc<RwLock<IndicatorSettings>>,
    /// Held for a whole pass.
    version: Mutex<u64>,
    frames: watch::Sender<Arc<ChartFrame>>,
}

impl RecomputeOrchestrator {
    /// Create an orchestrator reading `settings` on every pass, plus the
    /// receiving end of its frame channel.
    pub fn new(
        settings: Arc<RwLock<IndicatorSettings>>,
    ) -> (Self, watch::Receiver<Arc<ChartFrame>>) {
        let (frames, rx) = watch::channel(Arc::new(ChartFrame::default()));
        let shared = Shared {
            settings,
            version: Mutex::new(0),
            frames,
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            rx,
        )
    }

    /// Another receiver for the frame channel.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ChartFrame>> {
        self.shared.frames.subscribe()
    }

    /// Compute a fresh frame for `candles` and publish it.
    pub fn recompute(&self, candles: &[Candle]) -> Arc<ChartFrame> {
        let mut version = self.shared.version.lock();
        self.publish(&mut version, candles)
    }

    /// Recompute over the candles of the latest published frame with the
    /// current settings.
    ///
    /// Lets a settings change show up without waiting for the next candle,
    /// which never comes once the feed has failed or been closed.
    pub fn refresh(&self) -> Arc<ChartFrame> {
        let mut version = self.shared.version.lock();
        let latest = Arc::clone(&self.shared.frames.borrow());
        self.publish(&mut version, &latest.candles)
    }

    fn publish(&self, version: &mut u64, candles: &[Candle]) -> Arc<ChartFrame> {
        let started = Instant::now();

        // Snapshot the settings so the lock is not held while computing.
        let settings = self.shared.settings.read().clone();

        let indicators: BTreeMap<String, IndicatorSeries> = settings
            .enabled_indicators()
            .iter()
            .flat_map(|indicator| indicator.compute(candles))
            .collect();

        *version += 1;
        let frame = Arc::new(ChartFrame {
            version: *version,
            candles: candles.to_vec(),
            indicators,
            levels: settings.levels(),
            computed_at: Utc::now().to_rfc3339(),
        });

        debug!(
            version = frame.version,
            candles = candles.len(),
            series = frame.indicators.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "chart frame recomputed"
        );

        self.shared.frames.send_replace(Arc::clone(&frame));
        frame
    }
}

impl CandleObserver for RecomputeOrchestrator {
    fn on_candles_changed(&mut self, candles: &[Candle]) {
        self.recompute(candles);
    }
}
