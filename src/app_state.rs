// =============================================================================
// Central Application State — Aurora Chart Engine
// =============================================================================
//
// Ties the running feed to the dashboard API. The feed task owns the session
// and the candle store; everything the API needs is reachable from here
// without touching either:
//   - the latest chart frame and feed status arrive on watch channels,
//   - commands go back to the feed through a `FeedController`,
//   - indicator settings are shared with the recompute orchestrator behind a
//     parking_lot::RwLock, and a change re-publishes the latest frame.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::feed::{FeedController, FeedStatus};
use crate::recompute::{ChartFrame, RecomputeOrchestrator};
use crate::runtime_config::{IndicatorSettings, RuntimeConfig};

/// Shared across all API handlers via `Arc<AppState>`.
pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: RwLock<RuntimeConfig>,
    pub config_path: PathBuf,
    /// Read by the orchestrator on every recompute pass.
    pub indicator_settings: Arc<RwLock<IndicatorSettings>>,

    // ── Feed ────────────────────────────────────────────────────────────
    pub feed: FeedController,
    pub feed_status: watch::Receiver<FeedStatus>,

    // ── Chart ───────────────────────────────────────────────────────────
    pub frames: watch::Receiver<Arc<ChartFrame>>,
    pub recompute: RecomputeOrchestrator,

    // ── WebSocket ───────────────────────────────────────────────────────
    /// Messages pushed across all WebSocket connections.
    pub ws_sequence_number: AtomicU64,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        config_path: impl Into<PathBuf>,
        indicator_settings: Arc<RwLock<IndicatorSettings>>,
        feed: FeedController,
        feed_status: watch::Receiver<FeedStatus>,
        recompute: RecomputeOrchestrator,
    ) -> Self {
        Self {
            runtime_config: RwLock::new(config),
            config_path: config_path.into(),
            indicator_settings,
            feed,
            feed_status,
            frames: recompute.subscribe(),
            recompute,
            ws_sequence_number: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn latest_frame(&self) -> Arc<ChartFrame> {
        Arc::clone(&self.frames.borrow())
    }

    pub fn current_feed_status(&self) -> FeedStatus {
        self.feed_status.borrow().clone()
    }

    pub fn indicator_settings(&self) -> IndicatorSettings {
        self.indicator_settings.read().clone()
    }

    /// Swap in new indicator settings, recompute the latest frame with them
    /// and persist them (best-effort). Callers validate first.
    pub fn update_indicator_settings(&self, settings: IndicatorSettings) {
        *self.indicator_settings.write() = settings.clone();
        let frame = self.recompute.refresh();

        let config = {
            let mut config = self.runtime_config.write();
            config.indicators = settings;
            config.clone()
        };

        info!(
            enabled = config.indicators.enabled_indicators().len(),
            version = frame.version,
            "indicator settings updated"
        );

        if let Err(e) = config.save(&self.config_path) {
            warn!(error = %e, "failed to save indicator settings to disk");
        }
    }

    pub fn next_ws_sequence(&self) -> u64 {
        self.ws_sequence_number.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
