// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The chart serves public market data
// only, so no endpoint requires authentication.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::market_data::CandleKey;
use crate::runtime_config::IndicatorSettings;
use crate::types::{FeedState, Timeframe};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/feed", get(feed_status))
        .route("/api/v1/subscribe", post(subscribe))
        .route("/api/v1/disconnect", post(disconnect))
        .route("/api/v1/indicators", get(get_indicators).post(set_indicators))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    feed_state: FeedState,
    /// False once the feed has failed or been closed.
    feed_active: bool,
    frame_version: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let feed_state = state.current_feed_status().state;
    let resp = HealthResponse {
        status: "ok",
        feed_state,
        feed_active: !feed_state.is_terminal(),
        frame_version: state.latest_frame().version,
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Chart & feed
// =============================================================================

async fn chart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.latest_frame())
}

async fn feed_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.current_feed_status())
}

#[derive(Deserialize)]
struct SubscribeRequest {
    symbol: String,
    timeframe: String,
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.symbol.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "symbol must not be empty"));
    }
    let timeframe: Timeframe = req
        .timeframe
        .parse()
        .map_err(|e: anyhow::Error| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let key = CandleKey::new(&req.symbol, timeframe);
    state.feed.subscribe(key.clone()).await.map_err(|e| {
        warn!(error = %e, "subscribe command not delivered");
        api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    info!(key = %key, "subscribe requested via API");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "subscribed": key })),
    ))
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.feed.disconnect().await.map_err(|e| {
        warn!(error = %e, "disconnect command not delivered");
        api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    info!("disconnect requested via API");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "disconnect": true })),
    ))
}

// =============================================================================
// Indicator settings
// =============================================================================

async fn get_indicators(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.indicator_settings())
}

/// Replace the indicator settings. Sections omitted from the body fall back
/// to their defaults; the chart frame is recomputed right away.
async fn set_indicators(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<IndicatorSettings>,
) -> Result<Json<IndicatorSettings>, ApiError> {
    if let Err(e) = settings.validate() {
        warn!(error = %e, "rejected indicator settings");
        return Err(api_error(StatusCode::BAD_REQUEST, e.to_string()));
    }
    state.update_indicator_settings(settings);
    Ok(Json(state.indicator_settings()))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::harness;
    use crate::feed::FeedCommand;

    #[tokio::test]
    async fn subscribe_forwards_command() {
        let mut h = harness();
        let req = SubscribeRequest {
            symbol: "ethusdt".into(),
            timeframe: "15m".into(),
        };
        assert!(subscribe(State(Arc::clone(&h.state)), Json(req)).await.is_ok());
        assert_eq!(
            h.commands.recv().await,
            Some(FeedCommand::Subscribe(CandleKey::new("ETHUSDT", Timeframe::FifteenMinutes)))
        );
    }

    #[tokio::test]
    async fn subscribe_rejects_unknown_timeframe() {
        let h = harness();
        let req = SubscribeRequest {
            symbol: "BTCUSDT".into(),
            timeframe: "7m".into(),
        };
        let err = subscribe(State(Arc::clone(&h.state)), Json(req)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn disconnect_without_feed_is_unavailable() {
        let h = harness();
        drop(h.commands);
        let err = disconnect(State(Arc::clone(&h.state))).await.err().unwrap();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn indicator_settings_round_trip_through_handlers() {
        let h = harness();
        let mut settings = IndicatorSettings::default();
        settings.bollinger.enabled = true;
        settings.sma.periods = vec![10];

        let Json(applied) = set_indicators(State(Arc::clone(&h.state)), Json(settings.clone()))
            .await
            .unwrap();
        assert_eq!(applied, settings);
        assert_eq!(h.state.indicator_settings(), settings);
        assert!(h.state.latest_frame().indicators.contains_key("bb_upper"));
        let _ = std::fs::remove_file(&h.state.config_path);
    }

    #[tokio::test]
    async fn oversized_period_is_rejected_and_not_stored() {
        let h = harness();
        let settings: IndicatorSettings =
            serde_json::from_str(r#"{ "rsi": { "period": 18446744073709551615 } }"#).unwrap();

        let err = set_indicators(State(Arc::clone(&h.state)), Json(settings)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(h.state.indicator_settings(), IndicatorSettings::default());
        assert!(!h.state.config_path.exists());
        assert_eq!(h.state.latest_frame().version, 0);
    }
}
