// =============================================================================
// Binance kline WebSocket transport
// =============================================================================
//
// One raw stream per subscription: `<ws_base>/<symbol>@kline_<interval>`.
// Only text frames carry klines; tungstenite answers pings on its own, so
// control frames are skipped here.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::feed::{KlineStream, PushTransport};
use crate::market_data::CandleKey;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BinanceKlineTransport {
    ws_base_url: String,
}

impl BinanceKlineTransport {
    /// `ws_base_url` is the raw-stream root, e.g.
    /// `wss://stream.binance.com:9443/ws`.
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn stream_url(&self, key: &CandleKey) -> String {
        format!(
            "{}/{}@kline_{}",
            self.ws_base_url,
            key.symbol.to_lowercase(),
            key.timeframe.as_str()
        )
    }
}

impl PushTransport for BinanceKlineTransport {
    type Stream = BinanceKlineStream;

    async fn open(&self, key: &CandleKey) -> Result<BinanceKlineStream> {
        let url = self.stream_url(key);
        info!(url = %url, key = %key, "connecting to kline WebSocket");

        let (ws, _response) = connect_async(url.as_str())
            .await
            .context("failed to connect to kline WebSocket")?;

        info!(key = %key, "kline WebSocket connected");
        Ok(BinanceKlineStream { ws })
    }
}

pub struct BinanceKlineStream {
    ws: WsStream,
}

impl KlineStream for BinanceKlineStream {
    async fn next_message(&mut self) -> Option<Result<String>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    warn!(frame = ?frame, "kline WebSocket closed by server");
                    return None;
                }
                // Ping / Pong / Binary / Frame
                Ok(_) => continue,
                Err(e) => return Some(Err(e).context("kline WebSocket read error")),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "kline WebSocket close handshake failed");
        }
        // Drain until the peer acknowledges so the socket shuts down cleanly.
        let drain = async { while let Some(Ok(_)) = self.ws.next().await {} };
        if tokio::time::timeout(CLOSE_TIMEOUT, drain).await.is_err() {
            debug!("kline WebSocket close not acknowledged in time");
        }
    }
}
