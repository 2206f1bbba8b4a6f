use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::market_data::CandleKey;
use crate::types::FeedState;

/// Explicit feed session owned by the caller and passed into
/// [`FeedManager`](super::FeedManager) operations.
///
/// Holds everything that survives between state transitions: which series is
/// subscribed, where the state machine is, and the retry budget spent so far.
#[derive(Debug, Clone)]
pub struct FeedSession {
    pub(super) id: Uuid,
    pub(super) key: Option<CandleKey>,
    pub(super) state: FeedState,
    pub(super) retry_count: u32,
    pub(super) snapshot_loaded: bool,
    pub(super) last_error: Option<String>,
}

impl FeedSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            key: None,
            state: FeedState::Idle,
            retry_count: 0,
            snapshot_loaded: false,
            last_error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> Option<&CandleKey> {
        self.key.as_ref()
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Restart from `Idle` for `key`, forgetting any previous subscription.
    pub(super) fn begin(&mut self, key: CandleKey) {
        self.key = Some(key);
        self.state = FeedState::Idle;
        self.retry_count = 0;
        self.snapshot_loaded = false;
        self.last_error = None;
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            session_id: self.id,
            key: self.key.clone(),
            state: self.state,
            retry_count: self.retry_count,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for FeedSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a session, mirrored to the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatus {
    pub session_id: Uuid,
    pub key: Option<CandleKey>,
    pub state: FeedState,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// Requests delivered to a running feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    /// Switch to another series. A no-op for the series already subscribed.
    Subscribe(CandleKey),
    /// Close the transport, cancelling any pending reconnect.
    Disconnect,
}

/// Cloneable handle used by other tasks (the API) to steer the feed.
#[derive(Debug, Clone)]
pub struct FeedController {
    tx: mpsc::Sender<FeedCommand>,
}

impl FeedController {
    /// Create a controller and the receiver the feed task listens on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FeedCommand>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn subscribe(&self, key: CandleKey) -> Result<()> {
        self.send(FeedCommand::Subscribe(key)).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(FeedCommand::Disconnect).await
    }

    async fn send(&self, command: FeedCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .ok()
            .context("feed task is not running")
    }
}
