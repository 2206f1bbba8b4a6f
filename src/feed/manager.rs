// =============================================================================
// Feed Manager — connection state machine
// =============================================================================
//
//   Idle -> Connecting -> Live -> Reconnecting -> (Connecting | Failed)
//   any  -> Closed   (explicit disconnect)
//
// Connecting loads the historical snapshot into the store (once per
// subscription) and opens the push transport. Any failure there, or a drop
// while Live, goes through Reconnecting: the retry counter increments and
// the next attempt waits `retry_count * base_delay`. A failure observed with
// the counter already at the maximum ends the session in Failed. Reaching
// Live resets the counter.
//
// Every await point races against the command channel, so a disconnect or a
// switch to another series cancels in-flight I/O and pending backoff timers
// before anything else touches the store.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use super::session::{FeedCommand, FeedSession, FeedStatus};
use super::{KlineStream, PushTransport, SnapshotSource};
use crate::market_data::{parse_kline_message, CandleKey, CandleStore};
use crate::types::FeedState;

/// Retry and snapshot policy for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub snapshot_limit: usize,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            snapshot_limit: 500,
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("{key}: gave up after {attempts} reconnect attempts, last error: {last_error}")]
    RetriesExhausted {
        key: CandleKey,
        attempts: u32,
        last_error: String,
    },
}

/// Linear backoff: the n-th retry waits `n * base`.
pub fn backoff_delay(retry_count: u32, base: Duration) -> Duration {
    base.saturating_mul(retry_count)
}

/// Why a subscription stopped before its session ended on its own.
enum Interrupt {
    Disconnect,
    Switch(CandleKey),
}

enum RunOutcome {
    Closed,
    Failed(FeedError),
    Switch(CandleKey),
}

pub struct FeedManager<S, T> {
    snapshots: S,
    transport: T,
    settings: FeedSettings,
    status: Option<watch::Sender<FeedStatus>>,
}

impl<S, T> FeedManager<S, T>
where
    S: SnapshotSource,
    T: PushTransport,
{
    pub fn new(snapshots: S, transport: T, settings: FeedSettings) -> Self {
        Self {
            snapshots,
            transport,
            settings,
            status: None,
        }
    }

    /// Mirror every state transition into `status`.
    pub fn with_status(mut self, status: watch::Sender<FeedStatus>) -> Self {
        self.status = Some(status);
        self
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Serve subscriptions until every [`FeedController`](super::FeedController)
    /// is dropped.
    ///
    /// Starts with `initial` if given, then waits for a `Subscribe` command
    /// whenever a session ends in `Failed` or `Closed`.
    pub async fn run(
        &self,
        session: &mut FeedSession,
        store: &mut CandleStore,
        commands: &mut mpsc::Receiver<FeedCommand>,
        initial: Option<CandleKey>,
    ) {
        let mut next = initial;
        loop {
            let key = match next.take() {
                Some(key) => key,
                None => match commands.recv().await {
                    Some(FeedCommand::Subscribe(key)) => key,
                    Some(FeedCommand::Disconnect) => continue,
                    None => {
                        info!(session = %session.id(), "feed controllers dropped, stopping");
                        return;
                    }
                },
            };

            if let Err(e) = self.subscribe(session, key, store, commands).await {
                error!(session = %session.id(), error = %e, "feed failed, waiting for a new subscription");
            }
        }
    }

    /// Subscribe `session` to `key` and drive it until it is closed or fails.
    ///
    /// A `Subscribe` command for a different series received along the way
    /// closes the current transport and restarts from `Idle` with the new
    /// series. Returns `Ok` once the session is `Closed`.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub async fn subscribe(
        &self,
        session: &mut FeedSession,
        key: CandleKey,
        store: &mut CandleStore,
        commands: &mut mpsc::Receiver<FeedCommand>,
    ) -> Result<(), FeedError> {
        let mut key = key;
        loop {
            session.begin(key);
            self.publish(session);

            match self.run_session(session, store, commands).await {
                RunOutcome::Closed => return Ok(()),
                RunOutcome::Failed(e) => return Err(e),
                RunOutcome::Switch(next) => {
                    info!(from = ?session.key(), to = %next, "switching feed");
                    key = next;
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // State machine
    // -------------------------------------------------------------------------

    async fn run_session(
        &self,
        session: &mut FeedSession,
        store: &mut CandleStore,
        commands: &mut mpsc::Receiver<FeedCommand>,
    ) -> RunOutcome {
        let Some(key) = session.key.clone() else {
            self.transition(session, FeedState::Closed);
            return RunOutcome::Closed;
        };

        loop {
            self.transition(session, FeedState::Connecting);

            let failure = match self.connect(session, &key, store, commands).await {
                Err(interrupt) => return self.interrupted(session, interrupt),
                Ok(Err(e)) => e,
                Ok(Ok(mut stream)) => {
                    session.retry_count = 0;
                    session.last_error = None;
                    self.transition(session, FeedState::Live);

                    match self.pump(&key, &mut stream, store, commands).await {
                        Err(interrupt) => {
                            stream.close().await;
                            return self.interrupted(session, interrupt);
                        }
                        Ok(e) => e,
                    }
                }
            };

            // --- Reconnecting ------------------------------------------------
            session.last_error = Some(format!("{failure:#}"));
            if session.retry_count >= self.settings.max_reconnect_attempts {
                self.transition(session, FeedState::Failed);
                error!(key = %key, attempts = session.retry_count, error = %failure, "retry budget exhausted");
                return RunOutcome::Failed(FeedError::RetriesExhausted {
                    key,
                    attempts: session.retry_count,
                    last_error: format!("{failure:#}"),
                });
            }

            session.retry_count += 1;
            let delay = backoff_delay(session.retry_count, self.settings.reconnect_base_delay);
            self.transition(session, FeedState::Reconnecting);
            warn!(
                key = %key,
                attempt = session.retry_count,
                max = self.settings.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "feed connection failed, retrying"
            );

            if let Err(interrupt) = interruptible(&key, commands, tokio::time::sleep(delay)).await {
                return self.interrupted(session, interrupt);
            }
        }
    }

    /// Load the snapshot if this subscription has none yet, then open the
    /// transport.
    async fn connect(
        &self,
        session: &mut FeedSession,
        key: &CandleKey,
        store: &mut CandleStore,
        commands: &mut mpsc::Receiver<FeedCommand>,
    ) -> Result<anyhow::Result<T::Stream>, Interrupt> {
        if !session.snapshot_loaded {
            let fetched = interruptible(
                key,
                commands,
                self.snapshots.fetch_snapshot(key, self.settings.snapshot_limit),
            )
            .await?;

            let loaded = fetched.and_then(|candles| {
                let count = candles.len();
                store
                    .initialize(candles)
                    .context("snapshot rejected by candle store")?;
                Ok(count)
            });
            match loaded {
                Ok(count) => {
                    session.snapshot_loaded = true;
                    info!(key = %key, candles = count, "snapshot loaded");
                }
                Err(e) => return Ok(Err(e.context("snapshot fetch failed"))),
            }
        }

        let opened = interruptible(key, commands, self.transport.open(key)).await?;
        Ok(opened.context("push transport open failed"))
    }

    /// Feed inbound messages into the store until the transport drops
    /// (returns the cause) or a command interrupts.
    async fn pump(
        &self,
        key: &CandleKey,
        stream: &mut T::Stream,
        store: &mut CandleStore,
        commands: &mut mpsc::Receiver<FeedCommand>,
    ) -> Result<anyhow::Error, Interrupt> {
        loop {
            tokio::select! {
                message = stream.next_message() => match message {
                    Some(Ok(text)) => apply_message(key, store, &text),
                    Some(Err(e)) => return Ok(e.context("push transport error")),
                    None => return Ok(anyhow!("push transport closed by remote")),
                },
                command = commands.recv() => {
                    if let Some(interrupt) = classify(key, command) {
                        return Err(interrupt);
                    }
                }
            }
        }
    }

    fn interrupted(&self, session: &mut FeedSession, interrupt: Interrupt) -> RunOutcome {
        match interrupt {
            Interrupt::Disconnect => {
                self.transition(session, FeedState::Closed);
                RunOutcome::Closed
            }
            Interrupt::Switch(next) => RunOutcome::Switch(next),
        }
    }

    fn transition(&self, session: &mut FeedSession, state: FeedState) {
        let from = session.state;
        session.state = state;
        info!(
            session = %session.id(),
            key = ?session.key().map(ToString::to_string),
            from = ?from,
            to = ?state,
            retry = session.retry_count,
            "feed state transition"
        );
        self.publish(session);
    }

    fn publish(&self, session: &FeedSession) {
        if let Some(status) = &self.status {
            status.send_replace(session.status());
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Await `fut` unless a command that ends the current subscription arrives
/// first. Commands that do not (re-subscribing to the same series) are
/// swallowed.
async fn interruptible<F>(
    key: &CandleKey,
    commands: &mut mpsc::Receiver<FeedCommand>,
    fut: F,
) -> Result<F::Output, Interrupt>
where
    F: Future,
{
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return Ok(out),
            command = commands.recv() => {
                if let Some(interrupt) = classify(key, command) {
                    return Err(interrupt);
                }
            }
        }
    }
}

/// A closed command channel counts as a disconnect.
fn classify(current: &CandleKey, command: Option<FeedCommand>) -> Option<Interrupt> {
    match command {
        Some(FeedCommand::Subscribe(key)) if &key == current => {
            debug!(key = %key, "already subscribed");
            None
        }
        Some(FeedCommand::Subscribe(key)) => Some(Interrupt::Switch(key)),
        Some(FeedCommand::Disconnect) | None => Some(Interrupt::Disconnect),
    }
}

/// Parse one push payload and apply it. Bad payloads are dropped; the
/// connection stays up.
fn apply_message(key: &CandleKey, store: &mut CandleStore, text: &str) {
    let update = match parse_kline_message(text) {
        Ok(update) => update,
        Err(e) => {
            warn!(key = %key, error = %e, "dropping malformed kline message");
            return;
        }
    };

    if update.symbol != key.symbol || update.interval != key.timeframe.as_str() {
        debug!(
            key = %key,
            symbol = %update.symbol,
            interval = %update.interval,
            "dropping kline for another series"
        );
        return;
    }

    match store.apply_update(update.candle) {
        Ok(kind) => debug!(
            key = %key,
            time = update.candle.time,
            close = update.candle.close,
            closed = update.is_closed,
            kind = ?kind,
            "candle update"
        ),
        Err(e) => warn!(key = %key, error = %e, "dropping kline update"),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use parking_lot::Mutex;

    use super::*;
    use crate::feed::FeedController;
    use crate::market_data::Candle;
    use crate::types::Timeframe;

    // --- Scripted collaborators ----------------------------------------------

    #[derive(Clone, Default)]
    struct ScriptedSnapshots {
        failures_left: Arc<AtomicUsize>,
        calls: Arc<Mutex<Vec<CandleKey>>>,
    }

    impl ScriptedSnapshots {
        fn failing_first(n: usize) -> Self {
            let s = Self::default();
            s.failures_left.store(n, Ordering::SeqCst);
            s
        }

        fn calls(&self) -> Vec<CandleKey> {
            self.calls.lock().clone()
        }
    }

    impl SnapshotSource for ScriptedSnapshots {
        async fn fetch_snapshot(&self, key: &CandleKey, _limit: usize) -> Result<Vec<Candle>> {
            self.calls.lock().push(key.clone());
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                bail!("snapshot endpoint unavailable");
            }
            Ok((0..3).map(|i| bar(i * 3600, 100.0 + i as f64)).collect())
        }
    }

    enum Script {
        Fail,
        /// Yield the messages, then either end (remote close) or hang.
        Stream { messages: Vec<String>, hang: bool },
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport {
        scripts: Arc<Mutex<VecDeque<Script>>>,
        opened: Arc<Mutex<Vec<CandleKey>>>,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(scripts.into())),
                ..Self::default()
            }
        }

        fn opens(&self) -> usize {
            self.opened.lock().len()
        }
    }

    struct ScriptedStream {
        messages: VecDeque<String>,
        hang: bool,
        closed: Arc<AtomicUsize>,
    }

    impl PushTransport for ScriptedTransport {
        type Stream = ScriptedStream;

        async fn open(&self, key: &CandleKey) -> Result<ScriptedStream> {
            self.opened.lock().push(key.clone());
            // An exhausted script keeps failing.
            let script = self.scripts.lock().pop_front().unwrap_or(Script::Fail);
            match script {
                Script::Fail => bail!("connection refused"),
                Script::Stream { messages, hang } => Ok(ScriptedStream {
                    messages: messages.into(),
                    hang,
                    closed: Arc::clone(&self.closed),
                }),
            }
        }
    }

    impl KlineStream for ScriptedStream {
        async fn next_message(&mut self) -> Option<Result<String>> {
            if let Some(message) = self.messages.pop_front() {
                return Some(Ok(message));
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            None
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    // --- Fixtures ------------------------------------------------------------

    fn bar(time: i64, close: f64) -> Candle {
        Candle::new(time, close, close + 1.0, close - 1.0, close, 10.0)
    }

    fn btc() -> CandleKey {
        CandleKey::new("BTCUSDT", Timeframe::OneHour)
    }

    fn eth() -> CandleKey {
        CandleKey::new("ETHUSDT", Timeframe::OneHour)
    }

    fn kline(symbol: &str, interval: &str, open_secs: i64, close: f64) -> String {
        serde_json::json!({
            "e": "kline",
            "s": symbol,
            "k": {
                "t": open_secs * 1000,
                "i": interval,
                "o": close.to_string(),
                "h": (close + 1.0).to_string(),
                "l": (close - 1.0).to_string(),
                "c": close.to_string(),
                "v": "5.0",
                "x": false
            }
        })
        .to_string()
    }

    fn settings(max: u32, base_ms: u64) -> FeedSettings {
        FeedSettings {
            snapshot_limit: 500,
            max_reconnect_attempts: max,
            reconnect_base_delay: Duration::from_millis(base_ms),
        }
    }

    fn manager(
        snapshots: &ScriptedSnapshots,
        transport: &ScriptedTransport,
        settings: FeedSettings,
    ) -> (FeedManager<ScriptedSnapshots, ScriptedTransport>, watch::Receiver<FeedStatus>) {
        let (tx, rx) = watch::channel(FeedSession::new().status());
        let manager = FeedManager::new(snapshots.clone(), transport.clone(), settings).with_status(tx);
        (manager, rx)
    }

    // --- Pure helpers --------------------------------------------------------

    #[test]
    fn backoff_is_linear() {
        let base = Duration::from_millis(2000);
        assert_eq!(backoff_delay(1, base), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, base), Duration::from_millis(6000));
        assert_eq!(backoff_delay(5, base), Duration::from_millis(10_000));
    }

    #[test]
    fn foreign_and_bad_messages_leave_store_untouched() {
        let mut store = CandleStore::new(100);
        store.initialize((0..3).map(|i| bar(i * 3600, 100.0)).collect()).unwrap();
        let before = store.snapshot();

        apply_message(&btc(), &mut store, &kline("ETHUSDT", "1h", 10_800, 1.0));
        apply_message(&btc(), &mut store, &kline("BTCUSDT", "5m", 10_800, 1.0));
        apply_message(&btc(), &mut store, "{not json");
        apply_message(&btc(), &mut store, &kline("BTCUSDT", "1h", 0, 1.0));
        assert_eq!(store.snapshot(), before);

        apply_message(&btc(), &mut store, &kline("BTCUSDT", "1h", 10_800, 101.0));
        assert_eq!(store.len(), 4);
        assert_eq!(store.last().unwrap().time, 10_800);
    }

    // --- State machine -------------------------------------------------------

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![]);
        let (manager, status) = manager(&snapshots, &transport, settings(5, 1));
        let (_controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let err = manager
            .subscribe(&mut session, btc(), &mut store, &mut commands)
            .await
            .unwrap_err();

        match err {
            FeedError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 5),
        }
        // First attempt plus five retries, then nothing more.
        assert_eq!(transport.opens(), 6);
        assert_eq!(session.state(), FeedState::Failed);
        assert_eq!(status.borrow().state, FeedState::Failed);
        // The snapshot loaded on the first attempt and was not re-fetched.
        assert_eq!(snapshots.calls().len(), 1);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn zero_budget_fails_on_first_error() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![Script::Fail]);
        let (manager, _status) = manager(&snapshots, &transport, settings(0, 1));
        let (_controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        assert!(manager
            .subscribe(&mut session, btc(), &mut store, &mut commands)
            .await
            .is_err());
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn live_messages_reach_the_store_until_remote_close() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![Script::Stream {
            messages: vec![
                kline("BTCUSDT", "1h", 7200, 150.0),   // replaces last
                kline("BTCUSDT", "1h", 10_800, 151.0), // appends
                "garbage".to_string(),
                kline("ETHUSDT", "1h", 14_400, 1.0),
            ],
            hang: false,
        }]);
        let (manager, _status) = manager(&snapshots, &transport, settings(0, 1));
        let (_controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let result = manager
            .subscribe(&mut session, btc(), &mut store, &mut commands)
            .await;

        assert!(result.is_err());
        let candles = store.snapshot();
        assert_eq!(candles.len(), 4);
        assert_eq!(candles[2].close, 150.0);
        assert_eq!(candles[3].time, 10_800);
        assert!(session.last_error().unwrap().contains("closed by remote"));
    }

    #[tokio::test]
    async fn snapshot_failures_are_retried_then_disconnect_closes() {
        let snapshots = ScriptedSnapshots::failing_first(2);
        let transport = ScriptedTransport::new(vec![Script::Stream {
            messages: vec![],
            hang: true,
        }]);
        let (manager, mut status) = manager(&snapshots, &transport, settings(5, 1));
        let (controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let driver = tokio::spawn(async move {
            status.wait_for(|s| s.state == FeedState::Live).await.unwrap();
            controller.disconnect().await.unwrap();
        });

        manager
            .subscribe(&mut session, btc(), &mut store, &mut commands)
            .await
            .unwrap();
        driver.await.unwrap();

        assert_eq!(snapshots.calls().len(), 3);
        assert_eq!(transport.opens(), 1);
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), FeedState::Closed);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn retry_counter_resets_after_reaching_live() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![
            Script::Fail,
            Script::Fail,
            Script::Stream { messages: vec![], hang: false },
            Script::Fail,
            Script::Stream { messages: vec![], hang: true },
        ]);
        // Without the reset the fourth open would exhaust a budget of two.
        let (manager, mut status) = manager(&snapshots, &transport, settings(2, 1));
        let (controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let opened = Arc::clone(&transport.opened);
        let driver = tokio::spawn(async move {
            status
                .wait_for(|s| s.state == FeedState::Live && opened.lock().len() == 5)
                .await
                .unwrap();
            controller.disconnect().await.unwrap();
        });

        manager
            .subscribe(&mut session, btc(), &mut store, &mut commands)
            .await
            .unwrap();
        driver.await.unwrap();

        assert_eq!(transport.opens(), 5);
        assert_eq!(session.state(), FeedState::Closed);
        assert_eq!(session.retry_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_cancels_pending_backoff() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![]);
        let (manager, mut status) = manager(&snapshots, &transport, settings(5, 60_000));
        let (controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let driver = tokio::spawn(async move {
            status.wait_for(|s| s.state == FeedState::Reconnecting).await.unwrap();
            controller.disconnect().await.unwrap();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            manager.subscribe(&mut session, btc(), &mut store, &mut commands),
        )
        .await
        .expect("backoff was not cancelled");
        driver.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(transport.opens(), 1);
        assert_eq!(session.state(), FeedState::Closed);
    }

    #[tokio::test]
    async fn switching_series_closes_old_stream_first() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![
            Script::Stream { messages: vec![], hang: true },
            Script::Stream { messages: vec![], hang: true },
        ]);
        let (manager, mut status) = manager(&snapshots, &transport, settings(5, 1));
        let (controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let closed = Arc::clone(&transport.closed);
        let driver = tokio::spawn(async move {
            status
                .wait_for(|s| s.state == FeedState::Live && s.key == Some(btc()))
                .await
                .unwrap();
            // Same series: ignored.
            controller.subscribe(btc()).await.unwrap();
            controller.subscribe(eth()).await.unwrap();
            status
                .wait_for(|s| s.state == FeedState::Live && s.key == Some(eth()))
                .await
                .unwrap();
            // The BTC stream was closed before the ETH one went live.
            assert_eq!(closed.load(Ordering::SeqCst), 1);
            controller.disconnect().await.unwrap();
        });

        manager
            .subscribe(&mut session, btc(), &mut store, &mut commands)
            .await
            .unwrap();
        driver.await.unwrap();

        assert_eq!(*transport.opened.lock(), vec![btc(), eth()]);
        assert_eq!(snapshots.calls(), vec![btc(), eth()]);
        assert_eq!(transport.closed.load(Ordering::SeqCst), 2);
        assert_eq!(session.key(), Some(&eth()));
    }

    #[tokio::test]
    async fn failed_session_restarts_on_fresh_subscribe() {
        let snapshots = ScriptedSnapshots::default();
        let transport = ScriptedTransport::new(vec![
            Script::Fail,
            Script::Stream { messages: vec![], hang: true },
        ]);
        let (manager, mut status) = manager(&snapshots, &transport, settings(0, 1));
        let (controller, mut commands) = FeedController::channel(8);
        let mut session = FeedSession::new();
        let mut store = CandleStore::new(100);

        let driver = tokio::spawn(async move {
            status.wait_for(|s| s.state == FeedState::Failed).await.unwrap();
            controller.subscribe(btc()).await.unwrap();
            status.wait_for(|s| s.state == FeedState::Live).await.unwrap();
            // Dropping the last controller stops the feed.
        });

        manager
            .run(&mut session, &mut store, &mut commands, Some(btc()))
            .await;
        driver.await.unwrap();

        assert_eq!(transport.opens(), 2);
        assert_eq!(session.state(), FeedState::Closed);
    }
}
