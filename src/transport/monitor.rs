//! Per-socket resilience unit.
//!
//! A [`ConnectionMonitor`] owns one physical socket to the endpoint and keeps
//! it alive: circuit breaker, exponential backoff and heartbeat.
//!
//! # Event Loop
//!
//! The monitor spawns a tokio task that handles, one at a time:
//!
//! - Commands from the handle (connect, send, close)
//! - Typed socket events from the transport
//! - Heartbeat ticks
//! - The pending reconnect timer
//!
//! No two of these ever run concurrently for the same monitor, so the task
//! owns all state without locks. Handles only see a published
//! [`MonitorStatus`] snapshot.
//!
//! # Reconnect
//!
//! ```text
//! Closed/Errored ─► record_failure ─► schedule_reconnect ─► sleep(backoff + jitter)
//!                                                                 │
//!            replay hook ◄─ Opened ◄─ open socket ◄─ breaker admits
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep};
use tracing::{debug, error, info, trace, warn};

use crate::config::MonitorOptions;
use crate::error::{Error, Result};
use crate::identifiers::MonitorId;
use crate::protocol::SocketEvent;

use super::breaker::{Admission, Backoff, BreakerState, CircuitBreaker};
use super::socket::{Connector, EventSink, Socket, TaggedEvent};

// ============================================================================
// Types
// ============================================================================

/// Handler invoked for every inbound frame of a monitor.
pub type FrameHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Callback run after a monitor's socket reopens following a disconnect.
///
/// It runs in its own task so the monitor keeps handling events meanwhile.
/// The monitor aborts it if the socket drops again or the monitor closes.
#[async_trait]
pub trait ReconnectHook: Send + Sync + 'static {
    /// Called with the freshly opened socket.
    async fn on_reconnect(&self, monitor: MonitorId, socket: Arc<dyn Socket>);
}

// ============================================================================
// MonitorStatus
// ============================================================================

/// Snapshot of a monitor's state, published after every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorStatus {
    /// Circuit breaker state.
    pub breaker: BreakerState,
    /// Failures since the last successful open.
    pub failure_count: u32,
    /// Reconnect attempts since the last successful open.
    pub retry_count: u32,
    /// Socket is open and usable.
    pub is_open: bool,
    /// Last liveness probe was answered.
    pub is_alive: bool,
    /// A reconnect is scheduled.
    pub reconnecting: bool,
    /// Retries are exhausted; the monitor no longer reconnects on its own.
    pub exhausted: bool,
    /// Sockets opened so far, including failed ones.
    pub connect_attempts: u64,
    /// The monitor has been closed.
    pub closed: bool,
}

// ============================================================================
// MonitorCommand
// ============================================================================

/// Internal commands for the event loop.
enum MonitorCommand {
    /// Open the socket and report once it is open.
    Connect { reply: oneshot::Sender<Result<()>> },
    /// Send a text frame on the open socket.
    Send {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Close the socket and stop the monitor.
    Close,
}

// ============================================================================
// ConnectionMonitor
// ============================================================================

/// Handle to a monitor task owning one socket.
///
/// Cheap to clone; all clones drive the same task. The message handler and
/// reconnect hook are bound at construction, before any socket exists.
#[derive(Clone)]
pub struct ConnectionMonitor {
    id: MonitorId,
    url: Arc<str>,
    command_tx: mpsc::UnboundedSender<MonitorCommand>,
    status_rx: watch::Receiver<MonitorStatus>,
}

impl fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionMonitor {
    /// Creates a monitor and spawns its event loop.
    ///
    /// No socket is opened until [`connect`](Self::connect) is called.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        url: impl Into<Arc<str>>,
        options: MonitorOptions,
        connector: Arc<dyn Connector>,
        on_message: FrameHandler,
        on_reconnect: Arc<dyn ReconnectHook>,
    ) -> Self {
        let id = MonitorId::next();
        let url = url.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(MonitorStatus::default());

        let task = MonitorTask {
            id,
            url: Arc::clone(&url),
            options,
            connector,
            on_message,
            on_reconnect,
            breaker: CircuitBreaker::from(&options),
            backoff: Backoff::from(&options),
            retry_count: 0,
            is_alive: false,
            exhausted: false,
            has_opened: false,
            retrying: false,
            socket: None,
            socket_open: false,
            generation: 0,
            connect_attempts: 0,
            waiters: Vec::new(),
            heartbeat: None,
            reconnect_timer: None,
            replay: None,
            event_tx,
            status_tx,
        };

        tokio::spawn(task.run(command_rx, event_rx));

        debug!(monitor = %id, url = %url, "Connection monitor spawned");

        Self {
            id,
            url,
            command_tx,
            status_rx,
        }
    }

    /// Returns the monitor's identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> MonitorId {
        self.id
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens the socket and waits until it is open.
    ///
    /// Returns `Ok(())` without opening anything if the socket is already
    /// open or the circuit breaker is still open.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the socket cannot be built or closes before opening
    /// - [`Error::MonitorStopped`] if the monitor was closed
    pub async fn connect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(MonitorCommand::Connect { reply })
            .map_err(|_| Error::MonitorStopped)?;
        rx.await.map_err(|_| Error::MonitorStopped)?
    }

    /// Sends a text frame on the open socket.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] if the socket is not open
    /// - [`Error::ConnectionClosed`] if the transport already shut down
    /// - [`Error::MonitorStopped`] if the monitor was closed
    pub async fn send_text(&self, text: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(MonitorCommand::Send { text, reply })
            .map_err(|_| Error::MonitorStopped)?;
        rx.await.map_err(|_| Error::MonitorStopped)?
    }

    /// Closes the socket and stops the monitor.
    ///
    /// Cancels any pending reconnect, heartbeat and replay.
    pub fn close(&self) {
        let _ = self.command_tx.send(MonitorCommand::Close);
    }

    /// Returns the latest status snapshot.
    #[inline]
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        *self.status_rx.borrow()
    }

    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status_rx.borrow().is_open
    }

    /// Waits until the status satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MonitorStopped`] if the monitor stops first.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<MonitorStatus>
    where
        F: FnMut(&MonitorStatus) -> bool,
    {
        let mut rx = self.status_rx.clone();
        let status = rx
            .wait_for(predicate)
            .await
            .map_err(|_| Error::MonitorStopped)?;
        Ok(*status)
    }
}

// ============================================================================
// MonitorTask
// ============================================================================

/// State owned by the monitor's event loop.
struct MonitorTask {
    id: MonitorId,
    url: Arc<str>,
    options: MonitorOptions,
    connector: Arc<dyn Connector>,
    on_message: FrameHandler,
    on_reconnect: Arc<dyn ReconnectHook>,

    breaker: CircuitBreaker,
    backoff: Backoff,
    retry_count: u32,
    is_alive: bool,
    exhausted: bool,
    /// Set after the first successful open; later opens trigger the hook.
    has_opened: bool,
    /// Current generation was opened by the reconnect timer.
    retrying: bool,

    /// Current socket, open or still handshaking.
    socket: Option<Arc<dyn Socket>>,
    socket_open: bool,
    /// Generation of `socket`; events from other generations are stale.
    generation: u64,
    connect_attempts: u64,

    /// Callers of `connect()` waiting for the in-flight handshake.
    waiters: Vec<oneshot::Sender<Result<()>>>,
    heartbeat: Option<Interval>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    replay: Option<JoinHandle<()>>,

    event_tx: mpsc::UnboundedSender<TaggedEvent>,
    status_tx: watch::Sender<MonitorStatus>,
}

impl MonitorTask {
    /// Event loop.
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<MonitorCommand>,
        mut event_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    ) {
        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(MonitorCommand::Connect { reply }) => self.handle_connect(reply),

                        Some(MonitorCommand::Send { text, reply }) => {
                            let _ = reply.send(self.handle_send(text));
                        }

                        Some(MonitorCommand::Close) | None => {
                            self.shutdown();
                            break;
                        }
                    }
                }

                Some((generation, event)) = event_rx.recv() => {
                    self.dispatch(generation, event);
                }

                () = next_tick(&mut self.heartbeat) => {
                    self.on_heartbeat();
                }

                () = expire(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.on_reconnect_timer();
                }
            }

            self.publish_status();
        }

        debug!(monitor = %self.id, "Monitor event loop terminated");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Handles an explicit `connect()` call.
    fn handle_connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.socket_open {
            let _ = reply.send(Ok(()));
            return;
        }

        // Handshake already in flight: wait for it instead of opening another.
        if self.socket.is_some() {
            self.waiters.push(reply);
            return;
        }

        if let Admission::Suppressed { remaining } = self.breaker.admit(Instant::now()) {
            warn!(
                monitor = %self.id,
                remaining_ms = remaining.as_millis() as u64,
                "Circuit breaker is OPEN, skipping connection attempt"
            );
            let _ = reply.send(Ok(()));
            return;
        }

        self.open_socket(Some(reply));
    }

    /// Handles a send request.
    fn handle_send(&self, text: String) -> Result<()> {
        match &self.socket {
            Some(socket) if self.socket_open => {
                trace!(monitor = %self.id, len = text.len(), "Sending frame");
                socket.send_text(text)
            }
            _ => Err(Error::not_ready(&*self.url)),
        }
    }

    /// Closes everything and fails pending callers.
    fn shutdown(&mut self) {
        self.stop_heartbeat();
        self.abort_replay();
        self.reconnect_timer = None;

        if let Some(socket) = self.socket.take() {
            socket.close();
        }
        self.socket_open = false;

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(Error::MonitorStopped));
        }

        let mut status = self.snapshot();
        status.closed = true;
        self.status_tx.send_replace(status);

        info!(monitor = %self.id, url = %self.url, "Connection monitor closed");
    }

    // ========================================================================
    // Socket Lifecycle
    // ========================================================================

    /// Opens a new socket generation.
    ///
    /// Opens without a waiter come from the reconnect timer and run the
    /// reconnect hook once open, even if no earlier socket ever opened.
    fn open_socket(&mut self, waiter: Option<oneshot::Sender<Result<()>>>) {
        self.generation += 1;
        self.connect_attempts += 1;
        self.retrying = waiter.is_none();

        info!(
            monitor = %self.id,
            url = %self.url,
            generation = self.generation,
            "Connecting"
        );

        let sink = EventSink::new(self.generation, self.event_tx.clone());
        match self.connector.open(&self.url, sink) {
            Ok(socket) => {
                self.socket = Some(socket);
                self.waiters.extend(waiter);
            }
            Err(e) => {
                error!(monitor = %self.id, error = %e, "Socket construction failed");
                self.record_failure();
                self.schedule_reconnect();
                self.publish_status();
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(e));
                }
            }
        }
    }

    /// Routes one socket event.
    fn dispatch(&mut self, generation: u64, event: SocketEvent) {
        if generation != self.generation {
            trace!(
                monitor = %self.id,
                generation,
                current = self.generation,
                kind = event.kind(),
                "Dropping stale socket event"
            );
            return;
        }

        match event {
            SocketEvent::Opened => self.on_opened(),
            SocketEvent::Closed { code } => {
                warn!(monitor = %self.id, code, "Connection closed");
                self.on_socket_lost(format!("socket closed with code {code}"));
            }
            SocketEvent::Errored { cause } => {
                error!(monitor = %self.id, cause = %cause, "Socket error");
                self.on_socket_lost(cause);
            }
            SocketEvent::Message { bytes } => (self.on_message)(&bytes),
            SocketEvent::LivenessResponse => self.is_alive = true,
        }
    }

    /// Socket finished its handshake.
    fn on_opened(&mut self) {
        let Some(socket) = self.socket.clone() else {
            return;
        };
        let reconnected = self.has_opened || self.retrying;
        self.has_opened = true;

        self.breaker.record_success();
        self.socket_open = true;
        self.retry_count = 0;
        self.reconnect_timer = None;
        self.is_alive = true;
        self.exhausted = false;
        self.start_heartbeat();

        info!(monitor = %self.id, url = %self.url, reconnected, "Connected");

        // Publish before waking callers so they observe the open socket.
        self.publish_status();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }

        if reconnected {
            self.abort_replay();
            let hook = Arc::clone(&self.on_reconnect);
            let id = self.id;
            self.replay = Some(tokio::spawn(async move {
                hook.on_reconnect(id, socket).await;
            }));
        }
    }

    /// Socket closed or faulted.
    fn on_socket_lost(&mut self, reason: String) {
        self.socket = None;
        self.socket_open = false;
        self.stop_heartbeat();
        self.abort_replay();

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(Error::connection(reason.clone())));
        }

        self.record_failure();
        self.schedule_reconnect();
    }

    /// Reconnect timer fired.
    fn on_reconnect_timer(&mut self) {
        if self.socket.is_some() {
            return;
        }

        if let Admission::Suppressed { remaining } = self.breaker.admit(Instant::now()) {
            warn!(
                monitor = %self.id,
                remaining_ms = remaining.as_millis() as u64,
                "Circuit breaker is OPEN, deferring reconnect until recovery window ends"
            );
            self.reconnect_timer = Some(Box::pin(sleep(remaining)));
            return;
        }

        self.open_socket(None);
    }

    // ========================================================================
    // Failure Handling
    // ========================================================================

    /// Counts a failure against the circuit breaker.
    fn record_failure(&mut self) {
        let opened = self.breaker.record_failure(Instant::now());

        info!(
            monitor = %self.id,
            failures = self.breaker.failure_count(),
            threshold = self.options.failure_threshold,
            "Failure recorded"
        );

        if opened {
            error!(monitor = %self.id, "Circuit breaker OPENED due to repeated failures");
        }
    }

    /// Arms the reconnect timer with backoff, unless already armed or exhausted.
    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            return;
        }

        if self.retry_count >= self.options.max_retries {
            if !self.exhausted {
                self.exhausted = true;
                error!(
                    monitor = %self.id,
                    url = %self.url,
                    max_retries = self.options.max_retries,
                    "Reconnect attempts exhausted, giving up"
                );
            }
            return;
        }

        self.retry_count += 1;
        let delay = self.backoff.jittered_delay(self.retry_count);

        info!(
            monitor = %self.id,
            delay_ms = delay.as_millis() as u64,
            attempt = self.retry_count,
            max_retries = self.options.max_retries,
            "Reconnecting"
        );

        self.reconnect_timer = Some(Box::pin(sleep(delay)));
    }

    // ========================================================================
    // Heartbeat
    // ========================================================================

    /// (Re)starts the heartbeat; first tick one period from now.
    fn start_heartbeat(&mut self) {
        let period = self.options.ping_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(heartbeat);
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat = None;
    }

    /// Heartbeat tick: probe, or declare the connection dead.
    fn on_heartbeat(&mut self) {
        let Some(socket) = self.socket.clone().filter(|_| self.socket_open) else {
            self.stop_heartbeat();
            return;
        };

        if !self.is_alive {
            warn!(monitor = %self.id, "No liveness response, terminating connection");
            socket.terminate();
            // Late events from the terminated socket are ignored.
            self.generation += 1;
            self.on_socket_lost("liveness probe unanswered".to_string());
            return;
        }

        self.is_alive = false;
        if let Err(e) = socket.ping() {
            debug!(monitor = %self.id, error = %e, "Failed to queue liveness probe");
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn abort_replay(&mut self) {
        if let Some(replay) = self.replay.take() {
            replay.abort();
        }
    }

    fn snapshot(&self) -> MonitorStatus {
        MonitorStatus {
            breaker: self.breaker.state(),
            failure_count: self.breaker.failure_count(),
            retry_count: self.retry_count,
            is_open: self.socket_open,
            is_alive: self.is_alive,
            reconnecting: self.reconnect_timer.is_some(),
            exhausted: self.exhausted,
            connect_attempts: self.connect_attempts,
            closed: false,
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.snapshot());
    }
}

// ============================================================================
// Timer Helpers
// ============================================================================

/// Resolves on the next heartbeat tick; never resolves without a heartbeat.
async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

/// Resolves when the reconnect timer expires; never resolves without one.
async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::advance;

    use super::*;
    use crate::protocol::ABNORMAL_CLOSURE;
    use crate::transport::testing::{ScriptedConnector, settle};

    /// Hook that records the monitors it was called for.
    #[derive(Default)]
    struct CountingHook {
        calls: Mutex<Vec<MonitorId>>,
    }

    #[async_trait]
    impl ReconnectHook for CountingHook {
        async fn on_reconnect(&self, monitor: MonitorId, _socket: Arc<dyn Socket>) {
            self.calls.lock().push(monitor);
        }
    }

    fn options() -> MonitorOptions {
        MonitorOptions::new()
            .with_failure_threshold(5)
            .with_recovery_timeout(Duration::from_secs(60))
            .with_backoff(Duration::from_millis(1_000), Duration::from_millis(30_000))
            .with_ping_interval(Duration::from_secs(30))
            .with_max_retries(10)
            .with_jitter_max(Duration::ZERO)
    }

    fn spawn(
        options: MonitorOptions,
        connector: &Arc<ScriptedConnector>,
    ) -> (ConnectionMonitor, Arc<Mutex<Vec<Vec<u8>>>>, Arc<CountingHook>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        let hook = Arc::new(CountingHook::default());
        let monitor = ConnectionMonitor::spawn(
            "ws://node.test",
            options,
            Arc::clone(connector) as Arc<dyn Connector>,
            Arc::new(move |bytes: &[u8]| sink.lock().push(bytes.to_vec())),
            Arc::clone(&hook) as Arc<dyn ReconnectHook>,
        );
        (monitor, frames, hook)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_socket() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, _, hook) = spawn(options(), &connector);

        monitor.connect().await.expect("connect");

        let status = monitor.status();
        assert!(status.is_open);
        assert!(status.is_alive);
        assert_eq!(status.breaker, BreakerState::Closed);
        assert_eq!(status.connect_attempts, 1);
        assert_eq!(connector.open_count(), 1);
        // First open unblocks the caller only
        settle().await;
        assert!(hook.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_twice_reuses_open_socket() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, _, _) = spawn(options(), &connector);

        monitor.connect().await.unwrap();
        monitor.connect().await.unwrap();
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_failure_rejects_and_schedules_retry() {
        let connector = ScriptedConnector::manual();
        connector.fail_next_opens(1);
        let (monitor, _, _) = spawn(options(), &connector);

        let err = monitor.connect().await.unwrap_err();
        assert!(err.is_connection_error());

        let status = monitor.status();
        assert_eq!(status.failure_count, 1);
        assert_eq!(status.retry_count, 1);
        assert!(status.reconnecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_failed_first_connect_runs_hook() {
        let connector = ScriptedConnector::auto_open();
        connector.fail_next_opens(1);
        let (monitor, _, hook) = spawn(options(), &connector);

        assert!(monitor.connect().await.is_err());
        settle().await;
        assert!(hook.calls.lock().is_empty());

        advance(Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(connector.open_count(), 2);
        assert!(monitor.is_open());
        assert_eq!(hook.calls.lock().as_slice(), &[monitor.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_failure_rejects_waiter() {
        let connector = ScriptedConnector::manual();
        let (monitor, _, _) = spawn(options(), &connector);

        let pending = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.connect().await }
        });
        settle().await;

        connector.emit(0, SocketEvent::errored("connection refused"));
        connector.emit(0, SocketEvent::closed(ABNORMAL_CLOSURE));

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::Connection { .. })));

        settle().await;
        // Both the error and the close count as failures
        assert_eq!(monitor.status().failure_count, 2);
        assert_eq!(monitor.status().retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_reach_handler() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, frames, _) = spawn(options(), &connector);
        monitor.connect().await.unwrap();

        connector.emit(0, SocketEvent::message(&b"{\"id\":1,\"result\":5}"[..]));
        connector.emit(0, SocketEvent::message(&b"notification"[..]));
        settle().await;

        let frames = frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], b"notification");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_open_socket() {
        let connector = ScriptedConnector::manual();
        let (monitor, _, _) = spawn(options(), &connector);

        let err = monitor.send_text("{}".into()).await.unwrap_err();
        assert!(matches!(err, Error::NotReady { .. }));

        let connecting = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.connect().await }
        });
        settle().await;
        connector.emit(0, SocketEvent::Opened);
        connecting.await.unwrap().unwrap();

        monitor.send_text("hello".into()).await.unwrap();
        assert_eq!(connector.sent(0), vec!["hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_backoff_reconnect() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, _, hook) = spawn(options(), &connector);
        monitor.connect().await.unwrap();

        connector.emit(0, SocketEvent::closed(1001));
        settle().await;

        let status = monitor.status();
        assert!(!status.is_open);
        assert_eq!(status.failure_count, 1);
        assert!(status.reconnecting);

        // Attempt 1 waits base_delay
        advance(Duration::from_millis(999)).await;
        settle().await;
        assert_eq!(connector.open_count(), 1);

        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(connector.open_count(), 2);

        let status = monitor.status();
        assert!(status.is_open);
        assert_eq!(status.failure_count, 0);
        assert_eq!(status.retry_count, 0);
        assert_eq!(hook.calls.lock().as_slice(), &[monitor.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_between_failed_attempts() {
        let connector = ScriptedConnector::manual();
        let (monitor, _, _) = spawn(options().with_failure_threshold(100), &connector);

        let connecting = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.connect().await }
        });
        settle().await;
        connector.emit(0, SocketEvent::closed(ABNORMAL_CLOSURE));
        assert!(connecting.await.unwrap().is_err());

        // Retry n waits 1s, 2s, 4s
        for (attempt, delay_ms) in [(1usize, 1_000u64), (2, 2_000), (3, 4_000)] {
            advance(Duration::from_millis(delay_ms - 1)).await;
            settle().await;
            assert_eq!(connector.open_count(), attempt);

            advance(Duration::from_millis(1)).await;
            settle().await;
            assert_eq!(connector.open_count(), attempt + 1);

            connector.emit(attempt, SocketEvent::closed(ABNORMAL_CLOSURE));
            settle().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_and_suppresses_connect() {
        let connector = ScriptedConnector::manual();
        let (monitor, _, _) = spawn(options().with_failure_threshold(2), &connector);

        let connecting = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.connect().await }
        });
        settle().await;
        connector.emit(0, SocketEvent::Opened);
        connecting.await.unwrap().unwrap();

        // First close, then the retry's handshake also closes
        connector.emit(0, SocketEvent::closed(1001));
        settle().await;
        advance(Duration::from_millis(1_000)).await;
        settle().await;
        assert_eq!(connector.open_count(), 2);
        connector.emit(1, SocketEvent::closed(ABNORMAL_CLOSURE));
        settle().await;

        assert_eq!(monitor.status().breaker, BreakerState::Open);

        // Immediate connect is a no-op success
        monitor.connect().await.expect("suppressed connect succeeds");
        assert_eq!(connector.open_count(), 2);
        assert_eq!(monitor.status().breaker, BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_half_opens_after_recovery_timeout() {
        let connector = ScriptedConnector::manual();
        let opts = options()
            .with_failure_threshold(1)
            .with_recovery_timeout(Duration::from_secs(60))
            .with_max_retries(0);
        let (monitor, _, _) = spawn(opts, &connector);

        connector.fail_next_opens(1);
        assert!(monitor.connect().await.is_err());
        assert_eq!(monitor.status().breaker, BreakerState::Open);

        advance(Duration::from_secs(59)).await;
        monitor.connect().await.unwrap();
        assert_eq!(connector.open_count(), 1);

        advance(Duration::from_secs(1)).await;
        let connecting = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.connect().await }
        });
        settle().await;
        assert_eq!(connector.open_count(), 2);
        assert_eq!(monitor.status().breaker, BreakerState::HalfOpen);

        connector.emit(1, SocketEvent::Opened);
        connecting.await.unwrap().unwrap();
        assert_eq!(monitor.status().breaker, BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_deferred_while_breaker_open() {
        let connector = ScriptedConnector::manual();
        let opts = options()
            .with_failure_threshold(1)
            .with_recovery_timeout(Duration::from_secs(10));
        let (monitor, _, _) = spawn(opts, &connector);

        connector.fail_next_opens(1);
        assert!(monitor.connect().await.is_err());

        // Retry timer fires at 1s while the breaker is still open
        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(connector.open_count(), 1);
        assert!(monitor.status().reconnecting);

        advance(Duration::from_secs(9)).await;
        settle().await;
        assert_eq!(connector.open_count(), 2);
        assert_eq!(monitor.status().breaker, BreakerState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let connector = ScriptedConnector::manual();
        let opts = options().with_failure_threshold(100).with_max_retries(2);
        let (monitor, _, _) = spawn(opts, &connector);

        connector.fail_next_opens(3);
        assert!(monitor.connect().await.is_err());

        advance(Duration::from_secs(1)).await;
        settle().await;
        advance(Duration::from_secs(2)).await;
        settle().await;

        let status = monitor.status();
        assert_eq!(connector.open_count(), 3);
        assert!(status.exhausted);
        assert!(!status.reconnecting);

        advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(connector.open_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_probes_and_detects_dead_socket() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, _, _) = spawn(options(), &connector);
        monitor.connect().await.unwrap();

        // First tick: alive, so probe
        advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(connector.pings(0), 1);
        assert!(!monitor.status().is_alive);

        // Answered: second tick probes again
        connector.emit(0, SocketEvent::LivenessResponse);
        advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(connector.pings(0), 2);

        // Unanswered: third tick terminates
        advance(Duration::from_secs(30)).await;
        settle().await;
        assert!(connector.terminated(0));

        let status = monitor.status();
        assert!(!status.is_open);
        assert_eq!(status.failure_count, 1);
        assert!(status.reconnecting);

        // A late close from the terminated socket is ignored
        connector.emit(0, SocketEvent::closed(ABNORMAL_CLOSURE));
        settle().await;
        assert_eq!(monitor.status().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reconnect() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, _, _) = spawn(options(), &connector);
        monitor.connect().await.unwrap();

        connector.emit(0, SocketEvent::closed(1001));
        settle().await;
        assert!(monitor.status().reconnecting);

        monitor.close();
        settle().await;
        assert!(monitor.status().closed);

        advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(connector.open_count(), 1);
        assert!(matches!(monitor.connect().await, Err(Error::MonitorStopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_closes_socket_gracefully() {
        let connector = ScriptedConnector::auto_open();
        let (monitor, _, _) = spawn(options(), &connector);
        monitor.connect().await.unwrap();

        monitor.close();
        settle().await;
        assert!(connector.closed(0));
        assert!(!connector.terminated(0));
    }
}
