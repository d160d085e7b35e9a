use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::models::SignalSource;
use crate::store::{SharedStore, UpsertOutcome};
use crate::transport::backoff::Backoff;
use crate::transport::connector::{Connection, Connector};
use crate::transport::events::{
    ClientFrame, ConnectionState, PingPayload, RealtimeEvent, ServerFrame,
};

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub event_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws/signals".to_string(),
            connect_timeout: Duration::from_secs(20),
            reconnect_base: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
            event_capacity: 256,
        }
    }
}

impl RealtimeConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.reconnect_base,
            self.reconnect_max_delay,
            self.max_reconnect_attempts,
        )
    }
}

type Outbound = Arc<RwLock<Option<mpsc::UnboundedSender<String>>>>;

struct SessionHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Reconnecting push client. New and updated signals are written to the
/// shared store as they arrive and then fanned out to subscribers.
pub struct RealtimeClient {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    store: SharedStore,
    token: Option<String>,
    state: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<RealtimeEvent>,
    outbound: Outbound,
    session: Option<SessionHandle>,
    closed_by_caller: bool,
}

impl RealtimeClient {
    pub fn new(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        store: SharedStore,
        token: Option<String>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            connector,
            store,
            token,
            state: Arc::new(state),
            events,
            outbound: Arc::new(RwLock::new(None)),
            session: None,
            closed_by_caller: false,
        }
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Nothing is dialing and the caller never asked to stop: the last
    /// `connect()` failed or the reconnect loop gave up.
    pub fn wants_redial(&self) -> bool {
        !self.closed_by_caller
            && self.state() == ConnectionState::Disconnected
            && self.session.as_ref().map_or(true, |s| s.task.is_finished())
    }

    /// Open the session. A no-op while connected or connecting; fails
    /// before touching the network when no token is set.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        match self.state() {
            ConnectionState::Connected | ConnectionState::Connecting => {
                debug!("connect() ignored, already {}", self.state());
                return Ok(());
            }
            ConnectionState::Disconnected => {}
        }
        self.closed_by_caller = false;

        let token = match self.token.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(TransportError::MissingToken),
        };

        // A previous session may still be waiting out a backoff delay.
        self.stop_session().await;

        self.state.send_replace(ConnectionState::Connecting);
        info!("Connecting to signal feed at {}", self.config.url);

        let conn = match open(self.connector.as_ref(), &self.config, &token).await {
            Ok(c) => c,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!("Signal feed connect failed: {}", e);
                let _ = self.events.send(RealtimeEvent::ConnectError {
                    error: e.to_string(),
                    attempt: 0,
                });
                return Err(e);
            }
        };

        self.state.send_replace(ConnectionState::Connected);
        info!("Signal feed connected");
        let _ = self.events.send(RealtimeEvent::Connected);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = SessionWorker {
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
            token,
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            outbound: Arc::clone(&self.outbound),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run(conn));
        self.session = Some(SessionHandle { shutdown, task });
        Ok(())
    }

    /// Caller-initiated teardown. No reconnect follows.
    pub async fn disconnect(&mut self) {
        self.closed_by_caller = true;
        let had_session = self.session.is_some();
        self.stop_session().await;
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if had_session && previous != ConnectionState::Disconnected {
            info!("Signal feed disconnected by client");
            let _ = self.events.send(RealtimeEvent::Disconnected {
                reason: "client disconnect".to_string(),
            });
        }
    }

    async fn stop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.shutdown.send(true);
            if timeout(Duration::from_secs(5), &mut session.task).await.is_err() {
                warn!("Session task did not stop in time, aborting");
                session.task.abort();
            }
        }
        *self.outbound.write().await = None;
    }

    /// Liveness probe. The pong is informational only.
    pub async fn ping(&self) -> Result<(), TransportError> {
        let frame = ClientFrame::Ping(PingPayload {
            timestamp: Utc::now().timestamp_millis(),
        });
        let text = serde_json::to_string(&frame)?;
        let outbound = self.outbound.read().await;
        match outbound.as_ref() {
            Some(tx) => tx.send(text).map_err(|_| TransportError::NotConnected),
            None => Err(TransportError::NotConnected),
        }
    }
}

async fn open(
    connector: &dyn Connector,
    config: &RealtimeConfig,
    token: &str,
) -> Result<Connection, TransportError> {
    match timeout(config.connect_timeout, connector.connect(&config.url, token)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::ConnectTimeout(config.connect_timeout)),
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

enum SessionExit {
    Shutdown,
    Dropped(String),
}

struct SessionWorker {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    token: String,
    store: SharedStore,
    state: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<RealtimeEvent>,
    outbound: Outbound,
    shutdown: watch::Receiver<bool>,
}

impl SessionWorker {
    async fn run(mut self, mut conn: Connection) {
        let backoff = self.config.backoff();
        loop {
            *self.outbound.write().await = Some(conn.outbound.clone());

            let reason = match self.pump(&mut conn).await {
                SessionExit::Shutdown => return,
                SessionExit::Dropped(reason) => reason,
            };

            *self.outbound.write().await = None;
            self.state.send_replace(ConnectionState::Disconnected);
            warn!("Signal feed disconnected: {}", reason);
            self.emit(RealtimeEvent::Disconnected { reason });

            conn = match self.reconnect(&backoff).await {
                Some(c) => c,
                None => return,
            };
        }
    }

    async fn pump(&mut self, conn: &mut Connection) -> SessionExit {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return SessionExit::Shutdown,
                frame = conn.inbound.recv() => match frame {
                    Some(text) => self.handle_frame(&text).await,
                    None => return SessionExit::Dropped("connection closed".to_string()),
                },
            }
        }
    }

    async fn reconnect(&mut self, backoff: &Backoff) -> Option<Connection> {
        let mut attempt: u32 = 0;
        loop {
            let delay = match backoff.delay(attempt) {
                Some(d) => d,
                None => {
                    warn!("Giving up on signal feed after {} reconnect attempts", attempt);
                    self.emit(RealtimeEvent::ReconnectExhausted { attempts: attempt });
                    return None;
                }
            };
            attempt += 1;
            info!(
                "Reconnecting in {:?} (attempt {}/{})",
                delay, attempt, backoff.max_attempts
            );

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return None,
                _ = sleep(delay) => {}
            }

            self.state.send_replace(ConnectionState::Connecting);
            let result = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return None,
                r = open(self.connector.as_ref(), &self.config, &self.token) => r,
            };

            match result {
                Ok(conn) => {
                    self.state.send_replace(ConnectionState::Connected);
                    info!("Signal feed reconnected after {} attempt(s)", attempt);
                    self.emit(RealtimeEvent::Connected);
                    return Some(conn);
                }
                Err(e) => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    warn!("Reconnect attempt {} failed: {}", attempt, e);
                    self.emit(RealtimeEvent::ConnectError {
                        error: e.to_string(),
                        attempt,
                    });
                }
            }
        }
    }

    async fn handle_frame(&self, text: &str) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let preview: String = text.chars().take(200).collect();
            debug!("Frame: {}", preview);
        }

        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(f) => f,
            Err(e) => {
                debug!("Ignoring unrecognised frame: {}", e);
                return;
            }
        };

        match frame {
            ServerFrame::NewSignal(signal) => {
                let id = signal.id.clone();
                let (outcome, stored) = {
                    let mut store = self.store.write().await;
                    let outcome = store.store(signal.clone(), SignalSource::Websocket);
                    (outcome, store.get_by_id(&id).cloned())
                };
                let signal = stored.unwrap_or(signal);
                if outcome == UpsertOutcome::Inserted {
                    info!(
                        "New signal {}: {} {} @ {} (SL {}, TP {:?})",
                        signal.id,
                        signal.symbol,
                        signal.side,
                        signal.entry_price,
                        signal.stop_loss,
                        signal.take_profit.targets()
                    );
                } else {
                    debug!("Signal {} re-delivered: {:?}", id, outcome);
                }
                self.emit(RealtimeEvent::NewSignal { signal, outcome });
            }
            ServerFrame::SignalUpdated(update) => {
                let found = self.store.write().await.update_status(
                    &update.id,
                    update.status,
                    update.outcome,
                    update.pnl,
                );
                if found {
                    info!("Signal {} updated: {}", update.id, update.status);
                } else {
                    debug!("Update for unknown signal {}", update.id);
                }
                self.emit(RealtimeEvent::SignalUpdated(update));
            }
            ServerFrame::Connected(hello) => {
                info!(
                    "Server acknowledged session{}",
                    hello.message.map(|m| format!(": {}", m)).unwrap_or_default()
                );
            }
            ServerFrame::Pong(pong) => {
                let latency_ms = Utc::now().timestamp_millis() - pong.timestamp;
                debug!("Pong after {}ms", latency_ms);
                self.emit(RealtimeEvent::Pong { latency_ms });
            }
        }
    }

    fn emit(&self, event: RealtimeEvent) {
        let _ = self.events.send(event);
    }
}
