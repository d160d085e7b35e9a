use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{SignalFeed, SignalQuery};
use crate::config::SharedConfig;
use crate::error::{ApiError, TransportError};
use crate::models::SignalSource;
use crate::store::{SharedStore, UpsertOutcome};
use crate::transport::{RealtimeClient, RealtimeEvent};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Completion of one `mark_delivered` call.
#[derive(Debug)]
pub struct DeliveryReceipt {
    pub id: String,
    pub result: Result<(), ApiError>,
}

impl DeliveryReceipt {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Long-running daemon: keeps the push session up, falls back to polling
/// the REST feed while it is down, and acknowledges every new signal.
/// A session that failed to open or gave up reconnecting is dialed again
/// on each poll tick.
pub struct SignalRelay {
    config: SharedConfig,
    store: SharedStore,
    client: RealtimeClient,
    feed: Arc<dyn SignalFeed>,
    events: broadcast::Receiver<RealtimeEvent>,
    deliveries: JoinSet<DeliveryReceipt>,
    delivered: usize,
    delivery_failures: usize,
    polls: usize,
}

impl SignalRelay {
    pub fn new(
        config: SharedConfig,
        store: SharedStore,
        client: RealtimeClient,
        feed: Arc<dyn SignalFeed>,
    ) -> Self {
        let events = client.subscribe();
        Self {
            config,
            store,
            client,
            feed,
            events,
            deliveries: JoinSet::new(),
            delivered: 0,
            delivery_failures: 0,
            polls: 0,
        }
    }

    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut RealtimeClient {
        &mut self.client
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn delivery_failures(&self) -> usize {
        self.delivery_failures
    }

    pub fn pending_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    pub async fn run(&mut self) -> Result<()> {
        let (poll_every, status_every, ws_url) = {
            let cfg = self.config.read().await;
            (cfg.poll_interval(), cfg.status_interval(), cfg.ws_url.clone())
        };

        info!("{}", "=".repeat(60));
        info!("Signal relay starting up");
        info!("Feed: {}", ws_url);
        info!("Polling fallback every {:?}", poll_every);
        info!("{}", "=".repeat(60));

        match self.client.connect().await {
            Ok(()) => {}
            Err(TransportError::MissingToken) => {
                warn!("No auth token configured, running on polling only");
            }
            Err(e) => {
                warn!("Initial connect failed ({}), polling until the feed is back", e);
            }
        }

        let mut poll = interval(poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status = interval(status_every);
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Relay is now running. Press Ctrl+C to stop.");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown().await;
                    return Ok(());
                }
                event = self.events.recv() => match event {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(n)) => warn!("Relay lagged, {} events dropped", n),
                    Err(RecvError::Closed) => {
                        error!("Realtime event channel closed");
                        self.shutdown().await;
                        return Ok(());
                    }
                },
                _ = poll.tick() => {
                    self.redial().await;
                    if !self.client.is_connected() {
                        if let Err(e) = self.poll_once().await {
                            warn!("Poll failed: {}", e);
                        }
                    }
                }
                _ = status.tick() => self.print_status().await,
                Some(joined) = self.deliveries.join_next(), if !self.deliveries.is_empty() => {
                    self.record_receipt(joined);
                }
            }
        }
    }

    /// Wait for the next transport event and act on it.
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.handle_event(&event);
                    return Some(event);
                }
                Err(RecvError::Lagged(n)) => warn!("Relay lagged, {} events dropped", n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn handle_event(&mut self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::NewSignal { signal, outcome } => {
                if *outcome == UpsertOutcome::Inserted {
                    self.track_delivery(signal.id.clone());
                } else {
                    debug!("Signal {} already held ({:?}), not acknowledged again", signal.id, outcome);
                }
            }
            RealtimeEvent::SignalUpdated(update) => {
                debug!("Relay saw update for {}", update.id);
            }
            RealtimeEvent::Connected => info!("Push feed live, polling paused"),
            RealtimeEvent::Disconnected { reason } => {
                info!("Push feed down ({}), polling fallback active", reason);
            }
            RealtimeEvent::ConnectError { error, attempt } => {
                debug!("Connect error on attempt {}: {}", attempt, error);
            }
            RealtimeEvent::ReconnectExhausted { attempts } => {
                warn!(
                    "Push feed gave up after {} attempts, continuing on polling only",
                    attempts
                );
            }
            RealtimeEvent::Pong { latency_ms } => debug!("Feed latency {}ms", latency_ms),
        }
    }

    /// Dial the push feed again when the client is idle and was not closed
    /// on purpose. Returns whether the session is up afterwards.
    pub async fn redial(&mut self) -> bool {
        if !self.client.wants_redial() {
            return self.client.is_connected();
        }
        match self.client.connect().await {
            Ok(()) => {
                info!("Push feed re-established");
                true
            }
            Err(TransportError::MissingToken) => false,
            Err(e) => {
                debug!("Redial failed: {}", e);
                false
            }
        }
    }

    /// Acknowledge `id` on a tracked task. The outcome arrives later as a
    /// `DeliveryReceipt`.
    pub fn track_delivery(&mut self, id: String) {
        let feed = Arc::clone(&self.feed);
        self.deliveries.spawn(async move {
            let result = feed.mark_delivered(&id).await;
            DeliveryReceipt { id, result }
        });
    }

    fn record_receipt(
        &mut self,
        joined: Result<DeliveryReceipt, JoinError>,
    ) -> Option<DeliveryReceipt> {
        match joined {
            Ok(receipt) => {
                match &receipt.result {
                    Ok(()) => {
                        self.delivered += 1;
                        debug!("Signal {} marked delivered", receipt.id);
                    }
                    Err(e) => {
                        self.delivery_failures += 1;
                        warn!("Failed to mark {} delivered: {}", receipt.id, e);
                    }
                }
                Some(receipt)
            }
            Err(e) => {
                self.delivery_failures += 1;
                error!("Delivery task failed: {}", e);
                None
            }
        }
    }

    /// Wait for outstanding delivery tasks, up to `limit`. Tasks still
    /// running after that are aborted.
    pub async fn drain_deliveries(&mut self, limit: Duration) -> Vec<DeliveryReceipt> {
        let mut receipts = Vec::new();
        let drained = timeout(limit, async {
            while let Some(joined) = self.deliveries.join_next().await {
                if let Some(r) = self.record_receipt(joined) {
                    receipts.push(r);
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                "{} delivery acknowledgements still pending, aborting",
                self.deliveries.len()
            );
            self.deliveries.abort_all();
        }
        receipts
    }

    /// Fetch signals newer than the newest one held locally and store them.
    /// Returns how many were new.
    pub async fn poll_once(&mut self) -> Result<usize, ApiError> {
        self.polls += 1;
        let since = self.newest_created_at().await;
        let signals = self.feed.fetch_signals(&SignalQuery::since(since)).await?;
        if signals.is_empty() {
            debug!("Poll #{}: nothing new", self.polls);
            return Ok(0);
        }

        let mut inserted = Vec::new();
        {
            let mut store = self.store.write().await;
            for signal in signals {
                let id = signal.id.clone();
                if store.store(signal, SignalSource::Api) == UpsertOutcome::Inserted {
                    inserted.push(id);
                }
            }
        }

        info!("Poll #{}: {} new signal(s)", self.polls, inserted.len());
        let count = inserted.len();
        for id in inserted {
            self.track_delivery(id);
        }
        Ok(count)
    }

    async fn newest_created_at(&self) -> Option<DateTime<Utc>> {
        self.store
            .read()
            .await
            .get_all()
            .iter()
            .filter_map(|s| s.created_at)
            .max()
    }

    pub async fn print_status(&self) {
        let stats = self.store.read().await.stats();
        info!("Feed: {}", self.client.state());
        info!(
            "Signals: {} (active {}, completed {}, archived {})",
            stats.total, stats.active, stats.completed, stats.archived
        );
        info!(
            "Wins: {} | Losses: {} | Win Rate: {}%",
            stats.wins, stats.losses, stats.win_rate
        );
        info!("PnL: {:+.2}", stats.total_pnl);
        info!(
            "Delivered: {} | Failed: {} | Pending: {}",
            self.delivered,
            self.delivery_failures,
            self.deliveries.len()
        );
    }

    pub async fn shutdown(&mut self) {
        info!("Shutting down...");
        self.client.disconnect().await;
        let receipts = self.drain_deliveries(DRAIN_TIMEOUT).await;
        if !receipts.is_empty() {
            info!("Drained {} delivery acknowledgement(s)", receipts.len());
        }
        self.print_status().await;
        info!("Relay stopped.");
    }
}
