#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use signal_vault::api::{NewSignal, RemoteStats, SignalFeed, SignalQuery};
use signal_vault::error::ApiError;
use signal_vault::models::{Side, Signal};
use signal_vault::storage::MemoryStorage;
use signal_vault::store::{SignalStore, StoreConfig};
use signal_vault::transport::{RealtimeConfig, RealtimeEvent};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn make_signal(id: &str) -> Signal {
    Signal::new(id, "BTCUSD", Side::Buy, 46000.0, 45500.0, 48000.0)
}

pub fn make_signal_at(id: &str, created_at: &str) -> Signal {
    let mut s = make_signal(id);
    s.created_at = Some(ts(created_at));
    s
}

pub fn open_store(mem: &MemoryStorage) -> SignalStore {
    SignalStore::open(Box::new(mem.clone()), StoreConfig::default())
}

/// Millisecond-scale reconnect schedule so lifecycle tests stay fast.
pub fn fast_realtime_config() -> RealtimeConfig {
    RealtimeConfig {
        url: "loopback://signals".to_string(),
        connect_timeout: Duration::from_millis(100),
        reconnect_base: Duration::from_millis(5),
        reconnect_max_delay: Duration::from_millis(20),
        max_reconnect_attempts: 3,
        event_capacity: 128,
    }
}

pub async fn next_event(rx: &mut broadcast::Receiver<RealtimeEvent>) -> RealtimeEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for realtime event")
        .expect("event channel closed")
}

/// Skip events until one matches.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<RealtimeEvent>, mut pred: F) -> RealtimeEvent
where
    F: FnMut(&RealtimeEvent) -> bool,
{
    loop {
        let ev = next_event(rx).await;
        if pred(&ev) {
            return ev;
        }
    }
}

/// In-memory REST feed. Records every query and delivery acknowledgement.
#[derive(Default)]
pub struct MockFeed {
    pub signals: Mutex<Vec<Signal>>,
    pub queries: Mutex<Vec<SignalQuery>>,
    pub delivered: Mutex<Vec<String>>,
    pub fail_delivery: Mutex<HashSet<String>>,
    pub archived: Mutex<Vec<String>>,
}

impl MockFeed {
    pub fn with_signals(signals: Vec<Signal>) -> Self {
        Self {
            signals: Mutex::new(signals),
            ..Default::default()
        }
    }

    pub fn push(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }

    pub fn fail_delivery_of(&self, id: &str) {
        self.fail_delivery.lock().unwrap().insert(id.to_string());
    }

    pub fn delivered(&self) -> Vec<String> {
        let mut d = self.delivered.lock().unwrap().clone();
        d.sort();
        d
    }
}

#[async_trait]
impl SignalFeed for MockFeed {
    async fn fetch_signals(&self, query: &SignalQuery) -> Result<Vec<Signal>, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        let signals = self.signals.lock().unwrap();
        Ok(signals
            .iter()
            .filter(|s| match (query.since, s.created_at) {
                (Some(since), Some(created)) => created > since,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, id: &str) -> Result<(), ApiError> {
        if self.fail_delivery.lock().unwrap().contains(id) {
            return Err(ApiError::Status {
                status: 500,
                body: "delivery store unavailable".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<RemoteStats, ApiError> {
        Ok(RemoteStats {
            total_signals: self.signals.lock().unwrap().len() as u64,
            ..Default::default()
        })
    }

    async fn submit_signal(&self, signal: &NewSignal) -> Result<Signal, ApiError> {
        let id = format!("srv-{}", self.signals.lock().unwrap().len() + 1);
        let created = Signal::new(
            id,
            signal.symbol.clone(),
            signal.side,
            signal.entry_price,
            signal.stop_loss,
            signal.take_profit.clone(),
        );
        self.push(created.clone());
        Ok(created)
    }

    async fn archive_signal(&self, id: &str) -> Result<(), ApiError> {
        self.archived.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
