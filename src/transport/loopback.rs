use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::models::Signal;
use crate::transport::connector::{Connection, Connector};
use crate::transport::events::{ServerFrame, SignalUpdate};

/// The server side of a loopback session.
pub struct ServerEnd {
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    pub fn send(&self, frame: &ServerFrame) -> bool {
        match serde_json::to_string(frame) {
            Ok(text) => self.to_client.send(text).is_ok(),
            Err(_) => false,
        }
    }

    pub fn send_raw(&self, text: &str) -> bool {
        self.to_client.send(text.to_string()).is_ok()
    }

    pub fn new_signal(&self, signal: Signal) -> bool {
        self.send(&ServerFrame::NewSignal(signal))
    }

    pub fn update(&self, update: SignalUpdate) -> bool {
        self.send(&ServerFrame::SignalUpdated(update))
    }
}

/// In-process connector that hands every accepted session to whoever
/// holds the receiver returned by `new`. Attempts can be scripted to be
/// refused or to stall until the connect timeout fires.
pub struct LoopbackConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    attempts: AtomicUsize,
    refuse: AtomicUsize,
    stall: AtomicUsize,
}

impl LoopbackConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        (
            Self {
                accepted,
                attempts: AtomicUsize::new(0),
                refuse: AtomicUsize::new(0),
                stall: AtomicUsize::new(0),
            },
            rx,
        )
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    pub fn stall_next(&self, n: usize) {
        self.stall.store(n, Ordering::SeqCst);
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, _url: &str, _token: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if Self::take_one(&self.stall) {
            std::future::pending::<()>().await;
        }
        if Self::take_one(&self.refuse) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.accepted
            .send(ServerEnd {
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Connect("loopback server is gone".to_string()))?;

        Ok(Connection { inbound, outbound })
    }
}
