use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Outcome, Signal, SignalStatus};
use crate::store::UpsertOutcome;

/// Frames pushed by the signal server: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    NewSignal(Signal),
    #[serde(alias = "updated_signal")]
    SignalUpdated(SignalUpdate),
    Connected(ServerHello),
    Pong(PongPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalUpdate {
    pub id: String,
    pub status: SignalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerHello {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongPayload {
    /// Echo of the ping's client timestamp, unix millis.
    pub timestamp: i64,
}

/// Frames sent by this client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping(PingPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingPayload {
    pub timestamp: i64,
}

/// Notifications fanned out to subscribers of the realtime client.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    Connected,
    Disconnected { reason: String },
    ConnectError { error: String, attempt: u32 },
    /// A pushed signal after it was written locally. `outcome` tells a
    /// first sighting (`Inserted`) from a re-delivery.
    NewSignal { signal: Signal, outcome: UpsertOutcome },
    SignalUpdated(SignalUpdate),
    Pong { latency_ms: i64 },
    ReconnectExhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_alias() {
        let text = r#"{"event":"updated_signal","data":{"id":"s1","status":"completed","outcome":"win","pnl":250}}"#;
        match serde_json::from_str::<ServerFrame>(text).unwrap() {
            ServerFrame::SignalUpdated(u) => {
                assert_eq!(u.id, "s1");
                assert_eq!(u.outcome, Some(Outcome::Win));
                assert_eq!(u.pnl, Some(250.0));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn ping_wire_shape() {
        let text = serde_json::to_string(&ClientFrame::Ping(PingPayload { timestamp: 42 })).unwrap();
        assert_eq!(text, r#"{"event":"ping","data":{"timestamp":42}}"#);
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(serde_json::from_str::<ServerFrame>(r#"{"event":"nope","data":{}}"#).is_err());
    }
}
