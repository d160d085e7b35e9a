pub mod backoff;
pub mod client;
pub mod connector;
pub mod events;
pub mod loopback;

pub use backoff::Backoff;
pub use client::{RealtimeClient, RealtimeConfig};
pub use connector::{Connection, Connector, WsConnector};
pub use events::{
    ClientFrame, ConnectionState, PingPayload, PongPayload, RealtimeEvent, ServerFrame,
    ServerHello, SignalUpdate,
};
pub use loopback::{LoopbackConnector, ServerEnd};
