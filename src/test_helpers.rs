use chrono::{DateTime, Utc};

use crate::models::{Side, Signal};

/// A plain BTCUSD long with no timestamps or source set.
pub fn make_signal(id: &str) -> Signal {
    Signal::new(id, "BTCUSD", Side::Buy, 46000.0, 45500.0, 48000.0)
}

pub fn make_signal_at(id: &str, symbol: &str, created_at: &str) -> Signal {
    let mut s = make_signal(id);
    s.symbol = symbol.to_string();
    s.created_at = Some(parse_time(created_at));
    s
}

pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}
