pub mod client;
pub mod guard;

pub use client::SignalApiClient;
pub use guard::SubmissionGuard;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::models::{RiskTier, Side, Signal, TakeProfit};
use crate::store::fingerprint::{fingerprint, FingerprintParts};

/// Filters for the signal listing endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalQuery {
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub include_delivered: bool,
    pub risk_tier: Option<RiskTier>,
}

impl SignalQuery {
    pub fn since(since: Option<DateTime<Utc>>) -> Self {
        Self {
            since,
            include_delivered: true,
            ..Default::default()
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(since) = self.since {
            pairs.push(("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }
        if self.include_delivered {
            pairs.push(("include_delivered", "true".to_string()));
        }
        if let Some(tier) = self.risk_tier {
            pairs.push(("risk_tier", tier.as_str().to_string()));
        }
        pairs
    }
}

/// Payload for an operator-submitted signal. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSignal {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: TakeProfit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tier: Option<RiskTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl NewSignal {
    pub fn fingerprint(&self, at: DateTime<Utc>) -> String {
        let targets = self.take_profit.targets();
        fingerprint(
            &FingerprintParts {
                symbol: &self.symbol,
                timeframe: self.timeframe.as_deref(),
                side: self.side,
                entry: self.entry_price,
                stop: self.stop_loss,
                targets: &targets,
            },
            at,
        )
    }
}

/// Aggregate counters as reported by the server. Unknown fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteStats {
    #[serde(default)]
    pub total_signals: u64,
    #[serde(default)]
    pub active_signals: u64,
    #[serde(default)]
    pub delivered_signals: u64,
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Server-side signal feed. The relay polls through this while the push
/// transport is down.
#[async_trait]
pub trait SignalFeed: Send + Sync {
    async fn fetch_signals(&self, query: &SignalQuery) -> Result<Vec<Signal>, ApiError>;
    async fn mark_delivered(&self, id: &str) -> Result<(), ApiError>;
    async fn fetch_stats(&self) -> Result<RemoteStats, ApiError>;
    async fn submit_signal(&self, signal: &NewSignal) -> Result<Signal, ApiError>;
    async fn archive_signal(&self, id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_query_has_no_pairs() {
        assert!(SignalQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn full_query_pairs() {
        let q = SignalQuery {
            limit: Some(50),
            since: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            include_delivered: true,
            risk_tier: Some(RiskTier::High),
        };
        assert_eq!(
            q.to_pairs(),
            vec![
                ("limit", "50".to_string()),
                ("since", "2024-03-01T12:00:00.000Z".to_string()),
                ("include_delivered", "true".to_string()),
                ("risk_tier", "high".to_string()),
            ]
        );
    }

    #[test]
    fn new_signal_fingerprint_matches_stored_signal() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 1, 0).unwrap();
        let ns = NewSignal {
            symbol: "BTCUSD".to_string(),
            side: Side::Buy,
            entry_price: 46000.0,
            stop_loss: 45500.0,
            take_profit: TakeProfit::Single(48000.0),
            risk_tier: None,
            timeframe: None,
            analysis: None,
            confidence: None,
        };
        let stored = crate::test_helpers::make_signal("s1");
        assert_eq!(ns.fingerprint(at), stored.fingerprint(at));
    }

    #[test]
    fn remote_stats_keeps_unknown_fields() {
        let stats: RemoteStats =
            serde_json::from_str(r#"{"total_signals":12,"win_rate":61.5,"subscribers":3}"#).unwrap();
        assert_eq!(stats.total_signals, 12);
        assert_eq!(stats.active_signals, 0);
        assert_eq!(stats.win_rate, Some(61.5));
        assert_eq!(stats.extra.get("subscribers"), Some(&serde_json::json!(3)));
    }
}
