use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Outcome, RiskTier, Side, SignalSource, SignalStatus};

/// A single target price or an ordered scale-out ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TakeProfit {
    Single(f64),
    Ladder(Vec<f64>),
}

impl TakeProfit {
    pub fn targets(&self) -> Vec<f64> {
        match self {
            TakeProfit::Single(p) => vec![*p],
            TakeProfit::Ladder(v) => v.clone(),
        }
    }

    pub fn first(&self) -> Option<f64> {
        match self {
            TakeProfit::Single(p) => Some(*p),
            TakeProfit::Ladder(v) => v.first().copied(),
        }
    }
}

impl From<f64> for TakeProfit {
    fn from(p: f64) -> Self {
        TakeProfit::Single(p)
    }
}

impl From<Vec<f64>> for TakeProfit {
    fn from(v: Vec<f64>) -> Self {
        TakeProfit::Ladder(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    #[serde(alias = "pair")]
    pub symbol: String,
    #[serde(alias = "direction")]
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
    /// 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Absent on the wire means "unchanged" when merging; read it through
    /// [`Signal::status`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SignalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SignalSource>,
    #[serde(default)]
    pub immutable: bool,
}

impl Signal {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        entry_price: f64,
        stop_loss: f64,
        take_profit: impl Into<TakeProfit>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            entry_price,
            stop_loss,
            take_profit: take_profit.into(),
            risk_tier: None,
            timeframe: None,
            analysis: None,
            confidence: None,
            status: Some(SignalStatus::Active),
            outcome: None,
            pnl: None,
            created_at: None,
            updated_at: None,
            persisted_at: None,
            source: None,
            immutable: false,
        }
    }

    /// Lifecycle state; a record that never carried one is active.
    pub fn status(&self) -> SignalStatus {
        self.status.unwrap_or_default()
    }

    pub fn set_status(&mut self, status: SignalStatus) {
        self.status = Some(status);
    }

    /// Shallow merge: required fields are always taken from `incoming`,
    /// optional ones (status included) only when set. `immutable` and
    /// `persisted_at` stay.
    pub fn merge_from(&mut self, incoming: Signal) {
        self.symbol = incoming.symbol;
        self.side = incoming.side;
        self.entry_price = incoming.entry_price;
        self.stop_loss = incoming.stop_loss;
        self.take_profit = incoming.take_profit;

        merge_opt(&mut self.status, incoming.status);
        merge_opt(&mut self.risk_tier, incoming.risk_tier);
        merge_opt(&mut self.timeframe, incoming.timeframe);
        merge_opt(&mut self.analysis, incoming.analysis);
        merge_opt(&mut self.confidence, incoming.confidence);
        merge_opt(&mut self.outcome, incoming.outcome);
        merge_opt(&mut self.pnl, incoming.pnl);
        merge_opt(&mut self.created_at, incoming.created_at);
        merge_opt(&mut self.updated_at, incoming.updated_at);
        merge_opt(&mut self.source, incoming.source);
    }

    /// Best timestamp for range queries.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.persisted_at)
    }

    /// Risk/reward to the first target, if the stop is not at entry.
    pub fn risk_reward(&self) -> Option<f64> {
        let risk = (self.entry_price - self.stop_loss).abs();
        if risk == 0.0 {
            return None;
        }
        let target = self.take_profit.first()?;
        Some((target - self.entry_price).abs() / risk)
    }
}

fn merge_opt<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}
