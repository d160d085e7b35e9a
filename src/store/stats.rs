use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Signal, SignalSource, SignalStatus};
use crate::store::market::{Market, MarketClassifier};
use crate::store::SignalStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub archived: usize,
    pub wins: usize,
    pub losses: usize,
    /// Winning share of completed signals, whole percent.
    pub win_rate: u32,
    pub total_pnl: f64,
    pub by_market: HashMap<Market, usize>,
    pub by_source: HashMap<SignalSource, usize>,
}

pub fn compute_stats(records: &[Signal], classifier: &dyn MarketClassifier) -> SignalStats {
    let mut stats = SignalStats {
        total: records.len(),
        ..SignalStats::default()
    };
    let mut completed_wins = 0usize;

    for s in records {
        match s.status() {
            SignalStatus::Active => stats.active += 1,
            SignalStatus::Completed => stats.completed += 1,
            SignalStatus::Archived => stats.archived += 1,
        }

        if let Some(outcome) = s.outcome {
            if outcome.is_win() {
                stats.wins += 1;
                if s.status() == SignalStatus::Completed {
                    completed_wins += 1;
                }
            } else if outcome.is_loss() {
                stats.losses += 1;
            }
        }

        stats.total_pnl += s.pnl.unwrap_or(0.0);
        *stats.by_market.entry(classifier.classify(&s.symbol)).or_insert(0) += 1;
        if let Some(src) = s.source {
            *stats.by_source.entry(src).or_insert(0) += 1;
        }
    }

    stats.win_rate = if stats.completed > 0 {
        (completed_wins as f64 / stats.completed as f64 * 100.0).round() as u32
    } else {
        0
    };
    stats.total_pnl = round2(stats.total_pnl);
    stats
}

impl SignalStore {
    pub fn stats(&self) -> SignalStats {
        compute_stats(self.get_all(), self.classifier())
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
