use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Signal;

/// Resolution when an incoming record shares an `id` with a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Reject the incoming record when both carry `updated_at` and the
    /// incoming one is strictly older. Otherwise merge.
    #[default]
    NewerWins,
    /// Always merge, whatever the timestamps say.
    LastWriteWins,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::NewerWins => write!(f, "newer_wins"),
            ConflictPolicy::LastWriteWins => write!(f, "last_write_wins"),
        }
    }
}

impl ConflictPolicy {
    pub fn from_str_loose(s: &str) -> Option<ConflictPolicy> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "newer_wins" | "newer" => Some(ConflictPolicy::NewerWins),
            "last_write_wins" | "lww" => Some(ConflictPolicy::LastWriteWins),
            _ => None,
        }
    }

    pub fn accepts(&self, stored: &Signal, incoming: &Signal) -> bool {
        match self {
            ConflictPolicy::LastWriteWins => true,
            ConflictPolicy::NewerWins => match (stored.updated_at, incoming.updated_at) {
                (Some(old), Some(new)) => new >= old,
                _ => true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
    /// Older than what is stored; nothing changed.
    Stale,
    /// Empty id; nothing changed.
    Rejected,
}

impl UpsertOutcome {
    pub fn changed(self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::Merged)
    }
}

/// Insert at the front of a newest-first list or merge in place.
pub fn upsert(records: &mut Vec<Signal>, incoming: Signal, policy: ConflictPolicy) -> UpsertOutcome {
    if incoming.id.is_empty() {
        return UpsertOutcome::Rejected;
    }

    match records.iter_mut().find(|s| s.id == incoming.id) {
        Some(stored) => {
            if !policy.accepts(stored, &incoming) {
                return UpsertOutcome::Stale;
            }
            stored.merge_from(incoming);
            stored.immutable = true;
            UpsertOutcome::Merged
        }
        None => {
            records.insert(0, incoming);
            UpsertOutcome::Inserted
        }
    }
}
