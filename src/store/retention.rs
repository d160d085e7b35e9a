use serde::{Deserialize, Serialize};

use crate::models::Signal;

pub const DEFAULT_MAX_SIGNALS: usize = 1000;
/// Records kept when the medium reports it is full.
pub const DEGRADED_KEEP: usize = 500;

/// How many records the live store may hold. Eviction always drops the
/// oldest records first (the tail of the newest-first list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    Unbounded,
    Capped(usize),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::Capped(DEFAULT_MAX_SIGNALS)
    }
}

impl RetentionPolicy {
    /// `0` means unbounded.
    pub fn from_max(max: usize) -> Self {
        if max == 0 {
            RetentionPolicy::Unbounded
        } else {
            RetentionPolicy::Capped(max)
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            RetentionPolicy::Unbounded => None,
            RetentionPolicy::Capped(n) => Some(*n),
        }
    }

    /// Truncate a newest-first list, returning how many were evicted.
    pub fn apply(&self, records: &mut Vec<Signal>) -> usize {
        match self.limit() {
            Some(max) => keep_newest(records, max),
            None => 0,
        }
    }
}

pub fn keep_newest(records: &mut Vec<Signal>, keep: usize) -> usize {
    if records.len() <= keep {
        return 0;
    }
    let evicted = records.len() - keep;
    records.truncate(keep);
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_signal;

    #[test]
    fn capped_drops_tail() {
        let mut records: Vec<Signal> = (0..5).map(|i| make_signal(&format!("s{}", i))).collect();
        let evicted = RetentionPolicy::Capped(3).apply(&mut records);
        assert_eq!(evicted, 2);
        let ids: Vec<&str> = records.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn unbounded_keeps_everything() {
        let mut records: Vec<Signal> = (0..5).map(|i| make_signal(&format!("s{}", i))).collect();
        assert_eq!(RetentionPolicy::from_max(0).apply(&mut records), 0);
        assert_eq!(records.len(), 5);
    }
}
