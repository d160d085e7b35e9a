use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::ApiError;

pub const DEFAULT_SUBMISSION_TTL: Duration = Duration::from_secs(600);

/// Remembers recently submitted fingerprints so the same signal is not
/// posted twice within `ttl`.
#[derive(Debug)]
pub struct SubmissionGuard {
    ttl: Duration,
    seen: HashMap<String, Instant>,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SUBMISSION_TTL)
    }
}

impl SubmissionGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn check(&mut self, fingerprint: &str) -> Result<(), ApiError> {
        self.check_at(fingerprint, Instant::now())
    }

    /// Record `fingerprint` at `now`, or refuse it if it is still live.
    pub fn check_at(&mut self, fingerprint: &str, now: Instant) -> Result<(), ApiError> {
        self.prune(now);
        if self.seen.contains_key(fingerprint) {
            return Err(ApiError::DuplicateSubmission(fingerprint.to_string()));
        }
        self.seen.insert(fingerprint.to_string(), now);
        Ok(())
    }

    /// Forget a fingerprint, e.g. after the submission it guarded failed.
    pub fn release(&mut self, fingerprint: &str) {
        self.seen.remove(fingerprint);
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.seen
            .retain(|_, at| now.saturating_duration_since(*at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_duplicate_within_ttl() {
        let mut g = SubmissionGuard::new(Duration::from_secs(60));
        let t0 = Instant::now();
        g.check_at("abc", t0).unwrap();
        let err = g.check_at("abc", t0 + Duration::from_secs(30)).unwrap_err();
        assert!(matches!(err, ApiError::DuplicateSubmission(fp) if fp == "abc"));
        g.check_at("other", t0).unwrap();
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn accepts_again_after_ttl() {
        let mut g = SubmissionGuard::new(Duration::from_secs(60));
        let t0 = Instant::now();
        g.check_at("abc", t0).unwrap();
        g.check_at("abc", t0 + Duration::from_secs(61)).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn release_allows_retry() {
        let mut g = SubmissionGuard::default();
        g.check("abc").unwrap();
        g.release("abc");
        assert!(g.is_empty());
        g.check("abc").unwrap();
    }
}
