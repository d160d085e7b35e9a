//! Content fingerprint used to recognise the same signal arriving through
//! different channels before the server has assigned a stable `id`.
//!
//! The hash is the classic 31-multiplier string hash in wrapping `i32`
//! arithmetic over UTF-16 code units, rendered in base 36. It is short and
//! stable, not collision resistant.

use chrono::{DateTime, Utc};

use crate::models::{Side, Signal};

pub const BUCKET_SECONDS: i64 = 300;

#[derive(Debug, Clone)]
pub struct FingerprintParts<'a> {
    pub symbol: &'a str,
    pub timeframe: Option<&'a str>,
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub targets: &'a [f64],
}

pub fn fingerprint(parts: &FingerprintParts<'_>, at: DateTime<Utc>) -> String {
    let bucket = at.timestamp().div_euclid(BUCKET_SECONDS);
    let targets: Vec<String> = parts.targets.iter().map(|t| t.to_string()).collect();
    let content = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        parts.symbol.to_ascii_uppercase(),
        parts.timeframe.unwrap_or(""),
        parts.side,
        parts.entry,
        parts.stop,
        targets.join(","),
        bucket
    );
    to_base36(rolling_hash(&content).unsigned_abs())
}

impl Signal {
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

pub fn rolling_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, c| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32)
    })
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_signal;
    use chrono::{Duration, TimeZone};

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("abc"), 96354);
        assert_eq!(to_base36(96354), "22ci");
        assert_eq!(to_base36(0), "0");
    }

    #[test]
    fn hash_wraps_instead_of_overflowing() {
        let long = "x".repeat(500);
        let _ = rolling_hash(&long);
    }

    #[test]
    fn same_window_same_key() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 10).unwrap();
        let a = make_signal("a");
        let b = make_signal("b");
        // id does not participate
        assert_eq!(a.fingerprint(t0), b.fingerprint(t0));
        assert_eq!(a.fingerprint(t0), a.fingerprint(t0 + Duration::seconds(200)));
        assert_ne!(a.fingerprint(t0), a.fingerprint(t0 + Duration::minutes(5)));
    }

    #[test]
    fn content_changes_key() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let a = make_signal("a");
        let mut b = make_signal("a");
        b.stop_loss += 1.0;
        assert_ne!(a.fingerprint(t0), b.fingerprint(t0));
    }
}
