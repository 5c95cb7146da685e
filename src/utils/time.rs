//! Timestamp helpers shared by the scheduling queries, the rate limiter's
//! window keying, and the alert cooldown check.
//!
//! Version dependencies:
//! - chrono = "0.4"

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeError {
    #[error("duration calculation failed: {0}")]
    DurationError(String),
}

/// Current UTC instant. Centralised so tests can reason about ordering
/// without depending on wall-clock granularity assumptions scattered
/// throughout the codebase.
#[inline]
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds between `start` and `end`. Returns an error if `start` is
/// after `end`, which indicates a logic bug rather than a real duration.
pub fn calculate_duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, TimeError> {
    if start > end {
        return Err(TimeError::DurationError(
            "start timestamp is after end timestamp".to_string(),
        ));
    }
    Ok(end.signed_duration_since(start).num_milliseconds())
}

/// The wall-clock minute bucket used as the RateLimiter's external-store key.
/// Two calls within the same minute produce the same bucket regardless of
/// which process instance computes it.
pub fn minute_bucket(now: DateTime<Utc>) -> i64 {
    now.timestamp() / 60
}

/// Milliseconds remaining until the next minute boundary, used by the
/// RateLimiter to compute its sleep-until-window-reset delay.
pub fn ms_until_next_minute(now: DateTime<Utc>) -> i64 {
    let secs_into_minute = now.timestamp() % 60;
    let millis_into_minute = secs_into_minute * 1000 + now.timestamp_subsec_millis() as i64;
    60_000 - millis_into_minute
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn duration_calculation() {
        let start = current_timestamp();
        let end = start + Duration::milliseconds(1000);
        assert_eq!(calculate_duration_ms(start, end).unwrap(), 1000);
        assert!(calculate_duration_ms(end, start).is_err());
    }

    #[test]
    fn same_minute_same_bucket() {
        let t1 = DateTime::parse_from_rfc3339("2026-01-01T00:00:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2026-01-01T00:00:55Z")
            .unwrap()
            .with_timezone(&Utc);
        let t3 = DateTime::parse_from_rfc3339("2026-01-01T00:01:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(minute_bucket(t1), minute_bucket(t2));
        assert_ne!(minute_bucket(t2), minute_bucket(t3));
    }

    #[test]
    fn ms_until_next_minute_bounds() {
        let t = DateTime::parse_from_rfc3339("2026-01-01T00:00:59.500Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ms_until_next_minute(t), 500);
    }
}
