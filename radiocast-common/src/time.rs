//! Timestamp and progress utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Fraction of a phase completed, clamped to `[0.0, 1.0]`
///
/// A zero (or negative) duration yields `0.0`.
pub fn completion_fraction(elapsed_seconds: f64, duration_seconds: f64) -> f64 {
    if duration_seconds <= 0.0 || !duration_seconds.is_finite() || !elapsed_seconds.is_finite() {
        return 0.0;
    }
    (elapsed_seconds / duration_seconds).clamp(0.0, 1.0)
}

/// Seconds to whole milliseconds, saturating at zero
pub fn seconds_to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
    }

    #[test]
    fn test_fraction_zero_duration() {
        assert_eq!(completion_fraction(10.0, 0.0), 0.0);
        assert_eq!(completion_fraction(10.0, -3.0), 0.0);
    }

    #[test]
    fn test_fraction_clamps() {
        assert_eq!(completion_fraction(-1.0, 10.0), 0.0);
        assert_eq!(completion_fraction(5.0, 10.0), 0.5);
        assert_eq!(completion_fraction(10.0, 10.0), 1.0);
        assert_eq!(completion_fraction(25.0, 10.0), 1.0);
    }

    #[test]
    fn test_fraction_reaches_one_exactly_at_duration() {
        let duration = 7.3;
        assert!(completion_fraction(7.29, duration) < 1.0);
        assert_eq!(completion_fraction(7.3, duration), 1.0);
    }

    #[test]
    fn test_seconds_to_millis() {
        assert_eq!(seconds_to_millis(1.5), 1500);
        assert_eq!(seconds_to_millis(-2.0), 0);
        assert_eq!(seconds_to_millis(f64::NAN), 0);
    }
}
