//! Time-to-live checks and the operation clock.

use chrono::Utc;

/// Seconds since the Unix epoch as a real number.
///
/// Read once at the start of every time-consuming operation; callers that
/// need determinism pass an explicit timestamp through the `*_at` variants
/// instead.
pub(crate) fn wall_clock() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Whether an entry stored at `stored` has outlived `ttl_seconds` at `now`.
///
/// The comparison is strict: an entry exactly `ttl_seconds` old is still
/// alive. Expiry is only ever evaluated on access; nothing sweeps in the
/// background.
pub(crate) fn expired(now: f64, stored: f64, ttl_seconds: f64) -> bool {
    now - stored > ttl_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_is_alive() {
        assert!(!expired(5.0, 0.0, 10.0));
    }

    #[test]
    fn test_boundary_is_alive() {
        // Exactly ttl seconds old: still alive (strict comparison).
        assert!(!expired(10.0, 0.0, 10.0));
    }

    #[test]
    fn test_past_ttl_is_expired() {
        assert!(expired(10.001, 0.0, 10.0));
        assert!(expired(100.0, 0.0, 10.0));
    }

    #[test]
    fn test_future_timestamp_is_alive() {
        // An entry stamped in the future never reads as expired.
        assert!(!expired(0.0, 100.0, 10.0));
    }

    #[test]
    fn test_wall_clock_is_sane() {
        let now = wall_clock();
        // 2020-01-01 in epoch seconds; anything earlier means a broken clock
        // conversion, not a broken host.
        assert!(now > 1_577_836_800.0);
    }
}
