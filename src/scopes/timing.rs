//! Duration helpers shared by scopes. All scope clocks are `i64` nanoseconds.

use std::time::Duration;

/// Converts a configured threshold to nanoseconds, saturating.
#[inline]
pub(crate) fn nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Elapsed time between two ticks, clamped to at least 1ns.
#[inline]
pub(crate) fn at_least_one(start: i64, end: i64) -> i64 {
    end.saturating_sub(start).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_saturates() {
        assert_eq!(nanos(Duration::from_millis(100)), 100_000_000);
        assert_eq!(nanos(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_at_least_one() {
        assert_eq!(at_least_one(10, 10), 1);
        assert_eq!(at_least_one(10, 5), 1);
        assert_eq!(at_least_one(10, 35), 25);
    }
}
