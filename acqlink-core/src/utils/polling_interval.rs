use time::Duration;

/// A pending transaction older than this is abandoned.
pub const RECONCILIATION_TIMEOUT: Duration = Duration::hours(24);

/// Delay before the first status query after placement.
pub const INITIAL_QUERY_DELAY: Duration = Duration::seconds(60);

/// Exponent cap for lease retries (2^11 = 2048 seconds max backoff).
const MAX_RETRY_EXPONENT: u32 = 11;

/// Returns the delay until the next gateway status query, based on how long
/// the transaction has been pending. `None` once the transaction has timed
/// out.
pub fn next_poll_delay(elapsed: Duration) -> Option<Duration> {
    match elapsed {
        d if d >= RECONCILIATION_TIMEOUT => None,
        d if d < Duration::hours(1) => Some(Duration::seconds(60)),
        d if d < Duration::hours(3) => Some(Duration::seconds(600)),
        _ => Some(Duration::seconds(3600)),
    }
}

/// Backoff for a lease that failed with a retryable error: `2^attempts`
/// seconds, capped.
pub fn retry_delay(attempts: u32) -> Duration {
    let seconds = 2i64.pow(attempts.min(MAX_RETRY_EXPONENT));
    Duration::seconds(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_hour_polls_every_minute() {
        assert_eq!(next_poll_delay(Duration::ZERO), Some(Duration::seconds(60)));
        assert_eq!(next_poll_delay(Duration::minutes(59)), Some(Duration::seconds(60)));
        assert_eq!(
            next_poll_delay(Duration::hours(1) - Duration::seconds(1)),
            Some(Duration::seconds(60))
        );
    }

    #[test]
    fn hours_one_to_three_poll_every_ten_minutes() {
        assert_eq!(next_poll_delay(Duration::hours(1)), Some(Duration::seconds(600)));
        assert_eq!(
            next_poll_delay(Duration::hours(3) - Duration::seconds(1)),
            Some(Duration::seconds(600))
        );
    }

    #[test]
    fn after_three_hours_poll_hourly_until_timeout() {
        assert_eq!(next_poll_delay(Duration::hours(3)), Some(Duration::seconds(3600)));
        assert_eq!(
            next_poll_delay(RECONCILIATION_TIMEOUT - Duration::seconds(1)),
            Some(Duration::seconds(3600))
        );
    }

    #[test]
    fn timeout_stops_polling() {
        assert_eq!(next_poll_delay(RECONCILIATION_TIMEOUT), None);
        assert_eq!(next_poll_delay(Duration::days(3)), None);
    }

    #[test]
    fn clock_skew_is_treated_as_fresh() {
        assert_eq!(next_poll_delay(Duration::seconds(-30)), Some(Duration::seconds(60)));
    }

    #[test]
    fn retry_delay_calculation() {
        assert_eq!(retry_delay(0), Duration::seconds(1));
        assert_eq!(retry_delay(1), Duration::seconds(2));
        assert_eq!(retry_delay(10), Duration::seconds(1024));
        assert_eq!(retry_delay(11), Duration::seconds(2048));
        // Max capped at 11
        assert_eq!(retry_delay(12), Duration::seconds(2048));
        assert_eq!(retry_delay(100), Duration::seconds(2048));
    }
}
