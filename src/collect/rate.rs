use std::time::{Duration, Instant};

use crate::config::dashboard_config::FormatRule;
use crate::constants::MEBI;

/// Cumulative byte counters of one upstream interface.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ByteCounters {
    pub received: u64,
    pub transmitted: u64,
}

/// Bytes per second in each direction. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub download: f64,
    pub upload: f64,
}

/// A counter that went backwards (interface reset) yields zero, not a negative rate.
pub fn bytes_per_second(previous: u64, current: u64, elapsed: Duration) -> f64 {
    let elapsed = elapsed.as_secs_f64();
    if elapsed <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / elapsed
}

#[derive(Debug, Default)]
pub struct RateState {
    previous: Option<(ByteCounters, Instant)>,
}

impl RateState {
    /// Records a reading and returns the throughput since the previous one.
    ///
    /// The very first reading only seeds the state and reports zero.
    pub fn update(&mut self, counters: ByteCounters, now: Instant) -> Throughput {
        let throughput = match self.previous {
            Some((previous, ts)) => {
                let elapsed = now.saturating_duration_since(ts);
                Throughput {
                    download: bytes_per_second(previous.received, counters.received, elapsed),
                    upload: bytes_per_second(previous.transmitted, counters.transmitted, elapsed),
                }
            }
            None => Throughput::default(),
        };

        self.previous = Some((counters, now));
        throughput
    }

    pub fn is_seeded(&self) -> bool {
        self.previous.is_some()
    }
}

pub fn format_rate(bytes_per_second: f64, rule: FormatRule) -> String {
    let bytes_per_second = bytes_per_second.max(0.0);
    match rule {
        FormatRule::Mebibytes => format!("{:.1} MiB/s", bytes_per_second / MEBI),
        _ => format!("{:.1} Mib/s", bytes_per_second * 8.0 / MEBI),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_second() {
        assert_eq!(bytes_per_second(0, 0, Duration::from_secs(1)), 0.0);
        assert_eq!(bytes_per_second(0, 1_048_576, Duration::from_secs(1)), 1_048_576.0);
        assert_eq!(bytes_per_second(1000, 6000, Duration::from_secs(5)), 1000.0);
        assert_eq!(bytes_per_second(10, 20, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_counter_reset_is_clamped() {
        assert_eq!(bytes_per_second(5_000_000, 100, Duration::from_secs(5)), 0.0);
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(1_048_576.0, FormatRule::Mebibytes), "1.0 MiB/s");
        assert_eq!(format_rate(1_048_576.0, FormatRule::Mebibits), "8.0 Mib/s");
        assert_eq!(format_rate(0.0, FormatRule::Mebibits), "0.0 Mib/s");
        assert_eq!(format_rate(-10.0, FormatRule::Mebibytes), "0.0 MiB/s");
    }

    #[test]
    fn test_first_reading_seeds_without_spike() {
        let mut state = RateState::default();
        let t0 = Instant::now();
        assert!(!state.is_seeded());

        let first = state.update(
            ByteCounters {
                received: 9_000_000_000,
                transmitted: 1_000_000_000,
            },
            t0,
        );
        assert_eq!(first, Throughput::default());
        assert!(state.is_seeded());

        let second = state.update(
            ByteCounters {
                received: 9_000_000_000 + 2 * 1_048_576,
                transmitted: 1_000_000_000 + 1_048_576,
            },
            t0 + Duration::from_secs(2),
        );
        assert_eq!(second.download, 1_048_576.0);
        assert_eq!(second.upload, 524_288.0);
    }

    #[test]
    fn test_rollback_after_seed() {
        let mut state = RateState::default();
        let t0 = Instant::now();
        state.update(ByteCounters { received: 500, transmitted: 500 }, t0);

        let after_reset = state.update(
            ByteCounters { received: 100, transmitted: 900 },
            t0 + Duration::from_secs(1),
        );
        assert_eq!(after_reset.download, 0.0);
        assert_eq!(after_reset.upload, 400.0);
    }
}
