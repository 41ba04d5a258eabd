//! The retry backoff schedule `Pool::post` uses between `post_once` attempts.
//!
//! A pure, infinite iterator: `10^(-3 + 0.5k)` seconds for `k = 0, 1, 2, ...`,
//! i.e. 1ms, ~3ms, 10ms, ~32ms, 100ms, ... growing without an upper bound.
//! There is deliberately no maximum attempt count — the only thing that ends
//! a retry loop is the request's own deadline.

use std::time::Duration;

pub(super) struct Backoff {
    exponent: f64,
}

impl Backoff {
    pub(super) fn new() -> Backoff {
        Backoff { exponent: -3.0 }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = Duration::from_secs_f64(10f64.powf(self.exponent));
        self.exponent += 0.5;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_grows_monotonically_from_one_millisecond() {
        let mut backoff = Backoff::new();
        let first = backoff.next().unwrap();
        let second = backoff.next().unwrap();
        let third = backoff.next().unwrap();
        assert!((first.as_secs_f64() - 0.001).abs() < 1e-9);
        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn schedule_never_ends() {
        let mut backoff = Backoff::new();
        assert!(backoff.nth(100).is_some());
    }
}
