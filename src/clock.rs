//! Fixed-phase wake clock. This module contains [`WakeClock`] and the
//! signed [`Drift`] it reports.

use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Signed distance between a planned activation and the actual one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// The activation happened this long after its target. Zero drift is
    /// reported as `Late(Duration::ZERO)`.
    Late(Duration),
    /// The activation happened this long before its target.
    Early(Duration),
}

impl Drift {
    /// Compute the drift of an activation at `actual` against `scheduled`.
    pub fn between(scheduled: Instant, actual: Instant) -> Self {
        match actual.checked_duration_since(scheduled) {
            Some(late) => Self::Late(late),
            None => Self::Early(scheduled.duration_since(actual)),
        }
    }

    /// Drift in seconds, positive when late and negative when early.
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Self::Late(d) => d.as_secs_f64(),
            Self::Early(d) => -d.as_secs_f64(),
        }
    }

    /// True if the activation came after its target.
    pub const fn is_late(&self) -> bool {
        matches!(self, Self::Late(d) if !d.is_zero())
    }

    /// Magnitude of the drift, ignoring direction.
    pub const fn magnitude(&self) -> Duration {
        match self {
            Self::Late(d) | Self::Early(d) => *d,
        }
    }
}

/// Tracks when a periodic task should next run.
///
/// The clock is fixed-phase: every [`advance`] moves the target forward by
/// exactly one period, no matter how late the activation was. A task that
/// falls behind stays behind, and its drift grows, rather than skipping
/// ticks to catch up.
///
/// [`advance`]: WakeClock::advance
#[derive(Debug, Clone)]
pub struct WakeClock {
    period: Duration,
    target: Instant,
}

impl WakeClock {
    /// Create a clock whose first target is `start`. Fails if `period` is
    /// zero.
    pub fn new(period: Duration, start: Instant) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::InvalidConfiguration(
                "wake clock period must be strictly positive".to_owned(),
            ));
        }
        Ok(Self {
            period,
            target: start,
        })
    }

    /// The configured period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// The instant the next activation should occur.
    pub const fn current_target(&self) -> Instant {
        self.target
    }

    /// Record an activation at `now`, returning its drift and moving the
    /// target forward by one period.
    ///
    /// # Panics
    ///
    /// If the next target is not representable as an [`Instant`]. A
    /// scheduling primitive has no safe degraded mode, so this is fatal.
    pub fn advance(&mut self, now: Instant) -> Drift {
        let drift = Drift::between(self.target, now);
        self.target = self
            .target
            .checked_add(self.period)
            .expect("wake clock target overflowed Instant");
        drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn zero_period_is_rejected() {
        let err = WakeClock::new(Duration::ZERO, Instant::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn current_target_is_a_pure_read() {
        let start = Instant::now();
        let clock = WakeClock::new(SECOND, start).unwrap();
        assert_eq!(clock.current_target(), start);
        assert_eq!(clock.current_target(), start);
    }

    #[test]
    fn advance_reports_signed_drift() {
        let t0 = Instant::now();
        let mut clock = WakeClock::new(SECOND, t0).unwrap();

        assert_eq!(clock.advance(t0), Drift::Late(Duration::ZERO));
        assert_eq!(
            clock.advance(t0 + Duration::from_millis(1300)),
            Drift::Late(Duration::from_millis(300))
        );

        let early = clock.advance(t0 + Duration::from_millis(1900));
        assert_eq!(early, Drift::Early(Duration::from_millis(100)));
        assert!(!early.is_late());
        assert!((early.as_secs_f64() + 0.1).abs() < 1e-9);
        assert_eq!(clock.current_target(), t0 + 3 * SECOND);
    }

    #[test]
    fn target_never_skips_periods() {
        let t0 = Instant::now();
        let period = Duration::from_millis(250);
        let mut clock = WakeClock::new(period, t0).unwrap();

        // Far behind schedule, then bunched together, then early.
        let actuals = [
            t0 + Duration::from_secs(10),
            t0 + Duration::from_secs(10),
            t0 + Duration::from_secs(11),
            t0,
        ];
        for (n, now) in actuals.into_iter().enumerate() {
            let before = clock.current_target();
            let drift = clock.advance(now);
            assert_eq!(drift, Drift::between(before, now));
            assert_eq!(clock.current_target(), t0 + period * (n as u32 + 1));
        }
    }

    #[test]
    #[should_panic(expected = "wake clock target overflowed Instant")]
    fn target_overflow_is_fatal() {
        let mut clock = WakeClock::new(Duration::MAX, Instant::now()).unwrap();
        clock.advance(Instant::now());
    }

    #[test]
    fn drift_helpers() {
        let late = Drift::Late(Duration::from_millis(1500));
        assert!(late.is_late());
        assert_eq!(late.magnitude(), Duration::from_millis(1500));
        assert!((late.as_secs_f64() - 1.5).abs() < 1e-9);
        assert!(!Drift::Late(Duration::ZERO).is_late());
        assert_eq!(Drift::Late(Duration::ZERO).as_secs_f64(), 0.0);
    }
}
