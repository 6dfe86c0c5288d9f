//! Circuit breaker and reconnect backoff.
//!
//! Both are plain state holders: the owning monitor passes in the current
//! time, which keeps them deterministic under tokio's paused test clock.
//!
//! # State Transitions
//!
//! ```text
//! ┌─────────┐  failure_count >= threshold  ┌──────┐
//! │ Closed  │ ──────────────────────────▶  │ Open │ ◀──┐
//! └─────────┘                              └──────┘    │
//!      ▲                                       │       │ failure
//!      │ socket opened                         │       │
//!      │                  attempt after        ▼       │
//!      │                  recovery_timeout ┌──────────┐│
//!      └────────────────────────────────── │ HalfOpen │┘
//!                                          └──────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::info;

use crate::config::MonitorOptions;

// ============================================================================
// BreakerState
// ============================================================================

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakerState {
    /// Normal operation; connection attempts are allowed.
    #[default]
    Closed,
    /// Too many failures; attempts are suppressed until the recovery window ends.
    Open,
    /// Recovery window elapsed; the next attempt decides.
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        })
    }
}

// ============================================================================
// Admission
// ============================================================================

/// Outcome of asking the breaker for a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Go ahead.
    Proceed,
    /// Breaker is open; try again after `remaining`.
    Suppressed {
        /// Time left in the recovery window.
        remaining: Duration,
    },
}

// ============================================================================
// CircuitBreaker
// ============================================================================

/// Failure-count circuit breaker guarding connection attempts.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Returns failures recorded since the last success.
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Asks whether a connection attempt may start at `now`.
    ///
    /// An open breaker whose recovery window has elapsed moves to
    /// [`BreakerState::HalfOpen`] and admits the attempt.
    pub fn admit(&mut self, now: Instant) -> Admission {
        if self.state != BreakerState::Open {
            return Admission::Proceed;
        }

        let elapsed = self
            .last_failure
            .map_or(Duration::MAX, |at| now.saturating_duration_since(at));

        if elapsed < self.recovery_timeout {
            return Admission::Suppressed {
                remaining: self.recovery_timeout - elapsed,
            };
        }

        info!("Circuit breaker moving to HALF_OPEN");
        self.state = BreakerState::HalfOpen;
        Admission::Proceed
    }

    /// Records a failure at `now`.
    ///
    /// Returns `true` if this failure opened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);

        if self.failure_count >= self.failure_threshold && self.state != BreakerState::Open {
            self.state = BreakerState::Open;
            return true;
        }
        false
    }

    /// Records a successful open: closes the breaker and resets the count.
    pub fn record_success(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
    }
}

impl From<&MonitorOptions> for CircuitBreaker {
    fn from(options: &MonitorOptions) -> Self {
        Self::new(options.failure_threshold, options.recovery_timeout)
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Capped exponential backoff with uniform jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter_max: Duration,
}

impl Backoff {
    /// Creates a backoff policy.
    #[must_use]
    pub const fn new(base_delay: Duration, max_delay: Duration, jitter_max: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_max,
        }
    }

    /// Delay before retry `attempt` (1-based), without jitter.
    ///
    /// `min(base_delay * 2^(attempt - 1), max_delay)`
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before retry `attempt` plus a uniform jitter in `0..=jitter_max`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.delay(attempt) + jitter
    }
}

impl From<&MonitorOptions> for Backoff {
    fn from(options: &MonitorOptions) -> Self {
        Self::new(options.base_delay, options.max_delay, options.jitter_max)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(
            Duration::from_millis(1_000),
            Duration::from_millis(30_000),
            Duration::from_millis(1_000),
        )
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let b = backoff();
        assert_eq!(b.delay(1), Duration::from_millis(1_000));
        assert_eq!(b.delay(2), Duration::from_millis(2_000));
        assert_eq!(b.delay(5), Duration::from_millis(16_000));
        assert_eq!(b.delay(6), Duration::from_millis(30_000));
        assert_eq!(b.delay(10), Duration::from_millis(30_000));
    }

    #[test]
    fn test_backoff_huge_attempt_saturates() {
        assert_eq!(backoff().delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_bounds() {
        let b = backoff();
        for _ in 0..100 {
            let d = b.jittered_delay(3);
            assert!(d >= Duration::from_millis(4_000));
            assert!(d <= Duration::from_millis(5_000));
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let b = Backoff::new(Duration::from_millis(10), Duration::from_millis(100), Duration::ZERO);
        assert_eq!(b.jittered_delay(2), Duration::from_millis(20));
    }

    #[test]
    fn test_breaker_opens_at_threshold() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(!breaker.record_failure(now));
        assert!(!breaker.record_failure(now));
        assert_eq!(breaker.state(), BreakerState::Closed);

        assert!(breaker.record_failure(now));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.failure_count(), 3);
    }

    #[test]
    fn test_open_breaker_suppresses_until_recovery() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        breaker.record_failure(start);

        assert_eq!(
            breaker.admit(start + Duration::from_secs(20)),
            Admission::Suppressed {
                remaining: Duration::from_secs(40)
            }
        );
        assert_eq!(breaker.state(), BreakerState::Open);

        assert_eq!(breaker.admit(start + Duration::from_secs(60)), Admission::Proceed);
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(1));
        breaker.record_failure(start);
        breaker.record_failure(start);

        let later = start + Duration::from_secs(2);
        assert_eq!(breaker.admit(later), Admission::Proceed);
        assert!(breaker.record_failure(later));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_half_open_success_closes() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(1));
        breaker.record_failure(start);
        breaker.admit(start + Duration::from_secs(1));

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_closed_breaker_always_admits() {
        let mut breaker = CircuitBreaker::from(&MonitorOptions::default());
        assert_eq!(breaker.admit(Instant::now()), Admission::Proceed);
        assert_eq!(breaker.state().to_string(), "CLOSED");
    }
}
