use std::time::Duration;

use thiserror::Error;

use crate::runtime::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimerError {
    #[error("timer duration must not be negative (got {0}s)")]
    Negative(f64),
    #[error("timer duration must be a finite number of seconds")]
    NotFinite,
    #[error("timer duration of {0}s is out of range")]
    OutOfRange(f64),
}

/// Single-shot countdown. Unarmed until [`Timer::arm`] succeeds; re-arming
/// overwrites the previous deadline and there is no explicit disarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Duration>,
}

impl Timer {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Record `now + seconds` as the deadline.
    pub fn arm<C: Clock + ?Sized>(&mut self, clock: &C, seconds: f64) -> Result<(), TimerError> {
        let span = to_duration(seconds)?;
        let deadline = clock
            .now()
            .checked_add(span)
            .ok_or(TimerError::OutOfRange(seconds))?;
        self.deadline = Some(deadline);
        Ok(())
    }

    /// `false` while unarmed, otherwise whether the deadline has been reached.
    pub fn expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        match self.deadline {
            Some(deadline) => clock.now() >= deadline,
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Validate a duration given in seconds the way every timer in the game does.
pub fn to_duration(seconds: f64) -> Result<Duration, TimerError> {
    if seconds.is_nan() || seconds.is_infinite() {
        return Err(TimerError::NotFinite);
    }
    if seconds < 0.0 {
        return Err(TimerError::Negative(seconds));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| TimerError::OutOfRange(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SimClock;

    #[test]
    fn unarmed_timer_never_expires() {
        let clock = SimClock::new(Duration::from_millis(10));
        let timer = Timer::new();
        clock.advance(Duration::from_secs(3600));
        assert!(!timer.expired(&clock));
        assert!(!timer.is_armed());
    }

    #[test]
    fn armed_timer_expires_at_deadline() {
        let clock = SimClock::new(Duration::from_millis(10));
        let mut timer = Timer::new();
        timer.arm(&clock, 0.5).unwrap();

        clock.advance(Duration::from_millis(490));
        assert!(!timer.expired(&clock));

        clock.advance(Duration::from_millis(10));
        assert!(timer.expired(&clock));
        clock.advance(Duration::from_secs(10));
        assert!(timer.expired(&clock));
    }

    #[test]
    fn zero_duration_expires_immediately() {
        let clock = SimClock::new(Duration::from_millis(1));
        let mut timer = Timer::new();
        timer.arm(&clock, 0.0).unwrap();
        assert!(timer.expired(&clock));
    }

    #[test]
    fn negative_duration_is_rejected_and_keeps_old_deadline() {
        let clock = SimClock::new(Duration::from_millis(1));
        let mut timer = Timer::new();
        timer.arm(&clock, 1.0).unwrap();

        assert_eq!(timer.arm(&clock, -0.1), Err(TimerError::Negative(-0.1)));
        clock.advance(Duration::from_secs(1));
        assert!(timer.expired(&clock));
    }

    #[test]
    fn non_finite_durations_are_rejected() {
        let clock = SimClock::new(Duration::from_millis(1));
        let mut timer = Timer::new();
        assert_eq!(timer.arm(&clock, f64::NAN), Err(TimerError::NotFinite));
        assert_eq!(timer.arm(&clock, f64::INFINITY), Err(TimerError::NotFinite));
        assert!(!timer.is_armed());
    }

    #[test]
    fn rearming_overwrites_deadline() {
        let clock = SimClock::new(Duration::from_millis(1));
        let mut timer = Timer::new();
        timer.arm(&clock, 0.1).unwrap();
        timer.arm(&clock, 2.0).unwrap();

        clock.advance(Duration::from_millis(500));
        assert!(!timer.expired(&clock));
        clock.advance(Duration::from_millis(1500));
        assert!(timer.expired(&clock));
    }

    #[test]
    fn querying_does_not_mutate() {
        let clock = SimClock::new(Duration::from_millis(1));
        let mut timer = Timer::new();
        timer.arm(&clock, 1.0).unwrap();
        let before = timer;
        let _ = timer.expired(&clock);
        let _ = timer.is_armed();
        assert_eq!(before, timer);
    }
}
