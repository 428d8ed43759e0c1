//! One-shot timers for the interaction controller.
//!
//! The controller never sleeps. It arms a token with a delay, and whoever
//! drives the event loop hands due tokens back via `timer_fired`. Tokens are
//! generation-stamped so a firing for a superseded timer can be recognized.

use std::time::{Duration, Instant};

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Scheduling capability the controller arms timers through.
pub trait Scheduler {
    fn arm(&mut self, delay: Duration, token: TimerToken);
    fn cancel(&mut self, token: TimerToken);
}

/// Time source, so tests can step time by hand.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deadline list polled by the event loop.
#[derive(Debug)]
pub struct DeadlineScheduler<C: Clock = SystemClock> {
    armed: Vec<(TimerToken, Instant)>,
    clock: C,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for DeadlineScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> DeadlineScheduler<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            armed: Vec::new(),
            clock,
        }
    }

    /// Arms a token against an explicit start instant.
    pub fn arm_at(&mut self, start: Instant, delay: Duration, token: TimerToken) {
        self.armed.retain(|(t, _)| *t != token);
        self.armed.push((token, start + delay));
    }

    /// Removes and returns every token whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerToken> {
        let mut due: Vec<(TimerToken, Instant)> = Vec::new();
        self.armed.retain(|&(token, deadline)| {
            if deadline <= now {
                due.push((token, deadline));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, deadline)| deadline);
        due.into_iter().map(|(token, _)| token).collect()
    }

    /// Time until the earliest deadline (zero if one is already due).
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.armed
            .iter()
            .map(|&(_, deadline)| deadline.saturating_duration_since(now))
            .min()
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl<C: Clock> Scheduler for DeadlineScheduler<C> {
    fn arm(&mut self, delay: Duration, token: TimerToken) {
        let start = self.clock.now();
        self.arm_at(start, delay, token);
    }

    fn cancel(&mut self, token: TimerToken) {
        self.armed.retain(|(t, _)| *t != token);
    }
}
