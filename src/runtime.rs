use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::timer::{Timer, TimerError};

/// Time source for every wait in the game.
///
/// Waits are busy-polls: callers check a [`Timer`] and call [`Clock::pause`]
/// between checks. A simulated clock advances time in `pause`, which lets
/// tests play a whole game without sleeping.
pub trait Clock {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;

    /// Coarse wall-clock tick (whole seconds). Used for direction picking.
    fn wall_tick(&self) -> u64;

    /// Called once per busy-poll iteration.
    fn pause(&self) {}
}

/// Production clock backed by [`Instant`] and the system wall clock
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall_tick(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn pause(&self) {
        std::hint::spin_loop();
    }
}

/// Simulated clock for tests and headless runs.
///
/// Clones share the same timeline. Time only moves on [`SimClock::advance`]
/// or by one quantum per [`Clock::pause`].
#[derive(Clone, Debug)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
    quantum: Duration,
    wall_origin: u64,
}

impl SimClock {
    pub fn new(quantum: Duration) -> Self {
        Self {
            now: Rc::new(Cell::new(Duration::ZERO)),
            quantum,
            wall_origin: 0,
        }
    }

    /// Offset the wall-clock tick, e.g. to start on an odd second.
    pub fn with_wall_origin(mut self, secs: u64) -> Self {
        self.wall_origin = secs;
        self
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn wall_tick(&self) -> u64 {
        self.wall_origin + self.now.get().as_secs()
    }

    fn pause(&self) {
        self.advance(self.quantum);
    }
}

/// Process-wide request to stop. Raised by an input source, observed by the
/// engine on every poll iteration.
#[derive(Clone, Debug, Default)]
pub struct QuitSignal {
    raised: Rc<Cell<bool>>,
}

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.set(true);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Quit,
}

/// Spin until `timer` expires or quit is raised. An unarmed timer returns
/// immediately so no wait is ever unbounded.
pub fn spin_until_expired<C: Clock + ?Sized>(
    clock: &C,
    timer: &Timer,
    quit: &QuitSignal,
) -> WaitOutcome {
    if !timer.is_armed() {
        return WaitOutcome::Elapsed;
    }
    loop {
        if quit.is_raised() {
            return WaitOutcome::Quit;
        }
        if timer.expired(clock) {
            return WaitOutcome::Elapsed;
        }
        clock.pause();
    }
}

/// Busy-wait for `seconds` on a fresh timer.
pub fn spin_for<C: Clock + ?Sized>(
    clock: &C,
    seconds: f64,
    quit: &QuitSignal,
) -> Result<WaitOutcome, TimerError> {
    let mut timer = Timer::new();
    timer.arm(clock, seconds)?;
    Ok(spin_until_expired(clock, &timer, quit))
}
