//! The game state machine.
//!
//! `Idle` shows the high score and waits (bounded by the idle timer) for a
//! press. `Playing` runs one attempt level by level until the lives run out.
//! `Exited` is terminal: every line has been switched off and released.
//!
//! Each poll iteration of a level is ordered: light update, then button,
//! then level timer. A press in the same iteration as a light step is judged
//! against the new position.

use std::time::Duration;

use thiserror::Error;

use crate::config::GameSettings;
use crate::display::{LogDisplay, ScoreDisplay};
use crate::hw::{Button, GpioBackend, LightStrip, Reading, StripError};
use crate::runtime::{spin_for, spin_until_expired, Clock, QuitSignal, WaitOutcome};
use crate::session::SessionState;
use crate::stats::{MemoryStatsStore, Statistics, StatsStore};
use crate::telemetry::{Event, EventLog, FailReason};
use crate::timer::{Timer, TimerError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("light strip fault: {0}")]
    Strip(#[from] StripError),
    #[error("button fault")]
    ButtonFault,
    #[error("timer: {0}")]
    Timer(#[from] TimerError),
    #[error("no attempt in progress")]
    NoSession,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Playing,
    Exited,
}

/// Why [`Engine::run`] stopped without a fault
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    IdleTimeout,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleOutcome {
    Start,
    Timeout,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelOutcome {
    Pass,
    Fail(FailReason),
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelReport {
    pub outcome: LevelOutcome,
    /// Lit position when the level ended
    pub position: usize,
    /// Light steps taken during the level
    pub advances: u32,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptEnd {
    LivesExhausted,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttemptSummary {
    pub end: AttemptEnd,
    pub level: u32,
    pub seconds: f64,
}

/// Process-scoped collaborators handed to the engine at construction
pub struct Context<C: Clock> {
    pub clock: C,
    pub log: EventLog,
    pub quit: QuitSignal,
    pub display: Box<dyn ScoreDisplay>,
    pub stats: Box<dyn StatsStore>,
}

impl<C: Clock> Context<C> {
    /// Silent defaults: no event log, display to the log facade, statistics
    /// in memory.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            log: EventLog::disabled(),
            quit: QuitSignal::new(),
            display: Box::new(LogDisplay),
            stats: Box::new(MemoryStatsStore::new()),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_quit(mut self, quit: QuitSignal) -> Self {
        self.quit = quit;
        self
    }

    pub fn with_display<D: ScoreDisplay + 'static>(mut self, display: D) -> Self {
        self.display = Box::new(display);
        self
    }

    pub fn with_boxed_display(mut self, display: Box<dyn ScoreDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn with_stats<S: StatsStore + 'static>(mut self, stats: S) -> Self {
        self.stats = Box::new(stats);
        self
    }
}

pub struct Engine<B: GpioBackend, C: Clock> {
    settings: GameSettings,
    strip: LightStrip<B>,
    button: Button<B>,
    clock: C,
    log: EventLog,
    quit: QuitSignal,
    display: Box<dyn ScoreDisplay>,
    stats_store: Box<dyn StatsStore>,
    stats: Statistics,
    session: Option<SessionState>,
    state: EngineState,
}

impl<B: GpioBackend, C: Clock> Engine<B, C> {
    pub fn new(
        settings: GameSettings,
        strip: LightStrip<B>,
        button: Button<B>,
        ctx: Context<C>,
    ) -> Self {
        Self {
            settings,
            strip,
            button,
            clock: ctx.clock,
            log: ctx.log,
            quit: ctx.quit,
            display: ctx.display,
            stats_store: ctx.stats,
            stats: Statistics::default(),
            session: None,
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Current attempt, or the last one once it has ended
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// Alternate between idle and attempts until the idle timer runs out,
    /// quit is requested or the hardware fails. Every path ends with the
    /// shutdown sweep.
    pub fn run(&mut self) -> Result<ExitReason, EngineError> {
        let result = self.cycle();
        if let Err(err) = &result {
            self.log.record(&Event::HardwareFault {
                detail: format!("aborting: {err}"),
            });
        }
        self.shutdown();
        result
    }

    fn cycle(&mut self) -> Result<ExitReason, EngineError> {
        loop {
            match self.idle()? {
                IdleOutcome::Start => {}
                IdleOutcome::Timeout => return Ok(ExitReason::IdleTimeout),
                IdleOutcome::Quit => return Ok(ExitReason::Quit),
            }
            if self.play_attempt()?.end == AttemptEnd::Quit {
                return Ok(ExitReason::Quit);
            }
        }
    }

    /// Enter idle: refresh statistics, show the high score, then poll the
    /// button until it is pressed or the idle timer expires.
    pub fn idle(&mut self) -> Result<IdleOutcome, EngineError> {
        self.state = EngineState::Idle;
        let loaded = self.stats_store.load();
        self.stats.absorb(loaded);
        self.log.record(&Event::IdleEntered {
            high_score: self.stats.high_score,
        });
        self.show(self.stats.high_score);
        if self.button.discard_pending() == Reading::Fault {
            return Err(EngineError::ButtonFault);
        }

        let mut idle_timer = Timer::new();
        idle_timer.arm(&self.clock, self.settings.idle_timeout_secs)?;
        loop {
            if self.quit.is_raised() {
                self.log.record(&Event::QuitRequested);
                return Ok(IdleOutcome::Quit);
            }
            match self.button.is_pressed() {
                Reading::Pressed => {
                    self.state = EngineState::Playing;
                    return Ok(IdleOutcome::Start);
                }
                Reading::Fault => return Err(EngineError::ButtonFault),
                Reading::NotPressed => {}
            }
            if idle_timer.expired(&self.clock) {
                self.log.record(&Event::IdleTimeout);
                return Ok(IdleOutcome::Timeout);
            }
            self.clock.pause();
        }
    }

    /// Play one attempt from `reset` until the lives run out (or quit).
    /// Returns to idle afterwards.
    pub fn play_attempt(&mut self) -> Result<AttemptSummary, EngineError> {
        let started = self.clock.now();
        self.reset()?;

        let mut end = AttemptEnd::LivesExhausted;
        if self.settle(false)? == WaitOutcome::Quit {
            end = AttemptEnd::Quit;
        }
        while end != AttemptEnd::Quit {
            self.begin_level()?;
            let report = self.play_level()?;
            let settled = match report.outcome {
                LevelOutcome::Quit => {
                    end = AttemptEnd::Quit;
                    break;
                }
                LevelOutcome::Pass => self.conclude_pass()?,
                LevelOutcome::Fail(reason) => {
                    let settled = self.settle(false)?;
                    self.conclude_fail(reason)?;
                    if self.session.as_ref().map_or(true, SessionState::is_over) {
                        break;
                    }
                    settled
                }
            };
            if settled == WaitOutcome::Quit {
                end = AttemptEnd::Quit;
            }
        }
        if end == AttemptEnd::Quit {
            self.log.record(&Event::QuitRequested);
        }

        let seconds = self.clock.now().saturating_sub(started).as_secs_f64();
        let level = self.session.as_ref().map_or(0, SessionState::level);
        self.stats.total_time_played += seconds;
        self.save_stats();
        self.log.record(&Event::AttemptEnded { level, seconds });
        self.strip.fill(false)?;
        self.state = EngineState::Idle;
        Ok(AttemptSummary {
            end,
            level,
            seconds,
        })
    }

    /// Fresh session state for a new attempt with the strip cleared
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.state = EngineState::Playing;
        let session = SessionState::new(&self.settings);
        self.log.record(&Event::AttemptStarted {
            lives: session.lives(),
        });
        self.session = Some(session);
        self.strip.fill(false)?;
        self.show(0);
        Ok(())
    }

    /// Roll the direction, light the starting edge, drop presses queued
    /// before the level and arm both timers.
    pub fn begin_level(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        session.pick_direction(self.clock.wall_tick());
        self.strip.apply(&session.light_states())?;
        if self.button.discard_pending() == Reading::Fault {
            return Err(EngineError::ButtonFault);
        }
        let (per_light, per_level) = (session.time_per_light(), session.time_per_level());
        session.light_timer.arm(&self.clock, per_light)?;
        session.level_timer.arm(&self.clock, per_level)?;
        self.log.record(&Event::LevelStarted {
            level: session.level(),
            moving_right: session.moving_right(),
            time_per_light: session.time_per_light(),
        });
        Ok(())
    }

    /// Poll until the level is decided.
    ///
    /// Every iteration checks quit, steps the light if its timer fired, reads
    /// the button and then checks the level timer. The level timer is checked
    /// even when the light stepped in the same iteration, so a timeout is
    /// never deferred by a light step.
    pub fn play_level(&mut self) -> Result<LevelReport, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        let started = self.clock.now();
        let mut advances = 0;

        let outcome = loop {
            if self.quit.is_raised() {
                break LevelOutcome::Quit;
            }
            if session.light_timer.expired(&self.clock) {
                session.advance();
                self.strip.apply(&session.light_states())?;
                let per_light = session.time_per_light();
                session.light_timer.arm(&self.clock, per_light)?;
                advances += 1;
            }
            match self.button.is_pressed() {
                Reading::Fault => return Err(EngineError::ButtonFault),
                Reading::Pressed => {
                    self.stats.times_pressed += 1;
                    break if session.on_target() {
                        LevelOutcome::Pass
                    } else {
                        LevelOutcome::Fail(FailReason::Miss {
                            position: session.position(),
                        })
                    };
                }
                Reading::NotPressed => {}
            }
            if session.level_timer.expired(&self.clock) {
                break LevelOutcome::Fail(FailReason::Timeout);
            }
            self.clock.pause();
        };

        Ok(LevelReport {
            outcome,
            position: session.position(),
            advances,
            elapsed: self.clock.now().saturating_sub(started),
        })
    }

    /// Settle (with the flash), speed up, count the level and persist the
    /// new high score.
    fn conclude_pass(&mut self) -> Result<WaitOutcome, EngineError> {
        let settled = self.settle(self.settings.flash_on_pass)?;
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        session.pass_level(self.settings.speedup_factor);
        let level = session.level();
        self.log.record(&Event::LevelPassed {
            level,
            time_per_light: session.time_per_light(),
        });
        if self.stats.record_level(level) {
            log::info!("new high score {level}");
        }
        self.save_stats();
        self.show(level);
        Ok(settled)
    }

    /// Returns the lives left
    fn conclude_fail(&mut self, reason: FailReason) -> Result<u32, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        self.log.record(&Event::LevelFailed {
            level: session.level(),
            reason,
        });
        let remaining = session.lose_life();
        self.log.record(&Event::LifeLost { remaining });
        Ok(remaining)
    }

    /// Pause between levels. The optional flash (all on, then all off) is
    /// taken out of the settle time.
    fn settle(&mut self, flash: bool) -> Result<WaitOutcome, EngineError> {
        let mut settle_timer = Timer::new();
        settle_timer.arm(&self.clock, self.settings.settle_secs)?;
        if flash {
            for on in [true, false] {
                self.strip.fill(on)?;
                if spin_for(&self.clock, self.settings.flash_secs, &self.quit)? == WaitOutcome::Quit {
                    self.strip.fill(false)?;
                    return Ok(WaitOutcome::Quit);
                }
            }
        }
        Ok(spin_until_expired(&self.clock, &settle_timer, &self.quit))
    }

    fn show(&mut self, value: u32) {
        if let Err(err) = self.display.show(value) {
            self.log.record(&Event::DisplayFault {
                detail: err.to_string(),
            });
        }
    }

    fn save_stats(&mut self) {
        if let Err(err) = self.stats_store.save(&self.stats) {
            self.log.record(&Event::StatsUnavailable {
                detail: err.to_string(),
            });
        }
    }

    /// Switch every light off and release every line. Best effort: failures
    /// are logged and the sweep carries on.
    pub fn shutdown(&mut self) {
        if self.state == EngineState::Exited {
            return;
        }
        if let Err(err) = self.strip.release() {
            self.log.record(&Event::HardwareFault {
                detail: format!("shutdown: {err}"),
            });
        }
        if let Err(err) = self.button.release() {
            self.log.record(&Event::HardwareFault {
                detail: format!("shutdown: {err}"),
            });
        }
        self.log.record(&Event::Shutdown);
        self.state = EngineState::Exited;
    }
}
