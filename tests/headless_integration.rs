use std::time::Duration;

use assert_matches::assert_matches;
use deltat::config::{Config, GameSettings};
use deltat::display::{DisplayError, ScoreDisplay};
use deltat::engine::{Context, Engine, EngineError, ExitReason};
use deltat::hw::{Button, InputRule, LightStrip, LineId, MemoryGpio, StripError};
use deltat::runtime::{Clock, QuitSignal, SimClock};
use deltat::stats::{MemoryStatsStore, Statistics, StatsStore};
use deltat::telemetry::{EventLog, SharedBuffer};

// Whole games played headless: MemoryGpio lines, a simulated clock that
// advances 10ms per poll and an in-memory event log.

const LIGHTS: [u32; 9] = [5, 6, 13, 19, 26, 12, 16, 20, 21];
const BUTTON: u32 = 17;

struct Harness {
    gpio: MemoryGpio,
    clock: SimClock,
    events: SharedBuffer,
    log: EventLog,
    stats: MemoryStatsStore,
}

impl Harness {
    fn new(wall_origin: u64) -> Self {
        let clock = SimClock::new(Duration::from_millis(10)).with_wall_origin(wall_origin);
        let events = SharedBuffer::new();
        Self {
            gpio: MemoryGpio::new().with_clock(clock.clone()),
            log: EventLog::to_writer(events.clone()),
            clock,
            events,
            stats: MemoryStatsStore::new(),
        }
    }

    fn settings() -> GameSettings {
        Config {
            speedup_factor: 0.5,
            time_per_level: 5.0,
            idle_timeout_secs: 2.0,
            ..Config::default()
        }
        .game_settings()
        .unwrap()
    }

    fn engine(&self, ctx: Context<SimClock>) -> Engine<MemoryGpio, SimClock> {
        let ids: Vec<LineId> = LIGHTS.iter().map(|p| LineId::new(*p as i32)).collect();
        let strip = LightStrip::open(&ids, &self.gpio, &self.log).unwrap();
        let button = Button::open(LineId::new(BUTTON as i32), false, &self.gpio, &self.log).unwrap();
        Engine::new(Self::settings(), strip, button, ctx)
    }

    fn context(&self) -> Context<SimClock> {
        Context::new(self.clock.clone())
            .with_log(self.log.clone())
            .with_stats(self.stats.clone())
    }

    fn press_at(&self, from_ms: u64, to_ms: u64) -> InputRule {
        InputRule::Windows(vec![(
            Duration::from_millis(from_ms),
            Duration::from_millis(to_ms),
        )])
    }
}

#[test]
fn pass_then_three_timeouts_then_idle_exit() {
    let h = Harness::new(1);
    // Start from idle at t=0. The first level starts after the 1s settle with
    // light 0 lit and steps every 400ms, so light 4 is lit from 2.6s.
    h.gpio.set_rules(
        BUTTON,
        vec![h.press_at(0, 50), h.press_at(2650, 2700)],
    );
    let mut engine = h.engine(h.context());

    assert_eq!(engine.run().unwrap(), ExitReason::IdleTimeout);

    let saved = h.stats.last_saved().unwrap();
    assert_eq!(saved.high_score, 1);
    assert_eq!(saved.times_pressed, 1);
    // 1s settle, 1.65s level, 1s settle, then three 5s levels with a 1s settle each.
    assert!((saved.total_time_played - 21.65).abs() < 0.05);
    // Idle again for 2s before exiting.
    assert!((h.clock.now().as_secs_f64() - 23.65).abs() < 0.05);

    let events = h.events.contents();
    assert!(events.contains("level-started level=0 direction=right time-per-light=0.400s"));
    assert!(events.contains("level-passed level=1 next-time-per-light=0.200s"));
    assert_eq!(
        events
            .matches("level-started level=1 direction=right time-per-light=0.200s")
            .count(),
        3
    );
    assert_eq!(events.matches("reason=timeout").count(), 3);
    assert!(events.contains("life-lost remaining=0"));
    assert!(events.contains("attempt-ended level=1"));
    assert!(events.contains("idle high-score=1"));
    assert!(events.contains("idle-timeout"));
    assert_eq!(h.events.lines().last().map(|l| l.ends_with(" shutdown")), Some(true));

    assert!(h.gpio.exported_lines().is_empty());
    assert!(h.gpio.snapshot(&LIGHTS).iter().all(|on| !on));
}

#[test]
fn misses_keep_the_stored_high_score() {
    let h = Harness::new(0);
    h.stats
        .save(&Statistics {
            high_score: 4,
            total_time_played: 100.0,
            times_pressed: 40,
        })
        .unwrap();
    // Start from idle, then press whenever light 2 is lit: always a miss.
    h.gpio.set_rules(
        BUTTON,
        vec![h.press_at(0, 50), InputRule::Mirror(LIGHTS[2])],
    );
    let mut engine = h.engine(h.context());

    assert_eq!(engine.run().unwrap(), ExitReason::IdleTimeout);

    let events = h.events.contents();
    assert_eq!(events.matches("reason=miss position=2").count(), 3);
    assert_eq!(events.matches("idle high-score=4").count(), 2);
    assert!(events.contains("attempt-ended level=0"));

    let saved = h.stats.last_saved().unwrap();
    assert_eq!(saved.high_score, 4);
    assert_eq!(saved.times_pressed, 43);
    assert!(saved.total_time_played > 100.0);
}

#[test]
fn strip_fault_aborts_and_releases_everything() {
    let h = Harness::new(0);
    h.gpio.set_rules(BUTTON, vec![h.press_at(0, 50)]);
    let mut engine = h.engine(h.context());
    h.gpio.clear_writes();
    h.gpio.fail_writes(LIGHTS[3]);

    assert_matches!(
        engine.run(),
        Err(EngineError::Strip(StripError::Line { index: 3, .. }))
    );

    // Lines before the failing one were updated, later ones were not.
    assert_eq!(
        &h.gpio.writes()[..3],
        &[(LIGHTS[0], false), (LIGHTS[1], false), (LIGHTS[2], false)]
    );
    assert!(h.gpio.exported_lines().is_empty());

    let events = h.events.contents();
    assert!(events.contains("hardware-fault gpio19: write failed"));
    assert!(events.contains("hardware-fault aborting: light strip fault"));
    assert!(events.contains("shutdown"));
}

#[test]
fn button_fault_in_idle_is_not_a_timeout() {
    let h = Harness::new(0);
    let mut engine = h.engine(h.context());
    h.gpio.fail_reads(BUTTON);

    assert_matches!(engine.run(), Err(EngineError::ButtonFault));
    assert_eq!(h.clock.now(), Duration::ZERO);
    assert!(!h.events.contents().contains("idle-timeout"));
    assert!(h.gpio.exported_lines().is_empty());
}

/// Display that raises the quit signal when it is asked to show `trigger`
struct QuitOnShow {
    quit: QuitSignal,
    trigger: u32,
    shown: Vec<u32>,
}

impl ScoreDisplay for QuitOnShow {
    fn show(&mut self, value: u32) -> Result<(), DisplayError> {
        self.shown.push(value);
        if self.shown.len() > 1 && value == self.trigger {
            self.quit.raise();
        }
        Ok(())
    }
}

#[test]
fn quit_during_an_attempt_exits_cleanly() {
    let h = Harness::new(0);
    h.gpio.set_rules(BUTTON, vec![h.press_at(0, 50)]);
    let quit = QuitSignal::new();
    let ctx = h.context().with_quit(quit.clone()).with_display(QuitOnShow {
        quit: quit.clone(),
        trigger: 0,
        shown: Vec::new(),
    });
    let mut engine = h.engine(ctx);

    assert_eq!(engine.run().unwrap(), ExitReason::Quit);
    assert!(quit.is_raised());

    let events = h.events.contents();
    assert!(events.contains("attempt-started lives=3"));
    assert!(events.contains("quit-requested"));
    assert!(events.contains("attempt-ended level=0"));
    assert!(!events.contains("level-started"));
    assert!(h.gpio.exported_lines().is_empty());
}

/// Display that always fails
struct BrokenDisplay;

impl ScoreDisplay for BrokenDisplay {
    fn show(&mut self, _: u32) -> Result<(), DisplayError> {
        Err(DisplayError::Unavailable("unplugged".into()))
    }
}

#[test]
fn display_failures_are_not_fatal() {
    let h = Harness::new(0);
    let mut engine = h.engine(h.context().with_display(BrokenDisplay));

    assert_eq!(engine.run().unwrap(), ExitReason::IdleTimeout);
    assert!(h
        .events
        .contents()
        .contains("display-fault display unavailable: unplugged"));
}

#[test]
fn direction_is_rolled_at_every_level_start() {
    let h = Harness::new(0);
    h.clock.advance(Duration::from_millis(10));
    // Every press lands on light 7, so each level ends early with a miss.
    h.gpio.set_rules(
        BUTTON,
        vec![h.press_at(10, 60), InputRule::Mirror(LIGHTS[7])],
    );
    let mut engine = h.engine(h.context());

    assert_eq!(engine.run().unwrap(), ExitReason::IdleTimeout);

    let directions: Vec<&str> = h
        .events
        .lines()
        .iter()
        .filter(|line| line.contains("level-started"))
        .map(|line| {
            if line.contains("direction=left") {
                "left"
            } else {
                "right"
            }
        })
        .collect();
    // Levels start on wall ticks 1, 2 and 6.
    assert_eq!(directions, vec!["left", "right", "right"]);
    assert_eq!(
        h.events.contents().matches("reason=miss position=7").count(),
        3
    );
}
