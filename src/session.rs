use crate::config::GameSettings;
use crate::timer::Timer;

/// Mutable record of one attempt.
///
/// Invariants: `position < light_count`, `time_per_light > 0`, and the target
/// index is fixed for the lifetime of the record.
#[derive(Debug, Clone)]
pub struct SessionState {
    light_count: usize,
    target_index: usize,
    position: usize,
    moving_right: bool,
    time_per_light: f64,
    time_per_level: f64,
    pub light_timer: Timer,
    pub level_timer: Timer,
    level: u32,
    lives: u32,
}

impl SessionState {
    /// Fresh attempt: full lives, level 0, initial speed, unarmed timers.
    pub fn new(settings: &GameSettings) -> Self {
        Self {
            light_count: settings.light_count,
            target_index: settings.target_index,
            position: 0,
            moving_right: true,
            time_per_light: settings.initial_time_per_light,
            time_per_level: settings.time_per_level,
            light_timer: Timer::new(),
            level_timer: Timer::new(),
            level: 0,
            lives: settings.lives,
        }
    }

    pub fn light_count(&self) -> usize {
        self.light_count
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn moving_right(&self) -> bool {
        self.moving_right
    }

    pub fn time_per_light(&self) -> f64 {
        self.time_per_light
    }

    pub fn time_per_level(&self) -> f64 {
        self.time_per_level
    }

    /// Levels cleared this attempt
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn on_target(&self) -> bool {
        self.position == self.target_index
    }

    /// Direction from the parity of a coarse clock tick; the sweep starts at
    /// the matching edge. Deliberately low-entropy.
    pub fn pick_direction(&mut self, tick: u64) {
        self.moving_right = tick % 2 == 0;
        self.position = if self.moving_right {
            0
        } else {
            self.light_count - 1
        };
    }

    /// One step of the sweep, wrapping at the ends
    pub fn advance(&mut self) {
        let step = if self.moving_right {
            1
        } else {
            self.light_count - 1
        };
        self.position = (self.position + step) % self.light_count;
    }

    /// Exactly one `true`, at the current position
    pub fn light_states(&self) -> Vec<bool> {
        (0..self.light_count).map(|i| i == self.position).collect()
    }

    /// Record a pass: one more level, next level strictly faster.
    /// `factor` must lie in (0, 1), which `GameSettings` guarantees.
    pub fn pass_level(&mut self, factor: f64) {
        debug_assert!(factor > 0.0 && factor < 1.0);
        let faster = self.time_per_light * factor;
        if faster > 0.0 {
            self.time_per_light = faster;
        }
        self.level += 1;
    }

    /// Returns the lives left after losing one
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    pub fn is_over(&self) -> bool {
        self.lives == 0
    }
}
