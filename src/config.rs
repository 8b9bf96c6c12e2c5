use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::display::ShiftRegisterPins;
use crate::hw::LineId;
use crate::timer::{to_duration, TimerError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayPins {
    pub data: i32,
    pub clock: i32,
    pub latch: i32,
}

impl From<DisplayPins> for ShiftRegisterPins {
    fn from(pins: DisplayPins) -> Self {
        Self {
            data: LineId::new(pins.data),
            clock: LineId::new(pins.clock),
            latch: LineId::new(pins.latch),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub light_pins: Vec<i32>,
    pub button_pin: i32,
    pub button_active_low: bool,
    pub display: Option<DisplayPins>,
    pub display_digits: u8,
    pub target_index: Option<usize>,
    pub initial_time_per_light: f64,
    pub speedup_factor: f64,
    pub time_per_level: f64,
    pub lives: u32,
    pub settle_secs: f64,
    pub flash_on_pass: bool,
    pub flash_secs: f64,
    pub idle_timeout_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            light_pins: vec![5, 6, 13, 19, 26, 12, 16, 20, 21],
            button_pin: 17,
            button_active_low: false,
            display: None,
            display_digits: 2,
            target_index: None,
            initial_time_per_light: 0.4,
            speedup_factor: 0.8,
            time_per_level: 10.0,
            lives: 3,
            settle_secs: 1.0,
            flash_on_pass: true,
            flash_secs: 0.25,
            idle_timeout_secs: 15.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one light is required")]
    NoLights,
    #[error("target index {target} is outside a strip of {count} lights")]
    TargetOutOfRange { target: usize, count: usize },
    #[error("speed-up factor must be strictly between 0 and 1 (got {0})")]
    SpeedupOutOfRange(f64),
    #[error("time per light must be positive (got {0}s)")]
    TimePerLight(f64),
    #[error("{name}: {source}")]
    Duration {
        name: &'static str,
        #[source]
        source: TimerError,
    },
    #[error("at least one life is required")]
    NoLives,
}

/// Validated, immutable game parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    pub light_count: usize,
    pub target_index: usize,
    pub initial_time_per_light: f64,
    pub speedup_factor: f64,
    pub time_per_level: f64,
    pub lives: u32,
    pub settle_secs: f64,
    pub flash_on_pass: bool,
    pub flash_secs: f64,
    pub idle_timeout_secs: f64,
}

impl GameSettings {
    /// Defaults for a strip of `light_count` lights
    pub fn for_lights(light_count: usize) -> Result<Self, ConfigError> {
        Config {
            light_pins: (0..light_count as i32).collect(),
            ..Config::default()
        }
        .game_settings()
    }
}

fn check_duration(name: &'static str, seconds: f64) -> Result<(), ConfigError> {
    to_duration(seconds)
        .map(|_| ())
        .map_err(|source| ConfigError::Duration { name, source })
}

impl Config {
    pub fn light_ids(&self) -> Vec<LineId> {
        self.light_pins.iter().map(|p| LineId::new(*p)).collect()
    }

    pub fn button_id(&self) -> LineId {
        LineId::new(self.button_pin)
    }

    pub fn game_settings(&self) -> Result<GameSettings, ConfigError> {
        let light_count = self.light_pins.len();
        if light_count == 0 {
            return Err(ConfigError::NoLights);
        }
        let target_index = self.target_index.unwrap_or(light_count / 2);
        if target_index >= light_count {
            return Err(ConfigError::TargetOutOfRange {
                target: target_index,
                count: light_count,
            });
        }
        if !(self.speedup_factor > 0.0 && self.speedup_factor < 1.0) {
            return Err(ConfigError::SpeedupOutOfRange(self.speedup_factor));
        }
        check_duration("time per light", self.initial_time_per_light)?;
        if self.initial_time_per_light <= 0.0 {
            return Err(ConfigError::TimePerLight(self.initial_time_per_light));
        }
        check_duration("time per level", self.time_per_level)?;
        check_duration("settle", self.settle_secs)?;
        check_duration("flash", self.flash_secs)?;
        check_duration("idle timeout", self.idle_timeout_secs)?;
        if self.lives == 0 {
            return Err(ConfigError::NoLives);
        }

        Ok(GameSettings {
            light_count,
            target_index,
            initial_time_per_light: self.initial_time_per_light,
            speedup_factor: self.speedup_factor,
            time_per_level: self.time_per_level,
            lives: self.lives,
            settle_secs: self.settle_secs,
            flash_on_pass: self.flash_on_pass,
            flash_secs: self.flash_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(err) => log::warn!(
                    "ignoring malformed config {}: {err}",
                    self.path.display()
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
