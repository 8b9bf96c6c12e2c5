use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// Long-lived player statistics, persisted across attempts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Statistics {
    /// Most levels cleared in a single attempt
    pub high_score: u32,
    /// Seconds spent in attempts
    pub total_time_played: f64,
    /// Button presses that ended a level
    pub times_pressed: u64,
}

impl Statistics {
    /// Fold a freshly loaded record into what the process already knows.
    /// No field ever decreases.
    pub fn absorb(&mut self, loaded: Statistics) {
        self.high_score = self.high_score.max(loaded.high_score);
        self.total_time_played = self.total_time_played.max(loaded.total_time_played);
        self.times_pressed = self.times_pressed.max(loaded.times_pressed);
    }

    /// Returns `true` when `level` is a new high score
    pub fn record_level(&mut self, level: u32) -> bool {
        if level > self.high_score {
            self.high_score = level;
            true
        } else {
            false
        }
    }
}

/// Read-modify-write access to the statistics record.
///
/// `load` never fails: an absent or malformed record reads as zeroes.
pub trait StatsStore {
    fn load(&self) -> Statistics;
    fn save(&self, stats: &Statistics) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::stats_path(),
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

impl StatsStore for FileStatsStore {
    fn load(&self) -> Statistics {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                log::warn!("statistics {} unreadable: {err}", self.path.display());
                Statistics::default()
            }),
            Err(_) => Statistics::default(),
        }
    }

    fn save(&self, stats: &Statistics) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(stats)?;
        fs::write(&self.path, data)
    }
}

/// Statistics kept in memory only
#[derive(Debug, Default, Clone)]
pub struct MemoryStatsStore {
    saved: std::rc::Rc<std::cell::Cell<Option<Statistics>>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_saved(&self) -> Option<Statistics> {
        self.saved.get()
    }
}

impl StatsStore for MemoryStatsStore {
    fn load(&self) -> Statistics {
        self.saved.get().unwrap_or_default()
    }

    fn save(&self, stats: &Statistics) -> std::io::Result<()> {
        self.saved.set(Some(*stats));
        Ok(())
    }
}
