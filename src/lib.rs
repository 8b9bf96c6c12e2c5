pub mod app_dirs;
pub mod config;
pub mod display;
pub mod engine;
pub mod hw;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod telemetry;
pub mod terminal;
pub mod timer;

pub use crate::{
    config::{Config, GameSettings},
    engine::{Context, Engine, EngineError, ExitReason},
    runtime::{Clock, QuitSignal, SimClock, SystemClock},
};
