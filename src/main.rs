use clap::{Parser, ValueEnum};
use deltat::{
    app_dirs::AppDirs,
    config::{Config, ConfigError, ConfigStore, FileConfigStore, GameSettings},
    display::{LogDisplay, ScoreDisplay, ShiftRegisterDisplay},
    engine::{Context, Engine, EngineError, ExitReason},
    hw::{sysfs, Button, GpioBackend, LightStrip, LineError, StripError, SysfsGpio},
    runtime::{QuitSignal, SystemClock},
    stats::FileStatsStore,
    telemetry::EventLog,
    terminal::{RawModeGuard, TerminalGpio},
};
use std::{io, path::PathBuf, process::ExitCode};
use thiserror::Error;

const EXIT_STARTUP: u8 = 1;
const EXIT_FAULT: u8 = 3;

/// light-sweep reaction game for GPIO lights and a push button
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A single-player reaction game: a light sweeps along a strip of GPIO-driven lights and the player presses one button when the target light is lit. Each pass speeds the sweep up."
)]
pub struct Cli {
    /// where the lights and the button live
    #[clap(short = 'b', long, value_enum, default_value_t = Backend::Sysfs)]
    backend: Backend,

    /// sysfs GPIO directory
    #[clap(long, default_value = sysfs::DEFAULT_ROOT)]
    gpio_root: PathBuf,

    /// configuration file (JSON)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// statistics file (JSON)
    #[clap(long)]
    stats: Option<PathBuf>,

    /// event log file
    #[clap(long)]
    log: Option<PathBuf>,

    /// number of virtual lights (terminal backend only)
    #[clap(short = 'n', long)]
    lights: Option<usize>,

    /// lives per attempt
    #[clap(long)]
    lives: Option<u32>,

    /// seconds to wait for a press before exiting
    #[clap(long)]
    idle_timeout: Option<f64>,

    /// seconds each light stays lit on the first level
    #[clap(long)]
    time_per_light: Option<f64>,

    /// seconds allowed per level
    #[clap(long)]
    time_per_level: Option<f64>,

    /// time-per-light multiplier applied after each pass, in (0, 1)
    #[clap(long)]
    speedup: Option<f64>,

    /// index of the light to hit
    #[clap(short = 't', long)]
    target: Option<usize>,

    /// do not flash the strip after a pass
    #[clap(long)]
    no_flash: bool,

    /// save the effective configuration and exit
    #[clap(long)]
    write_config: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum Backend {
    Sysfs,
    Terminal,
}

impl Cli {
    /// Layer command-line overrides over the stored configuration
    fn apply_to(&self, mut cfg: Config) -> Config {
        if let Some(lives) = self.lives {
            cfg.lives = lives;
        }
        if let Some(secs) = self.idle_timeout {
            cfg.idle_timeout_secs = secs;
        }
        if let Some(secs) = self.time_per_light {
            cfg.initial_time_per_light = secs;
        }
        if let Some(secs) = self.time_per_level {
            cfg.time_per_level = secs;
        }
        if let Some(factor) = self.speedup {
            cfg.speedup_factor = factor;
        }
        if let Some(target) = self.target {
            cfg.target_index = Some(target);
        }
        if self.no_flash {
            cfg.flash_on_pass = false;
        }
        cfg
    }

    /// Pins for the terminal backend: lights `0..n`, the button right after
    fn virtual_pins(&self, mut cfg: Config) -> Config {
        let count = self.lights.unwrap_or(cfg.light_pins.len());
        cfg.light_pins = (0..count as i32).collect();
        cfg.button_pin = count as i32;
        cfg.button_active_low = false;
        cfg.display = None;
        cfg
    }
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("could not save configuration: {0}")]
    WriteConfig(#[source] io::Error),
    #[error("light strip: {0}")]
    Strip(#[from] StripError),
    #[error("button: {0}")]
    Button(#[source] LineError),
    #[error("display: {0}")]
    Display(#[source] LineError),
    #[error("terminal: {0}")]
    Terminal(#[source] io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match launch(&cli) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(Ok(reason))) => {
            log::info!("exiting after {reason:?}");
            ExitCode::SUCCESS
        }
        Ok(Some(Err(err))) => {
            eprintln!("deltat: {err}");
            ExitCode::from(EXIT_FAULT)
        }
        Err(err) => {
            eprintln!("deltat: {err}");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

/// `Ok(None)` when there was nothing to play (`--write-config`)
fn launch(cli: &Cli) -> Result<Option<Result<ExitReason, EngineError>>, StartupError> {
    let store = cli
        .config
        .as_ref()
        .map_or_else(FileConfigStore::new, FileConfigStore::with_path);
    let cfg = cli.apply_to(store.load());
    if cli.write_config {
        store.save(&cfg).map_err(StartupError::WriteConfig)?;
        println!("wrote {}", store.path().display());
        return Ok(None);
    }

    let log = EventLog::open(cli.log.clone().unwrap_or_else(AppDirs::log_path));
    let stats = cli
        .stats
        .as_ref()
        .map_or_else(FileStatsStore::new, FileStatsStore::with_path);
    let quit = QuitSignal::new();
    let ctx = Context::new(SystemClock::new())
        .with_log(log.clone())
        .with_quit(quit.clone())
        .with_stats(stats);

    let outcome = match cli.backend {
        Backend::Sysfs => {
            if cli.lights.is_some() {
                log::warn!("--lights only applies to the terminal backend");
            }
            let settings = cfg.game_settings()?;
            let gpio = SysfsGpio::with_root(&cli.gpio_root);
            log::info!("driving GPIO lines under {}", gpio.root().display());
            let display: Box<dyn ScoreDisplay> = match cfg.display {
                Some(pins) => Box::new(
                    ShiftRegisterDisplay::open(pins.into(), cfg.display_digits, &gpio, &log)
                        .map_err(StartupError::Display)?,
                ),
                None => Box::new(LogDisplay),
            };
            play(&cfg, &gpio, settings, ctx.with_boxed_display(display))?
        }
        Backend::Terminal => {
            let cfg = cli.virtual_pins(cfg);
            let settings = cfg.game_settings()?;
            let gpio = TerminalGpio::new(
                cfg.light_pins.iter().map(|p| *p as u32).collect(),
                cfg.button_pin as u32,
                quit,
            )
            .with_target(settings.target_index);
            let _raw = RawModeGuard::new().map_err(StartupError::Terminal)?;
            play(&cfg, &gpio, settings, ctx.with_display(gpio.display()))?
        }
    };
    Ok(Some(outcome))
}

fn play<B: GpioBackend>(
    cfg: &Config,
    gpio: &B,
    settings: GameSettings,
    ctx: Context<SystemClock>,
) -> Result<Result<ExitReason, EngineError>, StartupError> {
    let strip = LightStrip::open(&cfg.light_ids(), gpio, &ctx.log)?;
    let button = Button::open(cfg.button_id(), cfg.button_active_low, gpio, &ctx.log)
        .map_err(StartupError::Button)?;
    let lights: Vec<String> = strip.ids().iter().map(ToString::to_string).collect();
    log::info!("lights {}, button {}", lights.join(" "), button.id());
    let mut engine = Engine::new(settings, strip, button, ctx);
    Ok(engine.run())
}
