//! Append-only event log.
//!
//! One human-readable line per significant game event, prefixed with a local
//! RFC 3339 timestamp. The log is write-only from the game's point of view and
//! must never fail or block gameplay: the first write failure is reported on
//! stderr, later ones are dropped silently.

use std::cell::RefCell;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use chrono::Local;

/// Why a level ended without a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailReason {
    /// Button pressed while the lit position was off target
    Miss { position: usize },
    /// Level timer ran out before any press
    Timeout,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    IdleEntered { high_score: u32 },
    IdleTimeout,
    QuitRequested,
    AttemptStarted { lives: u32 },
    LevelStarted {
        level: u32,
        moving_right: bool,
        time_per_light: f64,
    },
    LevelPassed { level: u32, time_per_light: f64 },
    LevelFailed { level: u32, reason: FailReason },
    LifeLost { remaining: u32 },
    AttemptEnded { level: u32, seconds: f64 },
    HardwareFault { detail: String },
    DisplayFault { detail: String },
    StatsUnavailable { detail: String },
    Shutdown,
}

impl Event {
    fn is_fault(&self) -> bool {
        matches!(
            self,
            Event::HardwareFault { .. } | Event::DisplayFault { .. } | Event::StatsUnavailable { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::IdleEntered { high_score } => write!(f, "idle high-score={high_score}"),
            Event::IdleTimeout => f.write_str("idle-timeout"),
            Event::QuitRequested => f.write_str("quit-requested"),
            Event::AttemptStarted { lives } => write!(f, "attempt-started lives={lives}"),
            Event::LevelStarted {
                level,
                moving_right,
                time_per_light,
            } => write!(
                f,
                "level-started level={level} direction={} time-per-light={time_per_light:.3}s",
                if *moving_right { "right" } else { "left" }
            ),
            Event::LevelPassed {
                level,
                time_per_light,
            } => write!(
                f,
                "level-passed level={level} next-time-per-light={time_per_light:.3}s"
            ),
            Event::LevelFailed { level, reason } => match reason {
                FailReason::Miss { position } => {
                    write!(f, "level-failed level={level} reason=miss position={position}")
                }
                FailReason::Timeout => write!(f, "level-failed level={level} reason=timeout"),
            },
            Event::LifeLost { remaining } => write!(f, "life-lost remaining={remaining}"),
            Event::AttemptEnded { level, seconds } => {
                write!(f, "attempt-ended level={level} played={seconds:.2}s")
            }
            Event::HardwareFault { detail } => write!(f, "hardware-fault {detail}"),
            Event::DisplayFault { detail } => write!(f, "display-fault {detail}"),
            Event::StatsUnavailable { detail } => write!(f, "stats-unavailable {detail}"),
            Event::Shutdown => f.write_str("shutdown"),
        }
    }
}

struct Sink {
    writer: Option<Box<dyn Write>>,
    reported: bool,
}

/// Clonable handle to the process event log
#[derive(Clone)]
pub struct EventLog {
    sink: Rc<RefCell<Sink>>,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = self.sink.borrow();
        f.debug_struct("EventLog")
            .field("enabled", &sink.writer.is_some())
            .field("reported", &sink.reported)
            .finish()
    }
}

impl EventLog {
    /// Open (or create) `path` for appending. A log that cannot be opened is
    /// reported once and replaced by a disabled sink.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        match Self::open_file(path.as_ref()) {
            Ok(file) => Self::to_writer(file),
            Err(err) => {
                eprintln!(
                    "deltat: event log {} unavailable: {err}",
                    path.as_ref().display()
                );
                Self::with_sink(None, true)
            }
        }
    }

    fn open_file(path: &Path) -> io::Result<fs::File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    pub fn to_writer<W: Write + 'static>(writer: W) -> Self {
        Self::with_sink(Some(Box::new(writer)), false)
    }

    pub fn disabled() -> Self {
        Self::with_sink(None, false)
    }

    fn with_sink(writer: Option<Box<dyn Write>>, reported: bool) -> Self {
        Self {
            sink: Rc::new(RefCell::new(Sink { writer, reported })),
        }
    }

    pub fn record(&self, event: &Event) {
        if event.is_fault() {
            log::warn!("{event}");
        } else {
            log::info!("{event}");
        }

        let mut sink = self.sink.borrow_mut();
        let Some(writer) = sink.writer.as_mut() else {
            return;
        };
        let stamp = Local::now().to_rfc3339();
        let result = writeln!(writer, "{stamp} {event}").and_then(|_| writer.flush());
        if let Err(err) = result {
            if !sink.reported {
                eprintln!("deltat: event log write failed: {err}");
                sink.reported = true;
            }
            log::debug!("event log write dropped: {err}");
        }
    }
}

/// In-memory writer whose contents stay readable after being handed to an
/// [`EventLog`].
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
