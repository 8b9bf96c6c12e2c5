//! Hardware boundary: digital lines and the devices built from them.
//!
//! Everything above [`GpioBackend`] is platform-neutral. A backend only knows
//! how to export, configure and read/write a numbered line; [`DigitalLine`]
//! adds the activation lifecycle and the checks, and the strip, button and
//! display drivers own their lines outright.

use std::fmt;
use std::io;

use thiserror::Error;

pub mod button;
pub mod line;
pub mod memory;
pub mod strip;
pub mod sysfs;

pub use button::{Button, Reading};
pub use line::DigitalLine;
pub use memory::{InputRule, MemoryGpio};
pub use strip::{LightStrip, StripError};
pub use sysfs::SysfsGpio;

/// Logical line identifier. Negative values are the invalid sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineId(i32);

impl LineId {
    pub const INVALID: LineId = LineId(-1);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// The backend line number, if this id is valid
    pub fn number(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "gpio{}", self.0)
        } else {
            f.write_str("gpio<invalid>")
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Direction {
    #[strum(serialize = "in")]
    Input,
    #[strum(serialize = "out")]
    Output,
}

#[derive(Debug, Error)]
pub enum LineError {
    #[error("{0} has an invalid identifier")]
    InvalidId(LineId),
    #[error("{0} is not active")]
    NotActive(LineId),
    #[error("{line} is not configured as {expected}")]
    WrongDirection { line: LineId, expected: Direction },
    #[error("{line}: {op} failed: {source}")]
    Io {
        line: LineId,
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl LineError {
    /// `true` for failures reported by the OS rather than misuse of the API
    pub fn is_hardware_fault(&self) -> bool {
        matches!(self, LineError::Io { .. })
    }
}

/// OS mechanism behind a set of numbered lines.
///
/// Handles are cheap to clone and share one underlying bank; methods take
/// `&self` so several lines can drive the same backend.
pub trait GpioBackend: Clone {
    fn export(&self, line: u32) -> io::Result<()>;
    fn unexport(&self, line: u32) -> io::Result<()>;
    fn set_direction(&self, line: u32, direction: Direction) -> io::Result<()>;
    fn read_value(&self, line: u32) -> io::Result<bool>;
    fn write_value(&self, line: u32, on: bool) -> io::Result<()>;

    /// Drop input events queued on `line` since it was last read. Backends
    /// that sample a live level have nothing to drop.
    fn discard_input(&self, _line: u32) -> io::Result<()> {
        Ok(())
    }
}
