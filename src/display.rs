//! Numeric score display.

use thiserror::Error;

use crate::hw::{DigitalLine, Direction, GpioBackend, LineError, LineId};
use crate::telemetry::EventLog;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display line failed: {0}")]
    Line(#[from] LineError),
    #[error("display unavailable: {0}")]
    Unavailable(String),
}

/// Renders a single integer (current level or high score)
pub trait ScoreDisplay {
    fn show(&mut self, value: u32) -> Result<(), DisplayError>;
}

/// Used when no display is wired: the value only goes to the log facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDisplay;

impl ScoreDisplay for LogDisplay {
    fn show(&mut self, value: u32) -> Result<(), DisplayError> {
        log::info!("display {value}");
        Ok(())
    }
}

/// BCD bit stream for `digits` decimal digits, most significant digit first,
/// each digit MSB first. Values that do not fit saturate to all nines.
pub fn serialize_for_display(value: u32, digits: u8) -> Vec<bool> {
    let digits = u32::from(digits.min(10));
    let limit = 10u64.pow(digits);
    let value = if u64::from(value) >= limit {
        (limit - 1) as u32
    } else {
        value
    };

    let mut bits = Vec::with_capacity(digits as usize * 4);
    for place in (0..digits).rev() {
        let digit = (u64::from(value) / 10u64.pow(place) % 10) as u8;
        for bit in (0..4).rev() {
            bits.push(digit & (1 << bit) != 0);
        }
    }
    bits
}

/// Line numbers of a shift-register display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShiftRegisterPins {
    pub data: LineId,
    pub clock: LineId,
    pub latch: LineId,
}

/// BCD-to-7-segment drivers behind a chain of shift registers
#[derive(Debug)]
pub struct ShiftRegisterDisplay<B: GpioBackend> {
    data: DigitalLine<B>,
    clock: DigitalLine<B>,
    latch: DigitalLine<B>,
    digits: u8,
}

impl<B: GpioBackend> ShiftRegisterDisplay<B> {
    pub fn open(
        pins: ShiftRegisterPins,
        digits: u8,
        backend: &B,
        log: &EventLog,
    ) -> Result<Self, LineError> {
        let open = |id: LineId| -> Result<DigitalLine<B>, LineError> {
            let mut line = DigitalLine::new(id, backend.clone(), log.clone());
            line.activate()?;
            line.set_direction(Direction::Output)?;
            line.write(false)?;
            Ok(line)
        };
        Ok(Self {
            data: open(pins.data)?,
            clock: open(pins.clock)?,
            latch: open(pins.latch)?,
            digits,
        })
    }
}

impl<B: GpioBackend> ScoreDisplay for ShiftRegisterDisplay<B> {
    fn show(&mut self, value: u32) -> Result<(), DisplayError> {
        for bit in serialize_for_display(value, self.digits) {
            self.data.write(bit)?;
            self.clock.write(true)?;
            self.clock.write(false)?;
        }
        self.latch.write(true)?;
        self.latch.write(false)?;
        Ok(())
    }
}
