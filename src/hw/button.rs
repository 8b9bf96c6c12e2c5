use super::{DigitalLine, Direction, GpioBackend, LineError, LineId};
use crate::telemetry::EventLog;

/// Tri-state button reading. `Fault` must never be treated as `NotPressed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reading {
    Pressed,
    NotPressed,
    Fault,
}

/// Push button on a single input line
#[derive(Debug)]
pub struct Button<B: GpioBackend> {
    line: DigitalLine<B>,
    active_low: bool,
}

impl<B: GpioBackend> Button<B> {
    pub fn open(
        id: LineId,
        active_low: bool,
        backend: &B,
        log: &EventLog,
    ) -> Result<Self, LineError> {
        let mut line = DigitalLine::new(id, backend.clone(), log.clone());
        line.activate()?;
        line.set_direction(Direction::Input)?;
        Ok(Self { line, active_low })
    }

    pub fn id(&self) -> LineId {
        self.line.id()
    }

    pub fn is_pressed(&mut self) -> Reading {
        match self.line.read() {
            Ok(level) if level != self.active_low => Reading::Pressed,
            Ok(_) => Reading::NotPressed,
            Err(_) => Reading::Fault,
        }
    }

    /// Forget presses made before now. `Fault` if the line cannot be
    /// serviced.
    pub fn discard_pending(&mut self) -> Reading {
        match self.line.discard_input() {
            Ok(()) => Reading::NotPressed,
            Err(_) => Reading::Fault,
        }
    }

    pub fn release(&mut self) -> Result<(), LineError> {
        self.line.deactivate().map(|_| ())
    }
}
