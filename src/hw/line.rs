use super::{Direction, GpioBackend, LineError, LineId};
use crate::telemetry::{Event, EventLog};

/// Whether an idempotent lifecycle call changed anything
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Changed,
    Unchanged,
}

/// One binary signal line with an explicit activation lifecycle.
///
/// `set_direction`, `read` and `write` are errors until [`activate`] has
/// succeeded. Dropping an active line turns it off (if it drives an output)
/// and releases it.
///
/// [`activate`]: DigitalLine::activate
#[derive(Debug)]
pub struct DigitalLine<B: GpioBackend> {
    id: LineId,
    backend: B,
    log: EventLog,
    active: bool,
    direction: Option<Direction>,
    state: bool,
}

impl<B: GpioBackend> DigitalLine<B> {
    pub fn new(id: LineId, backend: B, log: EventLog) -> Self {
        Self {
            id,
            backend,
            log,
            active: false,
            direction: None,
            state: false,
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Last state written or read
    pub fn state(&self) -> bool {
        self.state
    }

    pub fn activate(&mut self) -> Result<Transition, LineError> {
        let number = self.number()?;
        if self.active {
            return Ok(Transition::Unchanged);
        }
        self.backend
            .export(number)
            .map_err(|source| self.io_error("export", source))?;
        self.active = true;
        Ok(Transition::Changed)
    }

    /// Release the line. Fails only for an invalid id: an OS refusal to
    /// unexport is recorded as a hardware fault and the line still counts as
    /// released.
    pub fn deactivate(&mut self) -> Result<Transition, LineError> {
        let number = self.number()?;
        if !self.active {
            return Ok(Transition::Unchanged);
        }
        if let Err(source) = self.backend.unexport(number) {
            self.io_error("unexport", source);
        }
        self.active = false;
        self.direction = None;
        Ok(Transition::Changed)
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<(), LineError> {
        let number = self.ready()?;
        self.backend
            .set_direction(number, direction)
            .map_err(|source| self.io_error("set direction", source))?;
        self.direction = Some(direction);
        Ok(())
    }

    pub fn write(&mut self, on: bool) -> Result<(), LineError> {
        let number = self.ready_for(Direction::Output)?;
        self.backend
            .write_value(number, on)
            .map_err(|source| self.io_error("write", source))?;
        self.state = on;
        Ok(())
    }

    pub fn read(&mut self) -> Result<bool, LineError> {
        let number = self.ready_for(Direction::Input)?;
        let on = self
            .backend
            .read_value(number)
            .map_err(|source| self.io_error("read", source))?;
        self.state = on;
        Ok(on)
    }

    /// Forget input queued by the backend before now
    pub fn discard_input(&mut self) -> Result<(), LineError> {
        let number = self.ready_for(Direction::Input)?;
        self.backend
            .discard_input(number)
            .map_err(|source| self.io_error("discard", source))
    }

    fn number(&self) -> Result<u32, LineError> {
        self.id
            .number()
            .ok_or_else(|| self.report(LineError::InvalidId(self.id)))
    }

    fn ready(&self) -> Result<u32, LineError> {
        let number = self.number()?;
        if !self.active {
            return Err(self.report(LineError::NotActive(self.id)));
        }
        Ok(number)
    }

    fn ready_for(&self, expected: Direction) -> Result<u32, LineError> {
        let number = self.ready()?;
        if self.direction != Some(expected) {
            return Err(self.report(LineError::WrongDirection {
                line: self.id,
                expected,
            }));
        }
        Ok(number)
    }

    fn io_error(&self, op: &'static str, source: std::io::Error) -> LineError {
        self.report(LineError::Io {
            line: self.id,
            op,
            source,
        })
    }

    fn report(&self, err: LineError) -> LineError {
        self.log.record(&Event::HardwareFault {
            detail: err.to_string(),
        });
        err
    }
}

impl<B: GpioBackend> Drop for DigitalLine<B> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if self.direction == Some(Direction::Output) && self.state {
            let _ = self.write(false);
        }
        let _ = self.deactivate();
    }
}
