use thiserror::Error;

use super::{DigitalLine, Direction, GpioBackend, LineError, LineId};
use crate::telemetry::EventLog;

#[derive(Debug, Error)]
pub enum StripError {
    #[error("expected {expected} light states, got {got}")]
    Length { expected: usize, got: usize },
    #[error("light {index} failed: {source}")]
    Line {
        index: usize,
        #[source]
        source: LineError,
    },
}

/// N output lines driven as one unit.
///
/// The game engine is the only source of truth for what should be lit; the
/// strip never reports its own state back.
#[derive(Debug)]
pub struct LightStrip<B: GpioBackend> {
    lines: Vec<DigitalLine<B>>,
}

impl<B: GpioBackend> LightStrip<B> {
    /// Activate every line as an output, switched off. Lines activated before
    /// a failure are released again when the partial strip is dropped.
    pub fn open(ids: &[LineId], backend: &B, log: &EventLog) -> Result<Self, StripError> {
        let mut lines = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let mut line = DigitalLine::new(*id, backend.clone(), log.clone());
            let setup = line
                .activate()
                .and_then(|_| line.set_direction(Direction::Output))
                .and_then(|_| line.write(false));
            lines.push(line);
            setup.map_err(|source| StripError::Line { index, source })?;
        }
        Ok(Self { lines })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn ids(&self) -> Vec<LineId> {
        self.lines.iter().map(DigitalLine::id).collect()
    }

    /// Write every state in order. Stops at the first failing line: earlier
    /// lines keep their new state, later ones are untouched.
    pub fn apply(&mut self, states: &[bool]) -> Result<(), StripError> {
        if states.len() != self.lines.len() {
            return Err(StripError::Length {
                expected: self.lines.len(),
                got: states.len(),
            });
        }
        for (index, (line, on)) in self.lines.iter_mut().zip(states).enumerate() {
            line.write(*on)
                .map_err(|source| StripError::Line { index, source })?;
        }
        Ok(())
    }

    /// Light exactly one position
    pub fn show_only(&mut self, position: usize) -> Result<(), StripError> {
        let states: Vec<bool> = (0..self.lines.len()).map(|i| i == position).collect();
        self.apply(&states)
    }

    pub fn fill(&mut self, on: bool) -> Result<(), StripError> {
        let states = vec![on; self.lines.len()];
        self.apply(&states)
    }

    /// Best-effort shutdown sweep: every output off, then every line released.
    /// Keeps going past failures and returns the first one.
    pub fn release(&mut self) -> Result<(), StripError> {
        let mut first = None;
        for (index, line) in self.lines.iter_mut().enumerate() {
            let result = if line.is_active() && line.direction() == Some(Direction::Output) {
                line.write(false)
            } else {
                Ok(())
            };
            if let Err(source) = result {
                first.get_or_insert(StripError::Line { index, source });
            }
        }
        for (index, line) in self.lines.iter_mut().enumerate() {
            if let Err(source) = line.deactivate() {
                first.get_or_insert(StripError::Line { index, source });
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::MemoryGpio;
    use assert_matches::assert_matches;

    const PINS: [u32; 9] = [10, 11, 12, 13, 14, 15, 16, 17, 18];

    fn ids() -> Vec<LineId> {
        PINS.iter().map(|p| LineId::new(*p as i32)).collect()
    }

    fn open(gpio: &MemoryGpio) -> LightStrip<MemoryGpio> {
        LightStrip::open(&ids(), gpio, &EventLog::disabled()).unwrap()
    }

    #[test]
    fn open_configures_outputs_switched_off() {
        let gpio = MemoryGpio::new();
        let strip = open(&gpio);
        assert_eq!(strip.len(), 9);
        for pin in PINS {
            assert!(gpio.is_exported(pin));
            assert_eq!(gpio.direction(pin), Some(Direction::Output));
            assert!(!gpio.value(pin));
        }
    }

    #[test]
    fn show_only_lights_one_position() {
        let gpio = MemoryGpio::new();
        let mut strip = open(&gpio);
        strip.show_only(4).unwrap();
        let lit: Vec<_> = gpio.snapshot(&PINS);
        assert_eq!(lit.iter().filter(|on| **on).count(), 1);
        assert!(lit[4]);
    }

    #[test]
    fn wrong_length_is_rejected_without_writes() {
        let gpio = MemoryGpio::new();
        let mut strip = open(&gpio);
        gpio.clear_writes();
        assert_matches!(
            strip.apply(&[true; 3]),
            Err(StripError::Length {
                expected: 9,
                got: 3
            })
        );
        assert!(gpio.writes().is_empty());
    }

    #[test]
    fn failure_mid_strip_leaves_partial_update() {
        let gpio = MemoryGpio::new();
        let mut strip = open(&gpio);
        strip.fill(true).unwrap();
        gpio.fail_writes(PINS[3]);

        let err = strip.apply(&[false; 9]).unwrap_err();
        assert_matches!(err, StripError::Line { index: 3, .. });

        let levels = gpio.snapshot(&PINS);
        assert_eq!(&levels[..3], &[false, false, false]);
        assert!(levels[3..].iter().all(|on| *on));
    }

    #[test]
    fn open_failure_releases_earlier_lines() {
        let gpio = MemoryGpio::new();
        gpio.fail_exports(PINS[2]);
        let err = LightStrip::open(&ids(), &gpio, &EventLog::disabled()).unwrap_err();
        assert_matches!(err, StripError::Line { index: 2, .. });
        assert!(gpio.exported_lines().is_empty());
    }

    #[test]
    fn release_turns_off_then_unexports() {
        let gpio = MemoryGpio::new();
        let mut strip = open(&gpio);
        strip.fill(true).unwrap();
        strip.release().unwrap();
        assert!(gpio.snapshot(&PINS).iter().all(|on| !on));
        assert!(gpio.exported_lines().is_empty());
    }

    #[test]
    fn release_continues_past_failures() {
        let gpio = MemoryGpio::new();
        let mut strip = open(&gpio);
        strip.fill(true).unwrap();
        gpio.fail_writes(PINS[0]);
        assert_matches!(strip.release(), Err(StripError::Line { index: 0, .. }));
        assert!(!gpio.value(PINS[8]));
        assert!(gpio.exported_lines().is_empty());
    }

    #[test]
    fn drop_releases_lines() {
        let gpio = MemoryGpio::new();
        {
            let mut strip = open(&gpio);
            strip.show_only(0).unwrap();
        }
        assert!(gpio.exported_lines().is_empty());
        assert!(!gpio.value(PINS[0]));
    }
}
