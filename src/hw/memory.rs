use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use super::{Direction, GpioBackend};
use crate::runtime::{Clock, SimClock};

/// How an input line's level is produced when it is read
#[derive(Clone, Debug, PartialEq)]
pub enum InputRule {
    /// Constant level
    Level(bool),
    /// High while the linked [`SimClock`] is inside any `[start, end)` window
    Windows(Vec<(Duration, Duration)>),
    /// High whenever the given output line is high
    Mirror(u32),
}

#[derive(Clone, Debug, Default)]
struct LineSlot {
    exported: bool,
    direction: Option<Direction>,
    value: bool,
}

#[derive(Debug, Default)]
struct Bank {
    lines: HashMap<u32, LineSlot>,
    rules: HashMap<u32, Vec<InputRule>>,
    failing_exports: HashSet<u32>,
    failing_unexports: HashSet<u32>,
    failing_reads: HashSet<u32>,
    failing_writes: HashSet<u32>,
    latched: HashSet<u32>,
    writes: Vec<(u32, bool)>,
    no_history: bool,
    clock: Option<SimClock>,
}

impl Bank {
    fn slot(&self, line: u32) -> io::Result<&LineSlot> {
        match self.lines.get(&line) {
            Some(slot) if slot.exported => Ok(slot),
            _ => Err(not_exported(line)),
        }
    }

    fn slot_mut(&mut self, line: u32) -> io::Result<&mut LineSlot> {
        match self.lines.get_mut(&line) {
            Some(slot) if slot.exported => Ok(slot),
            _ => Err(not_exported(line)),
        }
    }

    fn rule_level(&self, rule: &InputRule) -> bool {
        match rule {
            InputRule::Level(level) => *level,
            InputRule::Windows(windows) => self.clock.as_ref().is_some_and(|clock| {
                let now = clock.now();
                windows.iter().any(|(start, end)| now >= *start && now < *end)
            }),
            InputRule::Mirror(source) => self.lines.get(source).is_some_and(|slot| slot.value),
        }
    }
}

fn not_exported(line: u32) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("gpio{line} is not exported"))
}

fn injected(line: u32, op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {op} failure on gpio{line}"))
}

/// In-memory GPIO bank.
///
/// Behaves like the kernel interface for lifecycle misuse (operations on
/// unexported lines fail, outputs cannot be read as inputs) and adds the
/// hooks tests need: failure injection, a write history, scripted inputs and
/// latched presses that survive until read or discarded.
#[derive(Clone, Debug, Default)]
pub struct MemoryGpio {
    bank: Rc<RefCell<Bank>>,
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a simulated clock so [`InputRule::Windows`] can be evaluated.
    pub fn with_clock(self, clock: SimClock) -> Self {
        self.bank.borrow_mut().clock = Some(clock);
        self
    }

    /// Stop recording output writes. For long-lived banks behind a real
    /// front end.
    pub fn without_history(self) -> Self {
        {
            let mut bank = self.bank.borrow_mut();
            bank.no_history = true;
            bank.writes.clear();
        }
        self
    }

    pub fn is_exported(&self, line: u32) -> bool {
        self.bank
            .borrow()
            .lines
            .get(&line)
            .is_some_and(|slot| slot.exported)
    }

    pub fn direction(&self, line: u32) -> Option<Direction> {
        self.bank
            .borrow()
            .lines
            .get(&line)
            .and_then(|slot| slot.direction)
    }

    /// Current raw level of a line (outputs: last write)
    pub fn value(&self, line: u32) -> bool {
        self.bank
            .borrow()
            .lines
            .get(&line)
            .is_some_and(|slot| slot.value)
    }

    /// Levels of `lines` in order
    pub fn snapshot(&self, lines: &[u32]) -> Vec<bool> {
        lines.iter().map(|line| self.value(*line)).collect()
    }

    /// Drive an input line to a constant level, replacing any rules.
    pub fn set_input(&self, line: u32, level: bool) {
        self.set_rules(line, vec![InputRule::Level(level)]);
    }

    /// The input reads high when any rule is high.
    pub fn set_rules(&self, line: u32, rules: Vec<InputRule>) {
        self.bank.borrow_mut().rules.insert(line, rules);
    }

    /// Queue one press on an input line. The next read returns high unless
    /// the input is discarded first.
    pub fn latch(&self, line: u32) {
        self.bank.borrow_mut().latched.insert(line);
    }

    pub fn fail_exports(&self, line: u32) {
        self.bank.borrow_mut().failing_exports.insert(line);
    }

    pub fn fail_unexports(&self, line: u32) {
        self.bank.borrow_mut().failing_unexports.insert(line);
    }

    pub fn fail_reads(&self, line: u32) {
        self.bank.borrow_mut().failing_reads.insert(line);
    }

    pub fn fail_writes(&self, line: u32) {
        self.bank.borrow_mut().failing_writes.insert(line);
    }

    /// Clear every injected failure
    pub fn heal(&self) {
        let mut bank = self.bank.borrow_mut();
        bank.failing_exports.clear();
        bank.failing_unexports.clear();
        bank.failing_reads.clear();
        bank.failing_writes.clear();
    }

    /// Every successful output write, oldest first
    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.bank.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.bank.borrow_mut().writes.clear();
    }

    pub fn exported_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .bank
            .borrow()
            .lines
            .iter()
            .filter(|(_, slot)| slot.exported)
            .map(|(line, _)| *line)
            .collect();
        lines.sort_unstable();
        lines
    }
}

impl GpioBackend for MemoryGpio {
    fn export(&self, line: u32) -> io::Result<()> {
        let mut bank = self.bank.borrow_mut();
        if bank.failing_exports.contains(&line) {
            return Err(injected(line, "export"));
        }
        bank.lines.entry(line).or_default().exported = true;
        Ok(())
    }

    fn unexport(&self, line: u32) -> io::Result<()> {
        let mut bank = self.bank.borrow_mut();
        if bank.failing_unexports.contains(&line) {
            return Err(injected(line, "unexport"));
        }
        if let Some(slot) = bank.lines.get_mut(&line) {
            slot.exported = false;
            slot.direction = None;
        }
        Ok(())
    }

    fn set_direction(&self, line: u32, direction: Direction) -> io::Result<()> {
        let mut bank = self.bank.borrow_mut();
        let slot = bank.slot_mut(line)?;
        slot.direction = Some(direction);
        if direction == Direction::Output {
            slot.value = false;
        }
        Ok(())
    }

    fn read_value(&self, line: u32) -> io::Result<bool> {
        let mut bank = self.bank.borrow_mut();
        if bank.failing_reads.contains(&line) {
            return Err(injected(line, "read"));
        }
        let slot = bank.slot(line)?;
        if slot.direction == Some(Direction::Output) {
            return Ok(slot.value);
        }
        let stored = slot.value;
        if bank.latched.remove(&line) {
            return Ok(true);
        }
        Ok(match bank.rules.get(&line) {
            Some(rules) => rules.iter().any(|rule| bank.rule_level(rule)),
            None => stored,
        })
    }

    fn discard_input(&self, line: u32) -> io::Result<()> {
        self.bank.borrow_mut().latched.remove(&line);
        Ok(())
    }

    fn write_value(&self, line: u32, on: bool) -> io::Result<()> {
        let mut bank = self.bank.borrow_mut();
        if bank.failing_writes.contains(&line) {
            return Err(injected(line, "write"));
        }
        let slot = bank.slot_mut(line)?;
        if slot.direction != Some(Direction::Output) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("gpio{line} is not an output"),
            ));
        }
        slot.value = on;
        if !bank.no_history {
            bank.writes.push((line, on));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexported_lines_reject_io() {
        let gpio = MemoryGpio::new();
        assert!(gpio.set_direction(1, Direction::Output).is_err());
        assert!(gpio.read_value(1).is_err());
        assert!(gpio.write_value(1, true).is_err());
    }

    #[test]
    fn write_history_is_recorded() {
        let gpio = MemoryGpio::new();
        gpio.export(1).unwrap();
        gpio.set_direction(1, Direction::Output).unwrap();
        gpio.write_value(1, true).unwrap();
        gpio.write_value(1, false).unwrap();
        assert_eq!(gpio.writes(), vec![(1, true), (1, false)]);
    }

    #[test]
    fn history_can_be_switched_off() {
        let gpio = MemoryGpio::new().without_history();
        gpio.export(1).unwrap();
        gpio.set_direction(1, Direction::Output).unwrap();
        for _ in 0..100 {
            gpio.write_value(1, true).unwrap();
            gpio.write_value(1, false).unwrap();
        }
        assert!(gpio.writes().is_empty());
        assert!(!gpio.value(1));
    }

    #[test]
    fn latched_press_is_read_once_or_discarded() {
        let gpio = MemoryGpio::new();
        gpio.export(4).unwrap();
        gpio.set_direction(4, Direction::Input).unwrap();

        gpio.latch(4);
        assert!(gpio.read_value(4).unwrap());
        assert!(!gpio.read_value(4).unwrap());

        gpio.latch(4);
        gpio.discard_input(4).unwrap();
        assert!(!gpio.read_value(4).unwrap());
    }

    #[test]
    fn inputs_cannot_be_written() {
        let gpio = MemoryGpio::new();
        gpio.export(2).unwrap();
        gpio.set_direction(2, Direction::Input).unwrap();
        let err = gpio.write_value(2, true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn mirror_rule_follows_output() {
        let gpio = MemoryGpio::new();
        for line in [1, 2] {
            gpio.export(line).unwrap();
        }
        gpio.set_direction(1, Direction::Output).unwrap();
        gpio.set_direction(2, Direction::Input).unwrap();
        gpio.set_rules(2, vec![InputRule::Mirror(1)]);

        assert!(!gpio.read_value(2).unwrap());
        gpio.write_value(1, true).unwrap();
        assert!(gpio.read_value(2).unwrap());
    }

    #[test]
    fn window_rule_follows_sim_clock() {
        let clock = SimClock::new(Duration::from_millis(10));
        let gpio = MemoryGpio::new().with_clock(clock.clone());
        gpio.export(3).unwrap();
        gpio.set_direction(3, Direction::Input).unwrap();
        gpio.set_rules(
            3,
            vec![InputRule::Windows(vec![(
                Duration::from_millis(100),
                Duration::from_millis(200),
            )])],
        );

        assert!(!gpio.read_value(3).unwrap());
        clock.advance(Duration::from_millis(100));
        assert!(gpio.read_value(3).unwrap());
        clock.advance(Duration::from_millis(100));
        assert!(!gpio.read_value(3).unwrap());
    }

    #[test]
    fn injected_failures_can_be_healed() {
        let gpio = MemoryGpio::new();
        gpio.fail_exports(7);
        assert!(gpio.export(7).is_err());
        gpio.heal();
        assert!(gpio.export(7).is_ok());
        assert_eq!(gpio.exported_lines(), vec![7]);
    }
}
