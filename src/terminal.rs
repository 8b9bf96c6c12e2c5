//! Play in a terminal instead of on a GPIO header.
//!
//! Light lines render as a row of `●`/`○`, the button is Space or Enter and
//! `q`, Esc or Ctrl-C raise the quit signal. Line bookkeeping (export,
//! direction) is delegated to [`MemoryGpio`] so lifecycle misuse fails the
//! same way it does on real hardware.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};

use crate::display::{DisplayError, ScoreDisplay};
use crate::hw::{Direction, GpioBackend, MemoryGpio};
use crate::runtime::QuitSignal;

const LIT: char = '●';
const DARK: char = '○';
const TARGET: char = '◎';

#[derive(Debug)]
struct Panel {
    lights: Vec<u32>,
    button: u32,
    target: Option<usize>,
    score: Option<u32>,
    pending_press: bool,
    quit: QuitSignal,
}

impl Panel {
    fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => self.pending_press = true,
            KeyCode::Char('q') | KeyCode::Esc => self.quit.raise(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.quit.raise()
            }
            _ => {}
        }
    }

    /// Consume the pending press, if any
    fn take_press(&mut self) -> bool {
        std::mem::take(&mut self.pending_press)
    }

    fn discard_press(&mut self) {
        self.pending_press = false;
    }

    fn render(&self, gpio: &MemoryGpio) -> String {
        let mut row: String = self
            .lights
            .iter()
            .enumerate()
            .map(|(index, line)| match (gpio.value(*line), self.target) {
                (true, _) => LIT,
                (false, Some(target)) if target == index => TARGET,
                (false, _) => DARK,
            })
            .flat_map(|c| [c, ' '])
            .collect();
        if let Some(score) = self.score {
            row.push_str(&format!("  [{score}]"));
        }
        row
    }
}

/// GPIO backend drawn on the controlling terminal
#[derive(Clone, Debug)]
pub struct TerminalGpio {
    lines: MemoryGpio,
    panel: Rc<RefCell<Panel>>,
}

impl TerminalGpio {
    pub fn new(lights: Vec<u32>, button: u32, quit: QuitSignal) -> Self {
        Self {
            lines: MemoryGpio::new().without_history(),
            panel: Rc::new(RefCell::new(Panel {
                lights,
                button,
                target: None,
                score: None,
                pending_press: false,
                quit,
            })),
        }
    }

    /// Mark the light the player aims for
    pub fn with_target(self, index: usize) -> Self {
        self.panel.borrow_mut().target = Some(index);
        self
    }

    /// Score panel sharing this terminal row
    pub fn display(&self) -> TerminalDisplay {
        TerminalDisplay {
            gpio: self.clone(),
        }
    }

    fn is_light(&self, line: u32) -> bool {
        self.panel.borrow().lights.contains(&line)
    }

    fn redraw(&self) -> io::Result<()> {
        let row = self.panel.borrow().render(&self.lines);
        let mut out = io::stdout();
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(row))?;
        out.flush()
    }

    /// Drain pending terminal events without blocking.
    fn pump_keys(&self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                self.panel.borrow_mut().on_key(key);
            }
        }
        Ok(())
    }
}

impl GpioBackend for TerminalGpio {
    fn export(&self, line: u32) -> io::Result<()> {
        self.lines.export(line)
    }

    fn unexport(&self, line: u32) -> io::Result<()> {
        self.lines.unexport(line)
    }

    fn set_direction(&self, line: u32, direction: Direction) -> io::Result<()> {
        self.lines.set_direction(line, direction)
    }

    fn read_value(&self, line: u32) -> io::Result<bool> {
        if line != self.panel.borrow().button {
            return self.lines.read_value(line);
        }
        self.lines.read_value(line)?;
        self.pump_keys()?;
        Ok(self.panel.borrow_mut().take_press())
    }

    /// Keys already typed are read off the terminal first so quit requests
    /// still count while presses are dropped.
    fn discard_input(&self, line: u32) -> io::Result<()> {
        if line != self.panel.borrow().button {
            return self.lines.discard_input(line);
        }
        self.pump_keys()?;
        self.panel.borrow_mut().discard_press();
        Ok(())
    }

    fn write_value(&self, line: u32, on: bool) -> io::Result<()> {
        self.lines.write_value(line, on)?;
        if self.is_light(line) {
            self.redraw()?;
        }
        Ok(())
    }
}

/// Numeric display rendered after the light row
#[derive(Clone, Debug)]
pub struct TerminalDisplay {
    gpio: TerminalGpio,
}

impl ScoreDisplay for TerminalDisplay {
    fn show(&mut self, value: u32) -> Result<(), DisplayError> {
        self.gpio.panel.borrow_mut().score = Some(value);
        self.gpio
            .redraw()
            .map_err(|err| DisplayError::Unavailable(err.to_string()))
    }
}

/// Raw mode with a hidden cursor for as long as the guard lives
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), Hide)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, Print("\r\n"));
        let _ = disable_raw_mode();
    }
}
