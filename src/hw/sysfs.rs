//! Linux sysfs GPIO (`/sys/class/gpio`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{Direction, GpioBackend};

pub const DEFAULT_ROOT: &str = "/sys/class/gpio";

#[derive(Clone, Debug)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }

    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn line_dir(&self, line: u32) -> PathBuf {
        self.root.join(format!("gpio{line}"))
    }

    fn attribute(&self, line: u32, name: &str) -> PathBuf {
        self.line_dir(line).join(name)
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBackend for SysfsGpio {
    /// A line whose directory already exists counts as exported, which also
    /// picks up lines left behind by a process that was killed.
    fn export(&self, line: u32) -> io::Result<()> {
        if self.line_dir(line).is_dir() {
            return Ok(());
        }
        fs::write(self.root.join("export"), line.to_string())?;
        if !self.line_dir(line).is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("export did not create gpio{line}"),
            ));
        }
        Ok(())
    }

    fn unexport(&self, line: u32) -> io::Result<()> {
        if !self.line_dir(line).exists() {
            return Ok(());
        }
        fs::write(self.root.join("unexport"), line.to_string())
    }

    fn set_direction(&self, line: u32, direction: Direction) -> io::Result<()> {
        fs::write(self.attribute(line, "direction"), direction.to_string())
    }

    fn read_value(&self, line: u32) -> io::Result<bool> {
        let raw = fs::read_to_string(self.attribute(line, "value"))?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected value {other:?} on gpio{line}"),
            )),
        }
    }

    fn write_value(&self, line: u32, on: bool) -> io::Result<()> {
        fs::write(self.attribute(line, "value"), if on { "1" } else { "0" })
    }
}
