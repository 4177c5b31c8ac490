//! # Scenario
//!
//! Description of the data transfer test cases

use std::fmt;

use suppaftp::Mode;

use crate::types::{CheckError, CheckResult};

/// Directory created on the server to hold the scenario files
pub const WORK_DIR: &str = "py";

/// One data transfer test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferScenario {
    pub name: &'static str,
    pub remote_file: &'static str,
    pub size: usize,
    /// Data connection mode to switch to; `None` keeps the current one
    pub mode: Option<Mode>,
    /// Offset to resume the retrieve from
    pub resume_offset: Option<usize>,
}

impl TransferScenario {
    pub fn new(name: &'static str, remote_file: &'static str, size: usize) -> Self {
        Self {
            name,
            remote_file,
            size,
            mode: None,
            resume_offset: None,
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn resume_at(mut self, offset: usize) -> Self {
        self.resume_offset = Some(offset);
        self
    }

    /// Passive, active and resumed round-trips, in this order.
    ///
    /// The resumed retrieve does not choose a mode, so it runs in active mode right after the
    /// active round-trip.
    pub fn standard_suite() -> Vec<Self> {
        vec![
            Self::new("passive round-trip", "a.bin", 4096).mode(Mode::Passive),
            Self::new("active round-trip", "b.bin", 2048).mode(Mode::Active),
            Self::new("resume round-trip", "c.bin", 8192).resume_at(4096),
        ]
    }

    /// Offset the retrieve starts from
    pub fn offset(&self) -> usize {
        self.resume_offset.unwrap_or(0)
    }

    /// A resume offset must point inside the file
    pub fn validate(&self) -> CheckResult<()> {
        match self.resume_offset {
            Some(offset) if offset >= self.size => Err(CheckError::InvalidScenario(format!(
                "{}: resume offset {} is outside of a {} bytes file",
                self.name, offset, self.size
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TransferScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {} bytes", self.name, self.remote_file, self.size)?;
        if let Some(offset) = self.resume_offset {
            write!(f, ", from byte {offset}")?;
        }
        write!(f, ")")
    }
}
