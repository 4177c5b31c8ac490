//! # Report
//!
//! Outcome of a run

use std::fmt;

use suppaftp::Mode;

use crate::scenario::TransferScenario;
use crate::types::{CheckError, CheckResult};

/// Human readable name of a data connection mode
pub fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Active => "active",
        Mode::ExtendedPassive => "extended passive",
        Mode::Passive => "passive",
    }
}

/// Result of a single scenario
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub scenario: TransferScenario,
    /// Mode the transfers actually ran in
    pub mode: Mode,
    pub result: CheckResult<()>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "PASS {} [{}]", self.scenario, mode_name(self.mode)),
            Err(err) => write!(
                f,
                "FAIL {} [{}]: {err}",
                self.scenario,
                mode_name(self.mode)
            ),
        }
    }
}

/// Scenario outcomes, in execution order, plus whatever went wrong while cleaning up
#[derive(Debug, Default)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioOutcome>,
    pub teardown: Vec<CheckError>,
}

impl RunReport {
    /// Every scenario passed and the server was left clean
    pub fn is_success(&self) -> bool {
        self.scenarios.iter().all(ScenarioOutcome::passed) && self.teardown.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|x| x.passed()).count()
    }

    /// All failures, scenarios first
    pub fn failures(&self) -> impl Iterator<Item = &CheckError> {
        self.scenarios
            .iter()
            .filter_map(|x| x.result.as_ref().err())
            .chain(self.teardown.iter())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in self.scenarios.iter() {
            writeln!(f, "{outcome}")?;
        }
        if self.teardown.is_empty() {
            writeln!(f, "teardown: OK")?;
        } else {
            writeln!(f, "teardown: {} failure(s)", self.teardown.len())?;
            for err in self.teardown.iter() {
                writeln!(f, "  - {err}")?;
            }
        }
        write!(
            f,
            "{}: {}/{} scenarios passed",
            if self.is_success() { "PASSED" } else { "FAILED" },
            self.passed(),
            self.scenarios.len()
        )
    }
}
