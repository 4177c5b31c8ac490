//! # Validator
//!
//! Runs the data transfer scenarios over an authenticated session and cleans up after them

use std::io::Cursor;

use suppaftp::types::FileType;
use suppaftp::FtpError;

use crate::payload::Payload;
use crate::report::{mode_name, RunReport, ScenarioOutcome};
use crate::scenario::{TransferScenario, WORK_DIR};
use crate::session::Session;
use crate::types::{CheckError, CheckResult};

/// A file the run stored on the server; `complete` once an upload of it succeeded
#[derive(Debug)]
struct RemoteFile {
    name: &'static str,
    complete: bool,
}

/// Executes a sequence of [`TransferScenario`] inside a fresh working directory.
///
/// Scenarios run in order on the same session: a scenario without an explicit mode inherits the
/// one left by its predecessor.
#[derive(Debug, Clone)]
pub struct TransferValidator {
    scenarios: Vec<TransferScenario>,
}

impl Default for TransferValidator {
    fn default() -> Self {
        Self::new(TransferScenario::standard_suite())
    }
}

impl TransferValidator {
    pub fn new(scenarios: Vec<TransferScenario>) -> Self {
        Self { scenarios }
    }

    /// Run setup, every scenario and teardown, consuming the session.
    ///
    /// Only an invalid scenario or a setup failure is returned as error; everything after setup
    /// ends up in the [`RunReport`], and teardown runs whatever the scenarios did.
    pub fn run(&self, mut session: Session) -> CheckResult<RunReport> {
        let prepared = self
            .scenarios
            .iter()
            .try_for_each(TransferScenario::validate)
            .and_then(|()| Self::setup(&mut session));
        let origin = match prepared {
            Ok(origin) => origin,
            Err(err) => {
                error!("{err}");
                if let Err(err) = session.quit() {
                    debug!("ignoring error while logging out after failed setup: {err}");
                }
                return Err(err);
            }
        };

        let mut stored = Vec::new();
        let scenarios: Vec<ScenarioOutcome> = self
            .scenarios
            .iter()
            .map(|scenario| Self::run_scenario(&mut session, scenario, &mut stored))
            .collect();
        let teardown = Self::teardown(session, &stored, origin.as_deref());

        Ok(RunReport {
            scenarios,
            teardown,
        })
    }

    /// Create the working directory and enter it.
    /// Returns the directory the session started from, if the server tells
    fn setup(session: &mut Session) -> CheckResult<Option<String>> {
        let origin = match session.stream().pwd() {
            Ok(wrkdir) => Some(wrkdir),
            Err(err) => {
                warn!("could not read working directory; restore check disabled: {err}");
                None
            }
        };
        debug!("creating working directory {WORK_DIR}");
        session
            .stream()
            .mkdir(WORK_DIR)
            .map_err(|source| CheckError::Setup {
                step: "create working directory",
                source,
            })?;
        if let Err(source) = session.enter(WORK_DIR) {
            // don't leave the directory behind, or the next run fails creating it
            if let Err(err) = session.stream().rmdir(WORK_DIR) {
                debug!("could not remove {WORK_DIR} after failed setup: {err}");
            }
            return Err(CheckError::Setup {
                step: "enter working directory",
                source,
            });
        }
        Ok(origin)
    }

    fn run_scenario(
        session: &mut Session,
        scenario: &TransferScenario,
        stored: &mut Vec<RemoteFile>,
    ) -> ScenarioOutcome {
        if let Some(mode) = scenario.mode {
            session.set_mode(mode);
        }
        let mode = session.mode();
        info!("running {scenario} in {} mode", mode_name(mode));
        let result = Self::round_trip(session, scenario, stored);
        match result {
            Ok(()) => info!("{}: OK", scenario.name),
            Err(ref err) => error!("{err}"),
        }
        ScenarioOutcome {
            scenario: scenario.clone(),
            mode,
            result,
        }
    }

    /// Store a random payload, retrieve it back (from the resume offset, if any) and compare
    fn round_trip(
        session: &mut Session,
        scenario: &TransferScenario,
        stored: &mut Vec<RemoteFile>,
    ) -> CheckResult<()> {
        let payload = Payload::random(scenario.size);
        session
            .stream()
            .transfer_type(FileType::Binary)
            .map_err(transfer_error(scenario, "TYPE I"))?;
        // a failed upload may still leave a partial file behind
        let index = match stored.iter().position(|x| x.name == scenario.remote_file) {
            Some(index) => index,
            None => {
                stored.push(RemoteFile {
                    name: scenario.remote_file,
                    complete: false,
                });
                stored.len() - 1
            }
        };
        let written = session
            .stream()
            .put_file(scenario.remote_file, &mut Cursor::new(payload.as_bytes()))
            .map_err(transfer_error(scenario, "STOR"))?;
        stored[index].complete = true;
        debug!("stored {written} bytes as {}", scenario.remote_file);
        if let Some(offset) = scenario.resume_offset {
            session
                .stream()
                .resume_transfer(offset)
                .map_err(transfer_error(scenario, "REST"))?;
        }
        let received = session
            .stream()
            .retr_as_buffer(scenario.remote_file)
            .map_err(transfer_error(scenario, "RETR"))?
            .into_inner();
        debug!("retrieved {} bytes from {}", received.len(), scenario.remote_file);
        payload
            .verify(scenario.offset(), &received)
            .map_err(|mismatch| CheckError::Mismatch {
                scenario: scenario.name.to_string(),
                mismatch,
            })
    }

    /// Best effort cleanup: every step runs, failures are collected
    fn teardown(
        mut session: Session,
        stored: &[RemoteFile],
        origin: Option<&str>,
    ) -> Vec<CheckError> {
        debug!("tearing down {} file(s)", stored.len());
        let mut failures = Vec::new();
        for file in stored.iter() {
            match session.stream().rm(file.name) {
                Ok(()) => {}
                Err(source) if file.complete => {
                    failures.push(teardown_error(format!("DELE {}", file.name), source));
                }
                // the upload failed, so there may be nothing to delete
                Err(err) => debug!("ignoring failed DELE of incomplete {}: {err}", file.name),
            }
        }
        if let Err(source) = session.leave() {
            failures.push(teardown_error("CDUP".to_string(), source));
        }
        if let Err(source) = session.stream().rmdir(WORK_DIR) {
            failures.push(teardown_error(format!("RMD {WORK_DIR}"), source));
        }
        let listing = session.stream().nlst(None);
        if session.trace_level().level() >= 2 {
            trace!("listing after teardown: {listing:?}");
        }
        match listing {
            Ok(entries) if entries.iter().any(|x| is_entry(x, WORK_DIR)) => {
                failures.push(CheckError::Leftover(WORK_DIR.to_string()));
            }
            Ok(_) => {}
            Err(err) => warn!("could not list working directory; leftover check skipped: {err}"),
        }
        if let Some(expected) = origin {
            match session.stream().pwd() {
                Ok(actual) if actual != expected => {
                    failures.push(CheckError::WorkingDirectory {
                        expected: expected.to_string(),
                        actual,
                    });
                }
                Ok(_) => {}
                Err(source) => failures.push(teardown_error("PWD".to_string(), source)),
            }
        }
        if let Err(source) = session.quit() {
            failures.push(teardown_error("QUIT".to_string(), source));
        }
        for err in failures.iter() {
            error!("{err}");
        }
        failures
    }
}

fn transfer_error<'a>(
    scenario: &'a TransferScenario,
    step: &'static str,
) -> impl FnOnce(FtpError) -> CheckError + 'a {
    move |source| CheckError::Transfer {
        scenario: scenario.name.to_string(),
        step,
        source,
    }
}

fn teardown_error(step: String, source: FtpError) -> CheckError {
    CheckError::Teardown { step, source }
}

/// Whether a NLST entry names `name`; some servers list entries with a path prefix
fn is_entry(entry: &str, name: &str) -> bool {
    entry.trim_end_matches('/').rsplit('/').next() == Some(name)
}
