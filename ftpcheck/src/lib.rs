#![crate_name = "ftpcheck"]
#![crate_type = "lib"]

//! # ftpcheck
//!
//! ftpcheck is a conformance harness for FTP servers. It drives an already running server through a
//! real client session, built on [suppaftp](https://github.com/veeso/suppaftp), and checks that:
//!
//! - anonymous login works, including on servers which insist on a literal empty password
//! - files round-trip byte for byte over passive and active data connections
//! - a retrieve resumed with `REST` returns exactly the tail of the file
//! - everything created on the server is removed again
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ftpcheck::HarnessConfig;
//!
//! let config = HarnessConfig::default().port(2121);
//! match ftpcheck::run(&config) {
//!     Ok(report) if report.is_success() => println!("{report}"),
//!     Ok(report) => eprintln!("{report}"),
//!     Err(err) => eprintln!("fatal: {err}"),
//! }
//! ```
//!
//! A run is made of two steps: [`SessionEstablisher`] connects and logs in, retrying as configured
//! in [`LoginPolicy`]; [`TransferValidator`] then runs the scenarios and the teardown over that
//! session, producing a [`RunReport`].

// -- common deps
#[macro_use]
extern crate log;

// -- private
mod payload;
mod reply;
mod report;
mod scenario;
mod session;
#[cfg(test)]
mod test_server;
mod validator;

// -- public
pub mod config;
pub mod types;

pub use config::{HarnessConfig, LoginPolicy, TraceLevel};
pub use payload::Payload;
pub use reply::ReplyClass;
pub use report::{mode_name, RunReport, ScenarioOutcome};
pub use scenario::{TransferScenario, WORK_DIR};
pub use session::{Session, SessionEstablisher, ANONYMOUS_USER};
pub use types::{CheckError, CheckResult, Mismatch};
pub use validator::TransferValidator;

/// Establish a session with the server described by `config` and run the standard suite over it.
///
/// Fatal failures (no login possible, setup refused) are returned as error; scenario and teardown
/// failures are part of the returned [`RunReport`].
pub fn run(config: &HarnessConfig) -> CheckResult<RunReport> {
    let session = SessionEstablisher::new(config).establish()?;
    TransferValidator::default().run(session)
}

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
