//! # Types
//!
//! Error types shared by the whole harness

use std::fmt;

use suppaftp::types::Response;
use suppaftp::FtpError;
use thiserror::Error;

/// A shorthand for a Result whose error type is always a [`CheckError`].
pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// `CheckError` describes everything that can go wrong while checking a server.
///
/// Some variants are fatal for the run (authentication, setup), others are recorded
/// in the [`crate::RunReport`] and the run carries on.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The control connection could not be established or broke
    #[error("Connection error: {0}")]
    Connection(FtpError),
    /// The server replied with a code outside of the expected class
    #[error("Protocol permission error: {0}")]
    Permission(Response),
    /// Every login attempt failed
    #[error("unable to authenticate after {attempts} attempt(s): {source}")]
    Authentication {
        attempts: u32,
        #[source]
        source: Box<CheckError>,
    },
    /// Preparing the working area failed
    #[error("setup failed at {step}: {source}")]
    Setup {
        step: &'static str,
        #[source]
        source: FtpError,
    },
    /// A store or retrieve failed at the protocol level
    #[error("{scenario}: {step} failed: {source}")]
    Transfer {
        scenario: String,
        step: &'static str,
        #[source]
        source: FtpError,
    },
    /// Retrieved bytes differ from the uploaded ones
    #[error("{scenario}: content mismatch: {mismatch}")]
    Mismatch { scenario: String, mismatch: Mismatch },
    /// A cleanup command failed
    #[error("teardown failed at {step}: {source}")]
    Teardown {
        step: String,
        #[source]
        source: FtpError,
    },
    /// A server-side artifact survived teardown
    #[error("artifact '{0}' still present after teardown")]
    Leftover(String),
    /// The working directory was not restored
    #[error("working directory is '{actual}', expected '{expected}'")]
    WorkingDirectory { expected: String, actual: String },
    /// The scenario itself cannot be run
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

/// Describes how a retrieved byte sequence differs from the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Amount of bytes expected
    pub expected_len: usize,
    /// Amount of bytes received
    pub actual_len: usize,
    /// First offset, relative to the start of the compared range, where the sequences differ.
    /// `None` when one sequence is a prefix of the other.
    pub first_difference: Option<usize>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} bytes, received {}",
            self.expected_len, self.actual_len
        )?;
        match self.first_difference {
            Some(offset) => write!(f, "; first difference at byte {offset}"),
            None => Ok(()),
        }
    }
}
