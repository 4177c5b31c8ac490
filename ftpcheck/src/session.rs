//! # Session
//!
//! This module contains the authenticated control connection and the establisher which produces it

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use suppaftp::types::Response;
use suppaftp::{FtpResult, FtpStream, Mode, Status};

use crate::config::{HarnessConfig, LoginPolicy, TraceLevel};
use crate::reply::{reply_of, ReplyClass};
use crate::types::{CheckError, CheckResult};

/// Identity used for the anonymous login
pub const ANONYMOUS_USER: &str = "anonymous";

/// The single live control connection of a run.
///
/// Scenario functions receive it by mutable reference; navigation and mode changes go through it,
/// so the state they leave behind is visible to the next scenario.
pub struct Session {
    stream: FtpStream,
    mode: Mode,
    wrkdir: Vec<String>,
    trace_level: TraceLevel,
}

impl Session {
    fn new(stream: FtpStream, trace_level: TraceLevel) -> Self {
        Self {
            stream,
            mode: Mode::Passive,
            wrkdir: Vec::new(),
            trace_level,
        }
    }

    /// Current data connection mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Set the data connection mode used by the next transfers
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!("switching data connection mode from {:?} to {:?}", self.mode, mode);
        }
        self.stream.set_mode(mode);
        self.mode = mode;
    }

    /// Directories entered since login, joined with `/`; empty at the login directory
    pub fn wrkdir(&self) -> String {
        self.wrkdir.join("/")
    }

    pub fn trace_level(&self) -> TraceLevel {
        self.trace_level
    }

    /// Change into `dir`, relative to the current directory
    pub fn enter(&mut self, dir: &str) -> FtpResult<()> {
        self.stream.cwd(dir)?;
        self.wrkdir.push(dir.to_string());
        Ok(())
    }

    /// Go back to the parent directory
    pub fn leave(&mut self) -> FtpResult<()> {
        self.stream.cdup()?;
        self.wrkdir.pop();
        Ok(())
    }

    /// Access the underlying client for transfer and file commands
    pub fn stream(&mut self) -> &mut FtpStream {
        &mut self.stream
    }

    /// Log out and close the control connection
    pub fn quit(mut self) -> FtpResult<()> {
        debug!("logging out");
        self.stream.quit()
    }
}

/// Opens the control connection and performs the anonymous login, retrying on failure
#[derive(Debug, Clone)]
pub struct SessionEstablisher {
    addr: SocketAddr,
    policy: LoginPolicy,
    connect_timeout: Duration,
    active_timeout: Duration,
    trace_level: TraceLevel,
}

impl SessionEstablisher {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            addr: config.server_addr(),
            policy: config.login,
            connect_timeout: config.connect_timeout,
            active_timeout: config.active_timeout,
            trace_level: config.trace_level,
        }
    }

    /// Connect and log in, making at most [`LoginPolicy::attempts`] attempts.
    ///
    /// Returns [`CheckError::Authentication`] carrying the last failure once every attempt failed.
    pub fn establish(&self) -> CheckResult<Session> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            debug!("connecting to {} (attempt {attempt}/{attempts})", self.addr);
            match self.attempt() {
                Ok(stream) => {
                    info!(
                        "logged in to {} as {ANONYMOUS_USER} (attempt {attempt}/{attempts}, trace level {})",
                        self.addr, self.trace_level
                    );
                    return Ok(Session::new(stream, self.trace_level));
                }
                Err(err) if attempt < attempts => {
                    warn!("login attempt {attempt}/{attempts} failed: {err}");
                    thread::sleep(self.policy.retry_delay);
                    attempt += 1;
                }
                Err(err) => {
                    error!("login attempt {attempt}/{attempts} failed: {err}");
                    return Err(CheckError::Authentication {
                        attempts,
                        source: Box::new(err),
                    });
                }
            }
        }
    }

    /// A single connect+login; the connection is released if login fails
    fn attempt(&self) -> CheckResult<FtpStream> {
        let mut stream = FtpStream::connect_timeout(self.addr, self.connect_timeout)
            .map_err(CheckError::Connection)?
            .active_mode(self.active_timeout);
        stream.set_mode(Mode::Passive);
        match Self::login(&mut stream) {
            Ok(()) => Ok(stream),
            Err(err) => {
                self.release(stream);
                Err(err)
            }
        }
    }

    /// Anonymous login through raw USER/PASS commands.
    ///
    /// The client library's `login` is not used: the password must reach the server exactly as
    /// given, an empty string included.
    fn login(stream: &mut FtpStream) -> CheckResult<()> {
        let reply = Self::command(
            stream,
            format!("USER {ANONYMOUS_USER}"),
            &[Status::LoggedIn, Status::NeedPassword],
        )?;
        match ReplyClass::of(&reply) {
            ReplyClass::Completion => {
                debug!("server accepted {ANONYMOUS_USER} without password");
                Ok(())
            }
            ReplyClass::Intermediate => {
                debug!("password is required; sending empty password");
                let reply = Self::command(stream, "PASS ".to_string(), &[Status::LoggedIn])?;
                match ReplyClass::of(&reply) {
                    ReplyClass::Completion => Ok(()),
                    _ => Err(CheckError::Permission(reply)),
                }
            }
            _ => Err(CheckError::Permission(reply)),
        }
    }

    fn command(
        stream: &mut FtpStream,
        command: String,
        expected: &[Status],
    ) -> CheckResult<Response> {
        reply_of(stream.custom_command(command, expected)).map_err(CheckError::Connection)
    }

    /// Close a connection which failed to log in. Errors are dropped: the login failure is what gets reported
    fn release(&self, mut stream: FtpStream) {
        if let Err(err) = stream.get_ref().set_read_timeout(Some(self.connect_timeout)) {
            debug!("could not bound release of control connection: {err}");
        }
        if let Err(err) = stream.quit() {
            debug!("ignoring error while releasing control connection: {err}");
        }
    }
}
