//! # Config
//!
//! Run configuration for the harness

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::LevelFilter;

/// Environment variable selecting the protocol trace level
pub const TRACE_ENV_VAR: &str = "FTPCHECK_DEBUG";
/// Port used when none is given
pub const DEFAULT_PORT: u16 = 2121;

/// Verbosity of the control channel trace.
///
/// - `0`: silent
/// - `1`: every command issued by the client library
/// - `2` and above: raw control channel traffic
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraceLevel(u8);

impl TraceLevel {
    pub const SILENT: Self = Self(0);

    pub fn new(level: u8) -> Self {
        Self(level)
    }

    /// Read trace level from [`TRACE_ENV_VAR`]
    pub fn from_env() -> Self {
        Self::parse(std::env::var(TRACE_ENV_VAR).ok().as_deref())
    }

    /// Parse a raw value; anything which is not a number is silent
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(|x| x.trim().parse::<u8>().ok())
            .map(Self)
            .unwrap_or_default()
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Log filter to apply to the FTP client library
    pub fn client_filter(&self) -> LevelFilter {
        match self.0 {
            0 => LevelFilter::Off,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the session establisher retries the connect+login sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    /// Maximum amount of attempts; zero is treated as one
    pub max_attempts: u32,
    /// Delay between two attempts
    pub retry_delay: Duration,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl LoginPolicy {
    /// Attempts which will actually be performed
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub host: IpAddr,
    pub port: u16,
    pub login: LoginPolicy,
    /// Bound on the initial TCP connect of each attempt
    pub connect_timeout: Duration,
    /// How long to wait for the server to connect back in active mode
    pub active_timeout: Duration,
    pub trace_level: TraceLevel,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            login: LoginPolicy::default(),
            connect_timeout: Duration::from_secs(5),
            active_timeout: Duration::from_secs(60),
            trace_level: TraceLevel::SILENT,
        }
    }
}

impl HarnessConfig {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.login.max_attempts = max_attempts;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.login.retry_delay = retry_delay;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn active_timeout(mut self, timeout: Duration) -> Self {
        self.active_timeout = timeout;
        self
    }

    pub fn trace_level(mut self, trace_level: TraceLevel) -> Self {
        self.trace_level = trace_level;
        self
    }

    /// Address of the server under test
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
