use std::time::Duration;

use argh::FromArgs;
use ftpcheck::config::DEFAULT_PORT;
use ftpcheck::{HarnessConfig, TraceLevel};

#[derive(FromArgs)]
#[argh(
    description = "check an FTP server listening on 127.0.0.1: anonymous login, passive and active transfers, REST.
Set FTPCHECK_DEBUG=1 to trace control channel commands, FTPCHECK_DEBUG=2 for raw traffic"
)]
pub struct Args {
    #[argh(
        option,
        short = 'a',
        default = "3",
        description = "login attempts before giving up"
    )]
    pub attempts: u32,
    #[argh(
        option,
        short = 'd',
        default = "1000",
        description = "delay between login attempts, in milliseconds"
    )]
    pub delay_ms: u64,
    #[argh(
        option,
        short = 't',
        default = "5",
        description = "connect timeout, in seconds"
    )]
    pub timeout_secs: u64,
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
    #[argh(positional, description = "port the server listens on (default: 2121)")]
    pub port: Option<u16>,
}

impl Args {
    /// Harness configuration described by the arguments
    pub fn config(&self, trace_level: TraceLevel) -> HarnessConfig {
        HarnessConfig::default()
            .port(self.port.unwrap_or(DEFAULT_PORT))
            .max_attempts(self.attempts)
            .retry_delay(Duration::from_millis(self.delay_ms))
            .connect_timeout(Duration::from_secs(self.timeout_secs))
            .trace_level(trace_level)
    }
}
