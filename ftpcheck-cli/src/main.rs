//! # ftpcheck
//!
//! Command line runner for the ftpcheck conformance harness.
//! Exits with 0 when every check passed, 1 when some check failed and 2 when the run could not take place.
//!

// -- mods
mod args;

use std::process::ExitCode;

use args::Args;
use env_logger::Builder as LogBuilder;
use ftpcheck::TraceLevel;
use log::LevelFilter;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("ftpcheck {APP_VERSION} - developed by {APP_AUTHORS}");
        return ExitCode::SUCCESS;
    }
    let trace_level = TraceLevel::from_env();
    init_logger(&args, trace_level);
    let config = args.config(trace_level);

    println!("checking FTP server at {}", config.server_addr());
    match ftpcheck::run(&config) {
        Ok(report) if report.is_success() => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            println!("{report}");
            for failure in report.failures() {
                eprintln!("error: {failure}");
            }
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("fatal: {err}");
            ExitCode::from(2)
        }
    }
}

fn init_logger(args: &Args, trace_level: TraceLevel) {
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        })
        // the protocol trace only follows the environment, unless everything is traced
        .filter_module(
            "suppaftp",
            if args.debug {
                LevelFilter::Trace
            } else {
                trace_level.client_filter()
            },
        )
        .init();
}
