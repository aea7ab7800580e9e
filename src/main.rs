//! Command-line front end: `runelf <ELF Executable>`.
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]

mod config;

use config::Config;
use std::{io::Write, process::ExitCode};

/// Argument count or configuration misuse.
const EXIT_USAGE: u8 = 1;
/// The executable could not be loaded; nothing from it ran.
const EXIT_LOAD_FAILED: u8 = 2;
/// The executable ran but its result could not be written to stdout.
const EXIT_REPORT_FAILED: u8 = 3;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        let program = args.first().map_or("runelf", String::as_str);
        eprintln!("Usage: {program} <ELF Executable>");
        return ExitCode::from(EXIT_USAGE);
    }

    match Config::from_env() {
        Ok(config) => config.apply(),
        Err(e) => {
            elfload::error!("{e}");
            return ExitCode::from(EXIT_USAGE);
        }
    }

    // Safety: running the given executable is the purpose of this program;
    // what it does once called is up to it.
    match unsafe { elfload::load_and_run(&args[1]) } {
        Ok(value) => match report(value) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                elfload::error!("cannot write result to stdout: {e}");
                ExitCode::from(EXIT_REPORT_FAILED)
            }
        },
        Err(e) => {
            elfload::error!("Loading {} failed: {e}", args[1]);
            ExitCode::from(EXIT_LOAD_FAILED)
        }
    }
}

fn report(value: i32) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "User _start return value = {value}")?;
    out.flush()
}
