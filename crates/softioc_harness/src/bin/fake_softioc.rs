//! Stand-in for the `softIoc` binary used by integration tests.
//!
//! Implements the CLI contract the harness relies on
//! (`-D <dbd> -m <macros> -a <access-file> -d <db-file>` plus trailing
//! arguments), reports what it received on stdout, then blocks on stdin like
//! an IOC shell until killed or stdin closes.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

struct Invocation {
    dbd_path: Option<String>,
    macros: Option<String>,
    access_file: Option<String>,
    db_file: Option<String>,
    extra_args: Vec<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fake_softioc: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let invocation = parse_args(env::args().skip(1))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(dbd) = &invocation.dbd_path {
        // The real softIoc fails at startup when the dbd is unreadable.
        fs::metadata(dbd).map_err(|err| format!("dbd {dbd}: {err}"))?;
        writeln!(out, "dbLoadDatabase {dbd}")?;
    }
    if let Some(macros) = &invocation.macros {
        writeln!(out, "macros {macros}")?;
    }
    if let Some(access) = &invocation.access_file {
        let text = fs::read_to_string(access).map_err(|err| format!("access {access}: {err}"))?;
        writeln!(out, "asSetFilename {access} ({} bytes)", text.len())?;
    }
    if let Some(db) = &invocation.db_file {
        let text = fs::read_to_string(db).map_err(|err| format!("db {db}: {err}"))?;
        let records = text.matches("record(").count();
        writeln!(out, "dbLoadRecords {db} ({records} records)")?;
    }
    for arg in &invocation.extra_args {
        writeln!(out, "arg {arg}")?;
    }

    // Report EPICS-flavored environment so tests can observe env merging.
    let epics_env: BTreeMap<String, String> = env::vars()
        .filter(|(key, _)| key.starts_with("EPICS_"))
        .collect();
    for (key, value) in &epics_env {
        writeln!(out, "env {key}={value}")?;
    }

    writeln!(out, "iocRun: All initialization complete")?;
    out.flush()?;

    // Behave like the interactive IOC shell: consume stdin until it closes.
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim() == "exit" {
            break;
        }
    }

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Invocation, String> {
    let mut invocation = Invocation {
        dbd_path: None,
        macros: None,
        access_file: None,
        db_file: None,
        extra_args: Vec::new(),
    };

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "-D" => &mut invocation.dbd_path,
            "-m" => &mut invocation.macros,
            "-a" => &mut invocation.access_file,
            "-d" => &mut invocation.db_file,
            _ => {
                invocation.extra_args.push(arg);
                continue;
            }
        };
        *slot = Some(
            args.next()
                .ok_or_else(|| format!("missing value for {arg}"))?,
        );
    }

    Ok(invocation)
}
