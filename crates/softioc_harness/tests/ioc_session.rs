#![cfg(feature = "test-support")]

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ChildStdout;

use softioc_harness::{
    build_database, DatabaseSpec, HarnessError, IocConfig, RecordSpec, SoftIoc,
    DEFAULT_ACCESS_RULES,
};
use tempfile::{tempdir, TempDir};

fn fake_softioc_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_fake_softioc") {
        return PathBuf::from(path);
    }

    // Fallback to the workspace target directory.
    let mut path = std::env::current_exe().expect("current exe");
    path.pop(); // deps
    path.pop(); // debug or release
    path.push("fake_softioc");
    if cfg!(windows) {
        path.set_extension("exe");
    }
    path
}

/// Scratch dbd directory containing an (empty) `softIoc.dbd`, enough to pass
/// the pre-spawn existence check.
fn scratch_dbd() -> TempDir {
    let dir = tempdir().expect("temp dbd dir");
    fs::write(dir.path().join("softIoc.dbd"), "").expect("dbd file");
    dir
}

fn base_config(dbd: &TempDir) -> IocConfig {
    IocConfig::new()
        .with_binary_path(fake_softioc_path())
        .with_dbd_path(dbd.path())
}

/// Read startup lines from the fake IOC until its ready banner, returning
/// everything seen so far.
fn read_until_ready(stdout: &mut ChildStdout) -> Vec<String> {
    let mut lines = Vec::new();
    for line in BufReader::new(stdout).lines() {
        let line = line.expect("readable stdout");
        let done = line.starts_with("iocRun");
        lines.push(line);
        if done {
            return lines;
        }
    }
    panic!("IOC exited before reporting readiness; output: {lines:#?}");
}

#[test]
fn ioc_is_running_after_spawn_and_dead_after_drop() {
    let dbd = scratch_dbd();
    let mut ioc = SoftIoc::spawn(base_config(&dbd)).expect("IOC should launch");
    assert!(ioc.pid() > 0);
    assert!(ioc.is_running().expect("liveness check"));

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    read_until_ready(&mut stdout);
    assert!(ioc.is_running().expect("liveness check"));

    drop(ioc);

    // Drop kills and reaps the child, so its side of the pipe is closed.
    let mut rest = Vec::new();
    stdout.read_to_end(&mut rest).expect("EOF after teardown");
    assert!(rest.is_empty(), "unexpected output after kill: {rest:?}");
}

#[test]
fn ioc_is_killed_when_callers_scope_panics() {
    let dbd = scratch_dbd();
    let mut stolen_stdout = None;

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut ioc = SoftIoc::spawn(base_config(&dbd)).expect("IOC should launch");
        let mut stdout = ioc.take_stdout().expect("piped stdout");
        read_until_ready(&mut stdout);
        stolen_stdout = Some(stdout);
        panic!("caller scope failure");
    }));
    assert!(result.is_err());

    // The unwind dropped the handle, which must have torn the process down.
    let mut stdout = stolen_stdout.expect("stdout captured before panic");
    let mut rest = Vec::new();
    stdout.read_to_end(&mut rest).expect("EOF after teardown");
    assert!(rest.is_empty(), "unexpected output after kill: {rest:?}");
}

#[test]
fn shutdown_reports_exit_status() {
    let dbd = scratch_dbd();
    let ioc = SoftIoc::spawn(base_config(&dbd)).expect("IOC should launch");
    let status = ioc.shutdown().expect("shutdown should reap");
    // Force-killed, so this is an abnormal exit.
    assert!(!status.success());
}

#[test]
fn missing_dbd_file_fails_before_spawn() {
    let empty_dir = tempdir().expect("temp dir");
    let config = IocConfig::new()
        .with_binary_path(fake_softioc_path())
        .with_dbd_path(empty_dir.path());

    let err = SoftIoc::spawn(config).expect_err("spawn must be refused");
    match err {
        HarnessError::MissingDbdFile(path) => {
            assert_eq!(path, empty_dir.path().join("softIoc.dbd"));
        }
        other => panic!("expected MissingDbdFile, got {other}"),
    }
}

#[test]
fn custom_dbd_name_is_joined_onto_dbd_path() {
    let dir = tempdir().expect("temp dir");
    fs::write(dir.path().join("custom.dbd"), "").expect("dbd file");

    let config = base_config(&dir).with_dbd_name("custom.dbd");
    let mut ioc = SoftIoc::spawn(config).expect("IOC should launch");

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    let lines = read_until_ready(&mut stdout);
    let expected = format!("dbLoadDatabase {}", dir.path().join("custom.dbd").display());
    assert!(lines.contains(&expected), "missing dbd line in {lines:#?}");
}

#[test]
fn unspawnable_binary_surfaces_launch_error() {
    let dbd = scratch_dbd();
    let config = IocConfig::new()
        .with_binary_path("/nonexistent/softIoc-missing")
        .with_dbd_path(dbd.path());

    let err = SoftIoc::spawn(config).expect_err("spawn must fail");
    assert!(matches!(err, HarnessError::IocStart(_)), "got {err}");
}

#[test]
fn env_overrides_are_merged_over_inherited_environment() {
    // Inherited by the child alongside the explicit override below.
    std::env::set_var("EPICS_HARNESS_INHERITED", "from-parent");

    let dbd = scratch_dbd();
    let config = base_config(&dbd).with_env("EPICS_HARNESS_EXTRA", "bar");
    let mut ioc = SoftIoc::spawn(config).expect("IOC should launch");

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    let lines = read_until_ready(&mut stdout);
    assert!(lines.contains(&"env EPICS_HARNESS_EXTRA=bar".to_string()));
    assert!(lines.contains(&"env EPICS_HARNESS_INHERITED=from-parent".to_string()));
}

#[test]
fn default_macros_and_access_rules_are_applied() {
    let dbd = scratch_dbd();
    let mut ioc = SoftIoc::spawn(base_config(&dbd)).expect("IOC should launch");

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    let lines = read_until_ready(&mut stdout);
    assert!(lines.contains(&"macros P=test".to_string()));

    let access_line = lines
        .iter()
        .find(|line| line.starts_with("asSetFilename"))
        .expect("access rules line");
    assert!(access_line.ends_with(&format!("({} bytes)", DEFAULT_ACCESS_RULES.len())));
}

#[test]
fn macros_and_additional_args_are_forwarded_in_order() {
    let dbd = scratch_dbd();
    let config = base_config(&dbd)
        .with_macro("P", "ioc")
        .with_macro("R", 1)
        .with_arg("-x")
        .with_arg("extra");
    let mut ioc = SoftIoc::spawn(config).expect("IOC should launch");

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    let lines = read_until_ready(&mut stdout);
    assert!(lines.contains(&"macros P=ioc,R=1".to_string()));
    assert!(lines.contains(&"arg -x".to_string()));
    assert!(lines.contains(&"arg extra".to_string()));
}

#[test]
fn generated_database_is_loaded_by_the_ioc() {
    let spec = DatabaseSpec::default()
        .with_record(
            RecordSpec::new("$(P):bo", "bo")
                .with_field("ZNAM", "OUT")
                .with_field("ONAM", "IN"),
        )
        .with_record(
            RecordSpec::new("$(P):ao", "ao")
                .with_field("DRVH", 5)
                .with_field("DRVL", 1),
        );

    let dbd = scratch_dbd();
    let config = base_config(&dbd).with_db_text(build_database(&spec));
    let mut ioc = SoftIoc::spawn(config).expect("IOC should launch");

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    let lines = read_until_ready(&mut stdout);
    let db_line = lines
        .iter()
        .find(|line| line.starts_with("dbLoadRecords"))
        .expect("db load line");
    assert!(db_line.ends_with("(2 records)"), "got {db_line}");
}

#[test]
fn stdin_pipe_reaches_the_ioc_shell() {
    use std::io::Write;

    let dbd = scratch_dbd();
    let mut ioc = SoftIoc::spawn(base_config(&dbd)).expect("IOC should launch");

    let mut stdout = ioc.take_stdout().expect("piped stdout");
    read_until_ready(&mut stdout);

    // The fake shell exits cleanly on an `exit` command.
    let mut stdin = ioc.take_stdin().expect("piped stdin");
    writeln!(stdin, "exit").expect("writable stdin");
    drop(stdin);

    let mut rest = Vec::new();
    stdout.read_to_end(&mut rest).expect("EOF after exit");
    drop(ioc);
}
