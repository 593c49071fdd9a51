use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cdo_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cdo").expect("binary");
    cmd.arg("--dir").arg(dir.path());
    cmd
}

#[test]
fn cdo_help_works() {
    Command::cargo_bin("cdo")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("task tracker"));
}

#[test]
fn one_shot_command_persists_state() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    cdo_cmd(&dir)
        .args(["-c", "add buy milk"])
        .assert()
        .success()
        .stdout(contains("Task \"buy milk\" successfully added"));

    let store = fs::read_to_string(dir.path().join("taskList.txt"))?;
    assert!(store.contains("buy milk"));

    cdo_cmd(&dir)
        .args(["-c", "search buy milk"])
        .assert()
        .success()
        .stdout(contains("1 tasks found"));

    Ok(())
}

#[test]
fn json_flag_wraps_the_response() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    cdo_cmd(&dir)
        .args(["--json", "-c", "getdir"])
        .assert()
        .success()
        .stdout(contains("\"schema_version\":\"cdo.v1\""))
        .stdout(contains("\"command\":\"getdir\""))
        .stdout(contains("\"response\":\"Working directory:"));

    Ok(())
}

#[test]
fn missing_store_directory_is_a_user_error() {
    Command::cargo_bin("cdo")
        .expect("binary")
        .args(["--dir", "/nonexistent/cdo-store", "-c", "list"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn repl_reads_stdin_until_exit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    cdo_cmd(&dir)
        .write_stdin("add chore\nexit\nadd never reached\n")
        .assert()
        .success()
        .stdout(contains("Task \"chore\" successfully added"))
        .stdout(contains("exiting"));

    let store = fs::read_to_string(dir.path().join("taskList.txt"))?;
    assert!(store.contains("chore"));
    assert!(!store.contains("never reached"));

    Ok(())
}
