use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn rrun() -> Command {
    Command::cargo_bin("rrun").unwrap()
}

#[test]
fn test_help_flag() {
    rrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync changed local files"))
        .stdout(predicate::str::contains("--hostname"))
        .stdout(predicate::str::contains("--sync-changed-files"))
        .stdout(predicate::str::contains("--sftp-config"));
}

#[test]
fn test_version_flag() {
    rrun()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rrun"))
        .stdout(predicate::str::contains("0.8"));
}

#[test]
fn test_missing_command_is_a_usage_error() {
    rrun()
        .args(["-H", "devbox"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("COMMAND"));
}

#[test]
fn test_port_zero_is_rejected() {
    rrun()
        .args(["-p", "0", "--", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_unknown_flag_is_rejected() {
    rrun()
        .args(["--frobnicate", "--", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_settings_file_conflicts_with_connection_flags() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("remote-config.yaml"),
        "host: devbox\nremote_path: ~/work\n",
    )
    .unwrap();

    rrun()
        .current_dir(dir.path())
        .args(["-H", "otherbox", "--", "echo", "hello"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("settings file"))
        .stderr(predicate::str::contains("--hostname"));
}

#[test]
fn test_explicit_settings_file_conflicts_too() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.yaml");
    std::fs::write(&path, "host: devbox\nremote_path: ~/work\n").unwrap();

    rrun()
        .args(["-f"])
        .arg(&path)
        .args(["--port", "2222", "--", "ls"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn test_missing_explicit_settings_file_is_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.yaml");

    rrun()
        .arg("-f")
        .arg(&path)
        .args(["--", "ls"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("invalid settings file"));
}

#[test]
fn test_malformed_settings_file_is_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "host: [unclosed\n").unwrap();

    rrun()
        .arg("-f")
        .arg(&path)
        .args(["--", "ls"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("invalid settings file"));
}

#[test]
fn test_missing_host_reported_with_exit_code() {
    // An empty working directory, no settings file anywhere above it, and
    // no connection flags: only the host cannot be defaulted.
    let dir = TempDir::new().unwrap();

    rrun()
        .current_dir(dir.path())
        .args(["--", "echo", "hello"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("host"))
        .stderr(predicate::str::contains("--help"));
}

#[test]
fn test_missing_fields_are_aggregated() {
    let dir = TempDir::new().unwrap();

    rrun()
        .current_dir(dir.path())
        .env_remove("USER")
        .env_remove("USERNAME")
        .args(["--", "echo", "hello"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("host"))
        .stderr(predicate::str::contains("username"));
}

#[test]
fn test_vacant_settings_file_falls_back_to_flag_validation() {
    // A file that sets nothing behaves as if it were absent, so the run
    // fails on missing fields rather than on a conflict.
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("remote-config.yaml"), "# nothing here\n").unwrap();

    rrun()
        .current_dir(dir.path())
        .args(["--", "echo", "hello"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("host"));
}
