use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn preflight_passes_in_a_fresh_writable_repo_root_during_session_hours() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("dc_core").unwrap();
    cmd.args([
        "--repo-root",
        dir.path().to_str().unwrap(),
        "--ignore-market-hours",
        "preflight",
    ]);
    cmd.assert().code(0).stdout(contains("preflight_status=Pass"));
}

#[test]
fn preflight_fails_when_repo_root_is_a_file_not_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").unwrap();

    let mut cmd = Command::cargo_bin("dc_core").unwrap();
    cmd.args([
        "--repo-root",
        blocked.to_str().unwrap(),
        "--ignore-market-hours",
        "preflight",
    ]);
    cmd.assert().code(1).stdout(contains("preflight_status=Fail"));
}

#[test]
fn config_check_prints_resolved_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("dc_core").unwrap();
    cmd.env_remove("STOP_BUFFER_DOLLARS")
        .args(["--repo-root", dir.path().to_str().unwrap(), "--config-check"]);
    cmd.assert().success().stdout(contains("stop_buffer_dollars=0.1"));
}
