use assert_cmd::cargo::cargo_bin_cmd;

fn fixture(path: &str) -> String {
    format!("{}/tests/fixtures/{path}", env!("CARGO_MANIFEST_DIR"))
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8")
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stderr.clone()).expect("utf8")
}

#[test]
fn help_lists_playback_flags() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = stdout_of(out.get_output());

    for flag in [
        "--delay",
        "--filter",
        "--no-streaming",
        "--interactive",
        "--interactive-flow",
        "--config",
        "--log-file",
    ] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn version_exits_zero() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg("--version");
    let out = cmd.assert().success();
    assert!(stdout_of(out.get_output()).contains("ccreplay"));
}

#[test]
fn missing_log_file_exits_one() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/does-not-exist.jsonl"));
    let out = cmd.assert().failure().code(1);
    let stderr = stderr_of(out.get_output());
    assert!(stderr.starts_with("Error: File not found: "), "{stderr}");
}

#[test]
fn piped_batch_replay_prints_the_whole_conversation() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl"));
    let out = cmd.assert().success();
    let stdout = stdout_of(out.get_output());

    assert!(stdout.contains("Replaying conversation from: "));
    assert!(stdout.contains("Found 4 entries"));
    assert!(stdout.contains("What files are in this directory?"));
    assert!(stdout.contains("⏺ Let me check the directory listing."));
    assert!(stdout.contains("  ⎿  List files in current directory"));
    assert!(stdout.contains("  ⎿  Cargo.toml"));
    assert!(stdout.contains("The directory holds a Cargo manifest and a src folder."));
    assert!(stdout.trim_end().ends_with("✅ Replay completed"));

    let user = stdout.find("What files").expect("user turn");
    let reply = stdout.find("The directory holds").expect("final turn");
    assert!(user < reply);
}

#[test]
fn filter_keeps_one_role() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl"))
        .arg("--filter")
        .arg("user")
        .arg("--no-streaming");
    let out = cmd.assert().success();
    let stdout = stdout_of(out.get_output());

    assert!(stdout.contains("Showing only user messages"));
    assert!(stdout.contains("What files are in this directory?"));
    assert!(!stdout.contains("Assistant:"));
}

#[test]
fn invalid_filter_value_is_rejected() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl"))
        .arg("--filter")
        .arg("system");
    cmd.assert().failure().code(1);
}

#[test]
fn seek_and_flow_flags_conflict() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl")).arg("-i").arg("-I");
    let out = cmd.assert().failure().code(1);
    assert!(stderr_of(out.get_output()).contains("cannot be used with"));
}

#[test]
fn malformed_lines_warn_and_replay_continues() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/malformed.jsonl"));
    let out = cmd.assert().success();
    let output = out.get_output();

    assert!(stderr_of(output).contains("warning: skipping malformed line 2"));
    let stdout = stdout_of(output);
    assert!(stdout.contains("Found 2 entries"));
    assert!(stdout.contains("Hi! How can I help?"));
}

#[test]
fn interactive_without_a_terminal_falls_back_to_batch() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl")).arg("--interactive-flow");
    let out = cmd.assert().success();
    let output = out.get_output();

    assert!(stderr_of(output).contains("needs a terminal"));
    assert!(stdout_of(output).contains("✅ Replay completed"));
}

#[test]
fn run_log_records_load_and_session_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("run.jsonl");
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl"))
        .arg("--config")
        .arg(fixture("logs/replay.toml"))
        .arg("--log-file")
        .arg(&log_path);
    cmd.assert().success();

    let events = std::fs::read_to_string(&log_path).expect("read run log");
    let kinds = events
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("json line");
            value["event_type"].as_str().unwrap_or_default().to_string()
        })
        .collect::<Vec<_>>();
    assert!(kinds.iter().any(|kind| kind == "load.complete"));
    assert!(kinds.iter().any(|kind| kind == "session.start"));
    assert!(kinds.iter().any(|kind| kind == "session.end"));
}

#[test]
fn unreadable_config_exits_one() {
    let mut cmd = cargo_bin_cmd!("ccreplay");
    cmd.arg(fixture("logs/session.jsonl"))
        .arg("--config")
        .arg(fixture("logs/missing.toml"));
    cmd.assert().failure().code(1);
}
