use ccreplay::errors::ReplayError;
use ccreplay::hotkeys::Key;
use ccreplay::run_with_runtime;
use ccreplay::runtime::{FakeClock, FakeFileSystem, FakeInput, FakeTerminal, ProductionRuntime};
use std::ffi::OsString;
use std::sync::Arc;

const SESSION: &str = include_str!("fixtures/logs/session.jsonl");

struct Fixture {
    clock: FakeClock,
    terminal: FakeTerminal,
    input: FakeInput,
    runtime: ProductionRuntime,
}

fn fixture(is_tty: bool, script: Vec<Option<Key>>) -> Fixture {
    let clock = FakeClock::default();
    let terminal = FakeTerminal::new(is_tty).with_size(100, 30);
    let input = FakeInput::new(clock.clone(), script);
    let fs = FakeFileSystem::with_file("session.jsonl", SESSION);
    fs.insert(
        "replay.toml",
        include_str!("fixtures/logs/replay.toml"),
    );
    let runtime = ProductionRuntime {
        clock: Arc::new(clock.clone()),
        file_system: Arc::new(fs),
        terminal: Arc::new(terminal.clone()),
        input: Arc::new(input.clone()),
    };
    Fixture {
        clock,
        terminal,
        input,
        runtime,
    }
}

fn args(extra: &[&str]) -> Vec<OsString> {
    std::iter::once("ccreplay")
        .chain(extra.iter().copied())
        .map(OsString::from)
        .collect()
}

#[test]
fn header_lines_precede_playback() {
    let f = fixture(false, Vec::new());
    let code = run_with_runtime(&args(&["session.jsonl"]), &f.runtime).expect("run");
    assert_eq!(code, 0);
    assert_eq!(
        f.terminal.written_lines(),
        vec![
            "Replaying conversation from: session.jsonl\n".to_string(),
            "Found 4 entries\n".to_string(),
        ]
    );
    assert!(f.terminal.plain_output().ends_with("✅ Replay completed\n"));
}

#[test]
fn piped_output_is_never_paced() {
    let f = fixture(false, Vec::new());
    run_with_runtime(&args(&["session.jsonl", "--delay", "200"]), &f.runtime).expect("run");
    assert!(f.clock.sleeps().is_empty());
}

#[test]
fn terminal_batch_reveals_with_word_delay_from_the_flag() {
    let f = fixture(true, Vec::new());
    run_with_runtime(&args(&["session.jsonl", "--delay", "200"]), &f.runtime).expect("run");
    let sleeps = f.clock.sleeps();
    assert!(!sleeps.is_empty());
    assert!(f
        .terminal
        .plain_output()
        .contains("⏺ Let me check the directory listing.\n"));
}

#[test]
fn config_file_can_disable_streaming() {
    let f = fixture(true, Vec::new());
    run_with_runtime(
        &args(&["session.jsonl", "--config", "replay.toml"]),
        &f.runtime,
    )
    .expect("run");
    assert!(f.clock.sleeps().is_empty());
}

#[test]
fn missing_log_is_reported_as_file_not_found() {
    let f = fixture(false, Vec::new());
    let err = run_with_runtime(&args(&["nowhere.jsonl"]), &f.runtime).expect_err("missing");
    assert!(matches!(err, ReplayError::FileNotFound(_)));
    assert_eq!(err.to_string(), "File not found: nowhere.jsonl");
    assert!(f.terminal.written_lines().is_empty());
}

#[test]
fn interactive_request_without_terminal_falls_back_to_batch() {
    let f = fixture(false, vec![Some(Key::Char('q'))]);
    run_with_runtime(&args(&["session.jsonl", "-i"]), &f.runtime).expect("run");
    assert!(f.terminal.error_lines()[0].contains("seek mode needs a terminal"));
    assert!(f.terminal.raw_mode_transitions().is_empty());
    assert_eq!(f.input.remaining(), 1);
    assert!(f.terminal.plain_output().contains("✅ Replay completed"));
}

#[test]
fn flow_session_shows_tool_output_with_its_call() {
    let script = vec![
        Some(Key::Char('x')),
        Some(Key::Enter),
        Some(Key::Enter),
        Some(Key::Char('q')),
    ];
    let f = fixture(true, script);
    run_with_runtime(&args(&["session.jsonl", "-I", "-s"]), &f.runtime).expect("run");

    let out = f.terminal.plain_output();
    assert!(out.contains("Interactive Flow Mode"));
    assert!(out.contains("⏺ Let me check the directory listing.\r\n"));
    assert!(out.contains("  ⎿  List files in current directory\r\n"));
    assert!(out.contains("  ⎿  Cargo.toml\r\n     src\r\n"));
    assert!(!out.contains("The directory holds"));
    assert_eq!(f.terminal.raw_mode_transitions(), vec![true, false]);
}

#[test]
fn filter_by_assistant_announces_itself() {
    let f = fixture(false, Vec::new());
    run_with_runtime(&args(&["session.jsonl", "-f", "assistant"]), &f.runtime).expect("run");
    assert_eq!(
        f.terminal.written_lines().last().map(String::as_str),
        Some("Showing only assistant messages\n")
    );
    let out = f.terminal.plain_output();
    assert!(!out.contains("User:"));
    assert!(out.contains("The directory holds a Cargo manifest and a src folder."));
}
