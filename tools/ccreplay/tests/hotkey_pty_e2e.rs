use expectrl::{Eof, Expect};
use std::process::Command;
use std::time::Duration;

fn fixture(path: &str) -> String {
    format!("{}/tests/fixtures/{path}", env!("CARGO_MANIFEST_DIR"))
}

fn replay_command(mode_flag: &str) -> Command {
    let bin = std::path::PathBuf::from(env!("CARGO_BIN_EXE_ccreplay"));
    let mut cmd = Command::new(bin);
    cmd.arg(fixture("logs/session.jsonl"))
        .arg(mode_flag)
        .arg("--no-streaming");
    cmd
}

fn spawn(mode_flag: &str) -> expectrl::session::OsSession {
    let mut session = expectrl::session::OsSession::spawn(replay_command(mode_flag)).expect("spawn pty");
    session.set_expect_timeout(Some(Duration::from_secs(8)));
    std::thread::sleep(Duration::from_millis(350));
    session
}

#[test]
fn pty_e2e_flow_steps_then_q_quits() {
    let mut session = spawn("--interactive-flow");
    session.send("x").expect("dismiss panel");
    session.send("\r").expect("send enter");
    session
        .expect("What files are in this directory?")
        .expect("first turn drawn");
    session.send("q").expect("send q");
    session.expect(Eof).expect("session exited");
}

#[test]
fn pty_e2e_seek_autoplay_then_q_quits() {
    let mut session = spawn("--interactive");
    session.send("x").expect("dismiss panel");
    session.send(" ").expect("toggle autoplay");
    session.expect("PLAYING").expect("status shows playing");
    session.send("q").expect("send q");
    session.expect(Eof).expect("session exited");
}

#[test]
fn pty_e2e_ctrl_c_quits_from_the_panel() {
    let mut session = spawn("--interactive-flow");
    session.send("\u{3}").expect("send ctrl-c");
    session.expect(Eof).expect("session exited");
}

#[test]
fn pty_e2e_ctrl_c_quits_mid_session() {
    let mut session = spawn("--interactive");
    session.send("x").expect("dismiss panel");
    session.send("\u{3}").expect("send ctrl-c");
    session.expect(Eof).expect("session exited");
}
