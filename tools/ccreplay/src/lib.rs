pub mod config;
pub mod controller;
pub mod errors;
pub mod formatter;
pub mod history;
pub mod hotkeys;
pub mod log_reader;
pub mod logging;
pub mod reveal;
pub mod runtime;
pub mod screen;
pub mod timeline;
pub mod tui;
pub mod types;

use clap::{error::ErrorKind, Parser, ValueEnum};
use config::{load_config, CliOverrides};
use controller::PlaybackController;
use errors::ReplayError;
use log_reader::{filter_by_role, load_turns};
use logging::RunLog;
use runtime::ProductionRuntime;
use serde_json::json;
use std::path::PathBuf;
use types::{PlaybackMode, Role};

#[derive(Debug, Clone, Parser)]
#[command(name = "ccreplay", version)]
#[command(about = "Replay Claude Code conversation logs")]
pub struct Cli {
    /// Path to the JSONL log file
    pub logfile: PathBuf,
    /// Delay between revealed words in milliseconds [default: 50]
    #[arg(short = 'd', long)]
    pub delay: Option<u64>,
    /// Only show messages from one role
    #[arg(short = 'f', long, value_enum)]
    pub filter: Option<CliRole>,
    /// Print text at once instead of revealing it word by word
    #[arg(short = 's', long, default_value_t = false)]
    pub no_streaming: bool,
    /// Step through messages with the keyboard
    #[arg(short = 'i', long, default_value_t = false, conflicts_with = "interactive_flow")]
    pub interactive: bool,
    /// Continuous display with show/hide history
    #[arg(short = 'I', long, default_value_t = false)]
    pub interactive_flow: bool,
    /// TOML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Append structured JSONL run events to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliRole {
    User,
    Assistant,
}

impl From<CliRole> for Role {
    fn from(value: CliRole) -> Self {
        match value {
            CliRole::User => Role::User,
            CliRole::Assistant => Role::Assistant,
        }
    }
}

impl Cli {
    pub fn requested_mode(&self) -> PlaybackMode {
        if self.interactive {
            PlaybackMode::Seek
        } else if self.interactive_flow {
            PlaybackMode::Flow
        } else {
            PlaybackMode::Batch
        }
    }
}

pub fn run() -> Result<i32, ReplayError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    runtime: &ProductionRuntime,
) -> Result<i32, ReplayError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(ReplayError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        delay_ms: cli.delay,
        filter: cli.filter.map(Into::into),
        no_streaming: cli.no_streaming,
        log_file: cli.log_file.clone(),
    };
    let mut cfg = load_config(&overrides, runtime.file_system.as_ref())?;
    let log = cfg
        .logging
        .path
        .as_ref()
        .map(RunLog::to_file)
        .unwrap_or_default();

    let report = load_turns(&cli.logfile, runtime.file_system.as_ref())?;
    let terminal = runtime.terminal.as_ref();
    for malformed in &report.malformed {
        terminal.write_error_line(&format!(
            "warning: skipping malformed line {}: {}",
            malformed.line_number, malformed.reason
        ))?;
        log.warn(
            "load.malformed_line",
            json!({"line": malformed.line_number, "reason": malformed.reason}),
        );
    }
    log.info(
        "load.complete",
        json!({
            "path": cli.logfile.display().to_string(),
            "records": report.raw_records,
            "turns": report.turns.len(),
            "merged": report.merged_records,
            "skipped": report.skipped_records,
            "malformed": report.malformed.len(),
        }),
    );

    terminal.write_line(&format!(
        "Replaying conversation from: {}\n",
        cli.logfile.display()
    ))?;
    terminal.write_line(&format!("Found {} entries\n", report.turns.len()))?;

    let mut turns = report.turns;
    if let Some(role) = cfg.filter {
        turns = filter_by_role(turns, role);
        terminal.write_line(&format!("Showing only {} messages\n", role.as_str()))?;
    }

    let mut mode = cli.requested_mode();
    let has_tty = terminal.stdin_is_tty() && terminal.stdout_is_tty();
    if mode.is_interactive() && !has_tty {
        terminal.write_error_line(&format!(
            "ccreplay: {} mode needs a terminal; printing the whole conversation instead",
            mode.as_str()
        ))?;
        mode = PlaybackMode::Batch;
    }
    if mode == PlaybackMode::Batch && !terminal.stdout_is_tty() {
        cfg.streaming.enabled = false;
    }

    let mut controller = PlaybackController::new(mode, turns, &cfg, runtime, log);
    controller.run()?;
    Ok(0)
}
