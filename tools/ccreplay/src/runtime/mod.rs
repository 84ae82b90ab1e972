use crate::errors::ReplayError;
use crate::hotkeys::Key;
use crate::screen::skip_escape_sequence;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub const FALLBACK_TERMINAL_SIZE: (u16, u16) = (80, 24);

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep_until(&self, deadline: SystemTime) -> Result<(), ReplayError>;

    fn sleep(&self, duration: Duration) -> Result<(), ReplayError> {
        self.sleep_until(self.now() + duration)
    }
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, ReplayError>;
    fn exists(&self, path: &Path) -> bool;
}

pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn stdout_is_tty(&self) -> bool;
    /// `(columns, rows)`.
    fn size(&self) -> (u16, u16);
    /// Writes and flushes without appending a line break.
    fn write(&self, text: &str) -> Result<(), ReplayError>;
    fn write_line(&self, line: &str) -> Result<(), ReplayError>;
    fn write_error_line(&self, line: &str) -> Result<(), ReplayError>;
    fn enter_raw_mode(&self) -> Result<(), ReplayError>;
    fn leave_raw_mode(&self) -> Result<(), ReplayError>;
}

pub trait InputSource: Send + Sync {
    /// Waits at most `timeout` for one key press.
    fn poll_key(&self, timeout: Duration) -> Result<Option<Key>, ReplayError>;
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), ReplayError> {
        let now = SystemTime::now();
        if let Ok(duration) = deadline.duration_since(now) {
            std::thread::sleep(duration);
        }
        Ok(())
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, ReplayError> {
        std::fs::read_to_string(path).map_err(|e| ReplayError::Io(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn stdout_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdout())
    }

    fn size(&self) -> (u16, u16) {
        match crossterm::terminal::size() {
            Ok((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
            _ => FALLBACK_TERMINAL_SIZE,
        }
    }

    fn write(&self, text: &str) -> Result<(), ReplayError> {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ReplayError::Io(e.to_string()))
    }

    fn write_line(&self, line: &str) -> Result<(), ReplayError> {
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| ReplayError::Io(e.to_string()))
    }

    fn write_error_line(&self, line: &str) -> Result<(), ReplayError> {
        let mut err = std::io::stderr();
        writeln!(err, "{line}").map_err(|e| ReplayError::Io(e.to_string()))
    }

    fn enter_raw_mode(&self) -> Result<(), ReplayError> {
        crossterm::terminal::enable_raw_mode().map_err(|e| ReplayError::Terminal(e.to_string()))
    }

    fn leave_raw_mode(&self) -> Result<(), ReplayError> {
        crossterm::terminal::disable_raw_mode().map_err(|e| ReplayError::Terminal(e.to_string()))
    }
}

pub struct ProductionInput;

impl InputSource for ProductionInput {
    fn poll_key(&self, timeout: Duration) -> Result<Option<Key>, ReplayError> {
        use crossterm::event::{self, Event, KeyEventKind};

        if !event::poll(timeout).map_err(|e| ReplayError::Terminal(e.to_string()))? {
            return Ok(None);
        }
        match event::read().map_err(|e| ReplayError::Terminal(e.to_string()))? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(Key::from(key))),
            _ => Ok(None),
        }
    }
}

pub struct ProductionRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
    pub input: Arc<dyn InputSource>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
            input: Arc::new(ProductionInput),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<SystemTime>>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<SystemTime> {
        self.sleeps.lock().expect("sleep lock").clone()
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), ReplayError> {
        self.sleeps.lock().expect("sleep lock").push(deadline);
        let mut now = self.now.lock().expect("clock lock");
        if deadline > *now {
            *now = deadline;
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    fail_next: Arc<Mutex<Option<ReplayError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert(path.into(), contents.into());
        Self {
            files: Arc::new(Mutex::new(map)),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .expect("files lock")
            .insert(path.into(), contents.into());
    }

    pub fn set_fail_next(&self, error: ReplayError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    fn maybe_fail(&self) -> Result<(), ReplayError> {
        if let Some(err) = self.fail_next.lock().expect("fail lock").take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, ReplayError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| ReplayError::Io(format!("missing file {}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}

#[derive(Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    pub size: (u16, u16),
    output: Arc<Mutex<String>>,
    lines: Arc<Mutex<Vec<String>>>,
    error_lines: Arc<Mutex<Vec<String>>>,
    raw_mode: Arc<Mutex<Vec<bool>>>,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self::new(false)
    }
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            size: FALLBACK_TERMINAL_SIZE,
            output: Arc::new(Mutex::new(String::new())),
            lines: Arc::new(Mutex::new(Vec::new())),
            error_lines: Arc::new(Mutex::new(Vec::new())),
            raw_mode: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size = (cols, rows);
        self
    }

    /// Everything passed to `write`, escape sequences included.
    pub fn output(&self) -> String {
        self.output.lock().expect("output lock").clone()
    }

    /// `output()` with ANSI escape sequences removed.
    pub fn plain_output(&self) -> String {
        strip_ansi(&self.output())
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.error_lines.lock().expect("error lines lock").clone()
    }

    /// Raw-mode transitions in order: `true` for enter, `false` for leave.
    pub fn raw_mode_transitions(&self) -> Vec<bool> {
        self.raw_mode.lock().expect("raw mode lock").clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn stdout_is_tty(&self) -> bool {
        self.is_tty
    }

    fn size(&self) -> (u16, u16) {
        self.size
    }

    fn write(&self, text: &str) -> Result<(), ReplayError> {
        self.output.lock().expect("output lock").push_str(text);
        Ok(())
    }

    fn write_line(&self, line: &str) -> Result<(), ReplayError> {
        self.lines.lock().expect("lines lock").push(line.to_string());
        Ok(())
    }

    fn write_error_line(&self, line: &str) -> Result<(), ReplayError> {
        self.error_lines
            .lock()
            .expect("error lines lock")
            .push(line.to_string());
        Ok(())
    }

    fn enter_raw_mode(&self) -> Result<(), ReplayError> {
        self.raw_mode.lock().expect("raw mode lock").push(true);
        Ok(())
    }

    fn leave_raw_mode(&self) -> Result<(), ReplayError> {
        self.raw_mode.lock().expect("raw mode lock").push(false);
        Ok(())
    }
}

/// Scripted key source. `None` entries are idle polls that advance the
/// shared clock by the requested timeout; an exhausted script yields
/// `Key::Interrupt` so loops under test always terminate.
#[derive(Clone)]
pub struct FakeInput {
    script: Arc<Mutex<VecDeque<Option<Key>>>>,
    clock: FakeClock,
    polls: Arc<Mutex<Vec<Duration>>>,
}

impl FakeInput {
    pub fn new(clock: FakeClock, script: impl IntoIterator<Item = Option<Key>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            clock,
            polls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn polls(&self) -> Vec<Duration> {
        self.polls.lock().expect("polls lock").clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock").len()
    }
}

impl InputSource for FakeInput {
    fn poll_key(&self, timeout: Duration) -> Result<Option<Key>, ReplayError> {
        self.polls.lock().expect("polls lock").push(timeout);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Some(key)) => Ok(Some(key)),
            Some(None) => {
                self.clock.advance(timeout);
                Ok(None)
            }
            None => Ok(Some(Key::Interrupt)),
        }
    }
}

pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            skip_escape_sequence(&mut chars);
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{strip_ansi, Clock, FakeClock, FakeInput, InputSource};
    use crate::hotkeys::Key;
    use std::time::{Duration, SystemTime};

    #[test]
    fn fake_input_advances_clock_on_idle_polls_and_interrupts_when_exhausted() {
        let clock = FakeClock::default();
        let input = FakeInput::new(clock.clone(), [None, Some(Key::Char('a'))]);

        assert_eq!(input.poll_key(Duration::from_millis(250)).expect("poll"), None);
        assert_eq!(
            clock.now(),
            SystemTime::UNIX_EPOCH + Duration::from_millis(250)
        );
        assert_eq!(
            input.poll_key(Duration::from_millis(250)).expect("poll"),
            Some(Key::Char('a'))
        );
        assert_eq!(
            input.poll_key(Duration::from_millis(250)).expect("poll"),
            Some(Key::Interrupt)
        );
        assert_eq!(input.polls().len(), 3);
    }

    #[test]
    fn fake_clock_sleep_moves_time_forward_only() {
        let clock = FakeClock::default();
        clock.sleep(Duration::from_millis(10)).expect("sleep");
        clock
            .sleep_until(SystemTime::UNIX_EPOCH)
            .expect("sleep in the past");
        assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_millis(10));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn strip_ansi_removes_csi_sequences() {
        assert_eq!(strip_ansi("\u{1b}[2K\u{1b}[1Ahello\u{1b}[0m"), "hello");
        assert_eq!(strip_ansi("\u{1b}7a\u{1b}8"), "a");
    }
}
