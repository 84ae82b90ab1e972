use crate::errors::ReplayError;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

/// Append-only JSON-lines file, one [`LogEvent`] per line.
#[derive(Debug, Clone)]
pub struct RunLogFile {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: &'a Value,
}

impl RunLogFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn write_event(
        &self,
        level: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), ReplayError> {
        let io_err = |e: std::io::Error| ReplayError::Io(format!("{}: {e}", self.path.display()));
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let clipped = clip_payload(payload, self.max_payload_bytes);
        let mut line = serde_json::to_string(&LogEvent {
            level,
            event_type,
            payload: clipped.as_ref().unwrap_or(payload),
        })
        .map_err(|e| ReplayError::Io(e.to_string()))?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(io_err)
    }
}

/// Optional run log. Every method is a no-op without a sink and swallows
/// write failures so logging never interrupts playback.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    sink: Option<RunLogFile>,
}

impl RunLog {
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn to_file(path: impl AsRef<Path>) -> Self {
        Self {
            sink: Some(RunLogFile::new(path)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn debug(&self, event_type: &str, payload: Value) {
        self.emit("debug", event_type, payload);
    }

    pub fn info(&self, event_type: &str, payload: Value) {
        self.emit("info", event_type, payload);
    }

    pub fn warn(&self, event_type: &str, payload: Value) {
        self.emit("warn", event_type, payload);
    }

    fn emit(&self, level: &str, event_type: &str, payload: Value) {
        if let Some(sink) = &self.sink {
            let _ = sink.write_event(level, event_type, &payload);
        }
    }
}

/// Replaces an oversized payload with its serialized prefix as a string.
/// `None` means the payload fits as is.
fn clip_payload(payload: &Value, max_bytes: usize) -> Option<Value> {
    let rendered = serde_json::to_string(payload).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return None;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(Value::String(format!("{}...", &rendered[..cut])))
}
