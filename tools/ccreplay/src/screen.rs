//! Output sink for playback.
//!
//! All rendering goes through [`Screen`], which knows whether the terminal is
//! in raw mode (line breaks become CR LF) and counts the rows every write
//! occupies so a rendered turn can later be erased exactly.

use crate::errors::ReplayError;
use crate::runtime::Terminal;
use crossterm::cursor::{Hide, MoveTo, MoveToColumn, MoveUp, RestorePosition, SavePosition};
use crossterm::style::StyledContent;
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::Command;
use std::fmt::Display;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;
use unicode_width::UnicodeWidthChar;

pub const TAB_WIDTH: usize = 8;

/// Consumes the rest of an escape sequence whose ESC was just read: CSI up
/// to its final byte, OSC up to BEL or ST, otherwise one character.
pub fn skip_escape_sequence(chars: &mut Peekable<Chars<'_>>) {
    match chars.next() {
        Some('[') => {
            for next in chars.by_ref() {
                if ('\u{40}'..='\u{7e}').contains(&next) {
                    break;
                }
            }
        }
        Some(']') => {
            while let Some(next) = chars.next() {
                if next == '\u{7}' {
                    break;
                }
                if next == '\u{1b}' && chars.peek() == Some(&'\\') {
                    chars.next();
                    break;
                }
            }
        }
        _ => {}
    }
}

/// Makes text read from a log safe to write and measure. Escape sequences
/// and control characters are dropped and tabs become spaces up to the next
/// tab stop, so every character left advances the cursor by its width.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' => {
                out.push('\n');
                column = 0;
            }
            '\t' => {
                let pad = TAB_WIDTH - column % TAB_WIDTH;
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\u{1b}' => skip_escape_sequence(&mut chars),
            _ if ch.is_control() => {}
            _ => {
                out.push(ch);
                column += ch.width().unwrap_or(0);
            }
        }
    }
    out
}

/// Counts terminal rows consumed by written text, including soft wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTracker {
    width: usize,
    column: usize,
    rows: usize,
}

impl LineTracker {
    pub fn new(width: u16) -> Self {
        Self {
            width: usize::from(width.max(1)),
            column: 0,
            rows: 0,
        }
    }

    pub fn track(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => {
                    self.rows += 1;
                    self.column = 0;
                }
                '\r' => self.column = 0,
                _ => {
                    let width = ch.width().unwrap_or(0);
                    if self.column + width > self.width {
                        self.rows += 1;
                        self.column = 0;
                    }
                    self.column += width;
                }
            }
        }
    }

    /// Rows completed since the last reset, plus the current row if the
    /// cursor is not at its start.
    pub fn rows(&self) -> usize {
        if self.column > 0 {
            self.rows + 1
        } else {
            self.rows
        }
    }

    pub fn reset(&mut self) {
        self.rows = 0;
        self.column = 0;
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = usize::from(width.max(1));
    }
}

pub struct Screen {
    terminal: Arc<dyn Terminal>,
    raw: bool,
    tracker: LineTracker,
}

impl Screen {
    pub fn new(terminal: Arc<dyn Terminal>) -> Self {
        let (cols, _) = terminal.size();
        Self {
            terminal,
            raw: false,
            tracker: LineTracker::new(cols),
        }
    }

    pub fn set_raw(&mut self, raw: bool) {
        self.raw = raw;
    }

    /// `(columns, rows)` as currently reported by the terminal.
    pub fn size(&self) -> (u16, u16) {
        self.terminal.size()
    }

    /// Starts a fresh row count, picking up any terminal resize.
    pub fn begin_measure(&mut self) {
        let (cols, _) = self.terminal.size();
        self.tracker.set_width(cols);
        self.tracker.reset();
    }

    pub fn measured_rows(&self) -> usize {
        self.tracker.rows()
    }

    pub fn write(&mut self, text: &str) -> Result<(), ReplayError> {
        if text.is_empty() {
            return Ok(());
        }
        self.tracker.track(text);
        self.emit(text)
    }

    pub fn write_line(&mut self, text: &str) -> Result<(), ReplayError> {
        self.write(text)?;
        self.write("\n")
    }

    /// Writes styled text; only the content counts toward measured rows.
    pub fn write_styled<D: Display>(&mut self, styled: StyledContent<D>) -> Result<(), ReplayError> {
        let plain = styled.content().to_string();
        if plain.is_empty() {
            return Ok(());
        }
        self.tracker.track(&plain);
        self.emit(&styled.to_string())
    }

    pub fn write_styled_line<D: Display>(
        &mut self,
        styled: StyledContent<D>,
    ) -> Result<(), ReplayError> {
        self.write_styled(styled)?;
        self.write("\n")
    }

    /// Erases the last `rows` rows above the cursor, leaving the cursor at the
    /// start of the topmost erased row. Capped at the terminal height minus
    /// the status row.
    pub fn erase_rows(&mut self, rows: usize) -> Result<usize, ReplayError> {
        let (_, height) = self.terminal.size();
        let cap = usize::from(height.saturating_sub(1));
        let count = rows.min(cap);
        let mut seq = String::new();
        for _ in 0..count {
            push_ansi(&mut seq, MoveUp(1))?;
            push_ansi(&mut seq, MoveToColumn(0))?;
            push_ansi(&mut seq, Clear(ClearType::CurrentLine))?;
        }
        if !seq.is_empty() {
            self.terminal.write(&seq)?;
        }
        Ok(count)
    }

    pub fn clear_all(&mut self) -> Result<(), ReplayError> {
        let mut seq = String::new();
        push_ansi(&mut seq, Clear(ClearType::All))?;
        push_ansi(&mut seq, MoveTo(0, 0))?;
        self.terminal.write(&seq)
    }

    /// Draws `text` on the bottom row without moving the cursor.
    pub fn draw_bottom_line(&mut self, text: &str) -> Result<(), ReplayError> {
        let (_, height) = self.terminal.size();
        let mut seq = String::new();
        push_ansi(&mut seq, SavePosition)?;
        push_ansi(&mut seq, MoveTo(0, height.saturating_sub(1)))?;
        push_ansi(&mut seq, Clear(ClearType::CurrentLine))?;
        seq.push_str(text);
        push_ansi(&mut seq, RestorePosition)?;
        self.terminal.write(&seq)
    }

    pub fn clear_bottom_line(&mut self) -> Result<(), ReplayError> {
        self.draw_bottom_line("")
    }

    pub fn enter_alternate_screen(&mut self) -> Result<(), ReplayError> {
        self.command(EnterAlternateScreen)?;
        self.clear_all()
    }

    pub fn leave_alternate_screen(&mut self) -> Result<(), ReplayError> {
        self.command(LeaveAlternateScreen)
    }

    pub fn hide_cursor(&mut self) -> Result<(), ReplayError> {
        self.command(Hide)
    }

    fn command(&mut self, command: impl Command) -> Result<(), ReplayError> {
        let mut seq = String::new();
        push_ansi(&mut seq, command)?;
        self.terminal.write(&seq)
    }

    fn emit(&self, text: &str) -> Result<(), ReplayError> {
        if self.raw && text.contains('\n') {
            self.terminal.write(&text.replace('\n', "\r\n"))
        } else {
            self.terminal.write(text)
        }
    }
}

fn push_ansi(buffer: &mut String, command: impl Command) -> Result<(), ReplayError> {
    command
        .write_ansi(buffer)
        .map_err(|e| ReplayError::Terminal(e.to_string()))
}
