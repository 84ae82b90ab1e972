//! Playback session orchestration.
//!
//! One [`PlaybackController`] drives one session in any [`PlaybackMode`]. The
//! interactive loop is single-threaded: it blocks on input for at most the
//! time left until the next autoplay tick, runs one transport action to
//! completion, then redraws the status row. While a turn renders, input is
//! only read from inside the reveal pacer, so no second render can start.

use crate::config::AppConfig;
use crate::errors::ReplayError;
use crate::formatter::{is_visible, EntryFormatter, RenderContext, Rendered};
use crate::history::{ShownTurn, VisibleHistory};
use crate::hotkeys::{action_for_key, Key, PlaybackAction};
use crate::logging::RunLog;
use crate::reveal::{Pacer, RevealEngine, RevealTiming, SkipToken, SleepPacer};
use crate::runtime::{Clock, InputSource, ProductionRuntime, Terminal};
use crate::screen::Screen;
use crate::timeline::{AutoplayToggle, Timeline};
use crate::tui::{self, StatusView};
use crate::types::{PlaybackMode, Turn};
use crossterm::cursor::Show;
use crossterm::style::Stylize;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::Command;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Completed,
    Quit,
    Interrupted,
}

impl SessionEnd {
    fn for_action(action: PlaybackAction) -> Self {
        if action == PlaybackAction::Interrupt {
            Self::Interrupted
        } else {
            Self::Quit
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Quit => "quit",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Raw-mode scope. Dropping it leaves raw mode, leaves the alternate screen
/// if it is still active and shows the cursor again.
pub struct TerminalModeGuard {
    terminal: Arc<dyn Terminal>,
    active: bool,
    alternate: bool,
}

impl TerminalModeGuard {
    pub fn enter(terminal: Arc<dyn Terminal>) -> Result<Self, ReplayError> {
        terminal.enter_raw_mode()?;
        Ok(Self {
            terminal,
            active: true,
            alternate: false,
        })
    }

    pub fn set_alternate(&mut self, alternate: bool) {
        self.alternate = alternate;
    }

    pub fn release(&mut self) -> Result<(), ReplayError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let mut seq = String::new();
        if self.alternate {
            self.alternate = false;
            LeaveAlternateScreen
                .write_ansi(&mut seq)
                .map_err(|e| ReplayError::Terminal(e.to_string()))?;
        }
        Show.write_ansi(&mut seq)
            .map_err(|e| ReplayError::Terminal(e.to_string()))?;
        let restored = self.terminal.write(&seq);
        self.terminal.leave_raw_mode()?;
        restored
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Pacer used while a turn renders in an interactive session: waits by
/// polling input so keys pressed mid-reveal are seen at the next checkpoint.
struct InputPacer<'a> {
    input: &'a dyn InputSource,
    clock: &'a dyn Clock,
    mode: PlaybackMode,
    pending: &'a mut VecDeque<Key>,
    end: &'a mut Option<SessionEnd>,
}

impl Pacer for InputPacer<'_> {
    fn pause(&mut self, delay: Duration, skip: &SkipToken) -> Result<(), ReplayError> {
        if self.end.is_some() {
            skip.request();
            return Ok(());
        }
        let deadline = self.clock.now() + delay;
        loop {
            let remaining = deadline
                .duration_since(self.clock.now())
                .unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return Ok(());
            }
            let Some(key) = self.input.poll_key(remaining)? else {
                continue;
            };
            match action_for_key(key, self.mode) {
                Some(PlaybackAction::Next) => {
                    skip.request();
                    return Ok(());
                }
                Some(action) if action.ends_session() => {
                    skip.request();
                    *self.end = Some(SessionEnd::for_action(action));
                    return Ok(());
                }
                _ => self.pending.push_back(key),
            }
        }
    }
}

pub struct PlaybackController {
    mode: PlaybackMode,
    timeline: Timeline,
    history: VisibleHistory,
    formatter: EntryFormatter,
    reveal: RevealEngine,
    screen: Screen,
    terminal: Arc<dyn Terminal>,
    clock: Arc<dyn Clock>,
    input: Arc<dyn InputSource>,
    log: RunLog,
    idle_poll: Duration,
    notice: Option<String>,
    pending_keys: VecDeque<Key>,
    end: Option<SessionEnd>,
    shown_count: usize,
}

impl PlaybackController {
    pub fn new(
        mode: PlaybackMode,
        turns: Vec<Turn>,
        cfg: &AppConfig,
        runtime: &ProductionRuntime,
        log: RunLog,
    ) -> Self {
        let mut reveal = RevealEngine::new(
            cfg.streaming.enabled,
            RevealTiming {
                char_delay: Duration::from_millis(cfg.streaming.char_delay_ms),
                word_delay: Duration::from_millis(cfg.streaming.word_delay_ms),
            },
        );
        let timeline = Timeline::new(turns, &cfg.playback);
        reveal.set_speed(timeline.speed());
        Self {
            mode,
            timeline,
            history: VisibleHistory::new(cfg.history.max_displayed),
            formatter: EntryFormatter::new(&cfg.display),
            reveal,
            screen: Screen::new(runtime.terminal.clone()),
            terminal: runtime.terminal.clone(),
            clock: runtime.clock.clone(),
            input: runtime.input.clone(),
            log,
            idle_poll: cfg.playback.idle_poll(),
            notice: None,
            pending_keys: VecDeque::new(),
            end: None,
            shown_count: 0,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn history(&self) -> &VisibleHistory {
        &self.history
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn run(&mut self) -> Result<SessionEnd, ReplayError> {
        self.log.info(
            "session.start",
            json!({
                "mode": self.mode.as_str(),
                "turns": self.timeline.len(),
                "streaming": self.reveal.is_enabled(),
            }),
        );
        let end = match self.mode {
            PlaybackMode::Batch => self.run_batch()?,
            PlaybackMode::Seek | PlaybackMode::Flow => self.run_interactive()?,
        };
        self.log.info(
            "session.end",
            json!({
                "reason": end.as_str(),
                "cursor": self.timeline.cursor(),
                "shown": self.shown_count,
            }),
        );
        Ok(end)
    }

    fn run_batch(&mut self) -> Result<SessionEnd, ReplayError> {
        self.timeline.start();
        let mut pacer = SleepPacer::new(self.clock.clone());
        while !self.timeline.is_finished() {
            let index = self.timeline.cursor();
            let Some(turn) = self.timeline.turn(index) else {
                break;
            };
            let next = self.timeline.turn(index + 1);
            let mut ctx = RenderContext {
                screen: &mut self.screen,
                reveal: &mut self.reveal,
                pacer: &mut pacer,
            };
            let rendered = self.formatter.render(turn, next, &mut ctx)?;
            self.note_render(index, rendered);
            self.timeline.commit_advance();
        }
        self.screen.write_line("✅ Replay completed")?;
        Ok(SessionEnd::Completed)
    }

    fn run_interactive(&mut self) -> Result<SessionEnd, ReplayError> {
        let mut guard = TerminalModeGuard::enter(self.terminal.clone())?;
        self.screen.set_raw(true);
        let result = self.interactive_loop(&mut guard);
        let _ = self.screen.clear_bottom_line();
        let _ = self.screen.write("\n");
        let released = guard.release();
        self.screen.set_raw(false);
        let end = result?;
        released?;
        Ok(end)
    }

    fn interactive_loop(&mut self, guard: &mut TerminalModeGuard) -> Result<SessionEnd, ReplayError> {
        self.screen.hide_cursor()?;
        self.show_panel(guard)?;
        if let Some(end) = self.end {
            return Ok(end);
        }
        self.timeline.start();
        self.screen.clear_all()?;
        self.draw_status()?;

        loop {
            if let Some(end) = self.end {
                return Ok(end);
            }
            let key = match self.pending_keys.pop_front() {
                Some(key) => Some(key),
                None => {
                    let timeout = self
                        .timeline
                        .wait_timeout(self.clock.now(), self.idle_poll);
                    self.input.poll_key(timeout)?
                }
            };
            if let Some(key) = key {
                self.handle_key(key, guard)?;
            }
            if self.end.is_none() && self.timeline.tick_due(self.clock.now()) {
                self.autoplay_tick()?;
            }
        }
    }

    fn handle_key(&mut self, key: Key, guard: &mut TerminalModeGuard) -> Result<(), ReplayError> {
        let Some(action) = action_for_key(key, self.mode) else {
            return Ok(());
        };
        self.notice = None;
        match action {
            PlaybackAction::Next => self.next_message()?,
            PlaybackAction::Previous => match self.mode {
                PlaybackMode::Flow => self.hide_last()?,
                PlaybackMode::Seek | PlaybackMode::Batch => self.step_back()?,
            },
            PlaybackAction::ToggleAutoplay => self.toggle_autoplay(),
            PlaybackAction::SpeedUp => self.change_speed(true),
            PlaybackAction::SpeedDown => self.change_speed(false),
            PlaybackAction::Clear => {
                self.screen.clear_all()?;
                self.history.clear();
                self.notice = Some("Screen cleared".to_string());
            }
            PlaybackAction::Restart => {
                self.screen.clear_all()?;
                self.history.clear();
                self.timeline.restart();
                self.notice = Some("Restarted from the beginning".to_string());
            }
            PlaybackAction::Help => self.show_panel(guard)?,
            PlaybackAction::Quit | PlaybackAction::Interrupt => {
                self.end = Some(SessionEnd::for_action(action))
            }
        }
        self.log.info(
            &format!("transport.{}", action.as_str()),
            json!({
                "cursor": self.timeline.cursor(),
                "state": self.timeline.state().as_str(),
                "speed": self.timeline.speed(),
                "notice": self.notice,
            }),
        );
        if self.end.is_none() {
            self.draw_status()?;
        }
        Ok(())
    }

    fn autoplay_tick(&mut self) -> Result<(), ReplayError> {
        if self.history.has_hidden() {
            self.reveal_hidden()?;
        } else if !self.timeline.is_finished() {
            self.advance()?;
        }
        if self.exhausted() {
            self.timeline.mark_finished();
            self.notice = Some("All messages shown".to_string());
        } else {
            self.timeline.rearm(self.clock.now());
        }
        self.log.debug(
            "transport.tick",
            json!({"cursor": self.timeline.cursor(), "speed": self.timeline.speed()}),
        );
        if self.end.is_none() {
            self.draw_status()?;
        }
        Ok(())
    }

    fn next_message(&mut self) -> Result<(), ReplayError> {
        if self.history.has_hidden() {
            self.reveal_hidden()?;
            if self.exhausted() {
                self.timeline.mark_finished();
            }
            return Ok(());
        }
        if self.timeline.is_finished() {
            self.notice = Some("No more messages".to_string());
            return Ok(());
        }
        self.advance()?;
        Ok(())
    }

    /// Renders forward from the cursor until a visible turn is shown or the
    /// sequence ends.
    fn advance(&mut self) -> Result<bool, ReplayError> {
        while !self.timeline.is_finished() {
            let index = self.timeline.cursor();
            let rendered = self.render_turn(index)?;
            self.timeline.commit_advance();
            if rendered.visible || self.end.is_some() {
                return Ok(rendered.visible);
            }
        }
        Ok(false)
    }

    fn reveal_hidden(&mut self) -> Result<(), ReplayError> {
        let Some(entry) = self.history.take_hidden() else {
            return Ok(());
        };
        match self.render_turn(entry.index) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.history.restore_hidden(entry);
                Err(err)
            }
        }
    }

    fn hide_last(&mut self) -> Result<(), ReplayError> {
        let Some(entry) = self.history.last_displayed().copied() else {
            self.notice = Some("Nothing to hide".to_string());
            return Ok(());
        };
        self.screen.clear_bottom_line()?;
        self.screen.erase_rows(entry.rows)?;
        self.history.hide_last();
        self.timeline.reopen();
        self.notice = Some(format!("Hid message {}", entry.index + 1));
        Ok(())
    }

    fn step_back(&mut self) -> Result<(), ReplayError> {
        if let Some(entry) = self.history.last_displayed().copied() {
            self.screen.clear_bottom_line()?;
            self.screen.erase_rows(entry.rows)?;
            self.history.pop_displayed();
            self.timeline.rewind_to(entry.index);
            self.notice = Some(format!("Back to message {}", entry.index + 1));
            return Ok(());
        }
        let cursor = self.timeline.cursor();
        if cursor == 0 {
            self.notice = Some("Already at the first message".to_string());
            return Ok(());
        }
        self.timeline.rewind_to(cursor - 1);
        self.notice = Some(format!("Back to message {cursor}"));
        Ok(())
    }

    fn toggle_autoplay(&mut self) {
        if self.history.has_hidden() {
            self.timeline.reopen();
        }
        let notice = match self.timeline.toggle_autoplay(self.clock.now()) {
            AutoplayToggle::Started => "Autoplay on",
            AutoplayToggle::Stopped => "Autoplay off",
            AutoplayToggle::Refused => "No more messages",
        };
        self.notice = Some(notice.to_string());
    }

    fn change_speed(&mut self, faster: bool) {
        let now = self.clock.now();
        let changed = if faster {
            self.timeline.speed_up(now)
        } else {
            self.timeline.speed_down(now)
        };
        self.reveal.set_speed(self.timeline.speed());
        let speed = tui::format_speed(self.timeline.speed());
        self.notice = Some(if changed {
            format!("Speed: {speed}")
        } else {
            format!("Speed limit: {speed}")
        });
    }

    fn show_panel(&mut self, guard: &mut TerminalModeGuard) -> Result<(), ReplayError> {
        let (cols, rows) = self.screen.size();
        let lines = tui::render_panel(self.mode, cols, rows)?;
        self.screen.enter_alternate_screen()?;
        guard.set_alternate(true);
        for line in &lines {
            self.screen.write_line(line)?;
        }
        loop {
            if let Some(key) = self.input.poll_key(self.idle_poll)? {
                if key == Key::Interrupt {
                    self.end = Some(SessionEnd::Interrupted);
                }
                break;
            }
        }
        self.screen.leave_alternate_screen()?;
        guard.set_alternate(false);
        self.timeline.rearm(self.clock.now());
        Ok(())
    }

    fn render_turn(&mut self, index: usize) -> Result<Rendered, ReplayError> {
        let Some(turn) = self.timeline.turn(index) else {
            return Ok(Rendered::NOTHING);
        };
        if is_visible(turn) {
            self.screen.clear_bottom_line()?;
        }
        let next = self.timeline.turn(index + 1);
        let mut pacer = InputPacer {
            input: self.input.as_ref(),
            clock: self.clock.as_ref(),
            mode: self.mode,
            pending: &mut self.pending_keys,
            end: &mut self.end,
        };
        let mut ctx = RenderContext {
            screen: &mut self.screen,
            reveal: &mut self.reveal,
            pacer: &mut pacer,
        };
        let rendered = self.formatter.render(turn, next, &mut ctx);
        self.reveal.reset_skip();
        let rendered = rendered?;
        self.note_render(index, rendered);
        Ok(rendered)
    }

    fn note_render(&mut self, index: usize, rendered: Rendered) {
        if rendered.visible {
            self.history.record_shown(ShownTurn {
                index,
                rows: rendered.rows,
            });
            self.shown_count += 1;
            return;
        }
        let uuid = self
            .timeline
            .turn(index)
            .map(|turn| turn.uuid.as_str())
            .unwrap_or_default();
        self.log.debug(
            "render.skipped_invisible",
            json!({"index": index, "uuid": uuid}),
        );
    }

    fn exhausted(&self) -> bool {
        self.timeline.cursor() >= self.timeline.len() && !self.history.has_hidden()
    }

    fn draw_status(&mut self) -> Result<(), ReplayError> {
        let (cols, _) = self.screen.size();
        let view = StatusView {
            mode: self.mode,
            playing: self.timeline.is_playing(),
            cursor: self.timeline.cursor(),
            total: self.timeline.len(),
            speed: self.timeline.speed(),
            notice: self.notice.as_deref(),
        };
        // One cell short of the edge so the terminal never auto-wraps.
        let text = tui::fit_to_width(&tui::status_line(&view), usize::from(cols).saturating_sub(1));
        let styled = match self.mode {
            PlaybackMode::Flow => text.white().on_dark_grey().to_string(),
            PlaybackMode::Seek | PlaybackMode::Batch => text.dim().to_string(),
        };
        self.screen.draw_bottom_line(&styled)
    }
}
