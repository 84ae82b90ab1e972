use crate::errors::ReplayError;
use crate::hotkeys::{bindings_for_mode, status_legend};
use crate::types::PlaybackMode;
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use unicode_width::UnicodeWidthChar;

pub const PROGRESS_BAR_CELLS: usize = 30;
const PANEL_MAX_WIDTH: u16 = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusView<'a> {
    pub mode: PlaybackMode,
    pub playing: bool,
    pub cursor: usize,
    pub total: usize,
    pub speed: f64,
    pub notice: Option<&'a str>,
}

fn panel_title(mode: PlaybackMode) -> &'static str {
    match mode {
        PlaybackMode::Flow => "Interactive Flow Mode",
        PlaybackMode::Seek | PlaybackMode::Batch => "Interactive Playback Controls",
    }
}

fn panel_intro(mode: PlaybackMode) -> &'static str {
    match mode {
        PlaybackMode::Flow => {
            "The conversation flows like a live session. Hidden messages come back before new ones are shown."
        }
        PlaybackMode::Seek | PlaybackMode::Batch => {
            "Step through the conversation one message at a time or let it play on its own."
        }
    }
}

/// Renders the key-binding panel to plain text lines, one per terminal row.
/// Only cell symbols are read back, so the layout carries no styling.
pub fn render_panel(mode: PlaybackMode, width: u16, height: u16) -> Result<Vec<String>, ReplayError> {
    let bindings = bindings_for_mode(mode);
    let width = width.clamp(20, PANEL_MAX_WIDTH);
    let wanted = u16::try_from(bindings.len()).unwrap_or(u16::MAX).saturating_add(9);
    let height = wanted.min(height.max(6));

    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| ReplayError::Terminal(e.to_string()))?;
    terminal
        .draw(|frame| {
            let outer = Block::default()
                .borders(Borders::ALL)
                .title(panel_title(mode));
            let inner = outer.inner(frame.area());
            frame.render_widget(outer, frame.area());

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(1),
                    Constraint::Length(2),
                ])
                .split(inner);

            frame.render_widget(
                Paragraph::new(panel_intro(mode)).wrap(Wrap { trim: true }),
                chunks[0],
            );

            let items = bindings
                .iter()
                .map(|binding| ListItem::new(format!("  {:<8}{}", binding.key, binding.action)))
                .collect::<Vec<_>>();
            frame.render_widget(List::new(items), chunks[1]);

            frame.render_widget(
                Paragraph::new(vec![
                    Line::from("  Ctrl+C  quit immediately"),
                    Line::from("Press any key to continue..."),
                ]),
                chunks[2],
            );
        })
        .map_err(|e| ReplayError::Terminal(e.to_string()))?;

    let buffer = terminal.backend().buffer();
    let mut lines = Vec::with_capacity(usize::from(height));
    for y in 0..height {
        let mut line = String::new();
        for x in 0..width {
            line.push_str(buffer[(x, y)].symbol());
        }
        lines.push(line.trim_end().to_string());
    }
    Ok(lines)
}

pub fn format_speed(speed: f64) -> String {
    format!("{speed}x")
}

pub fn progress_bar(cursor: usize, total: usize) -> String {
    let filled = if total == 0 {
        PROGRESS_BAR_CELLS
    } else {
        (cursor.min(total) * PROGRESS_BAR_CELLS) / total
    };
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(PROGRESS_BAR_CELLS - filled)
    )
}

fn percent(cursor: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        cursor.min(total) * 100 / total
    }
}

/// Bottom-row status text for interactive modes, unstyled.
pub fn status_line(view: &StatusView<'_>) -> String {
    let state = if view.playing {
        "▶ PLAYING"
    } else {
        "⏸ PAUSED"
    };
    let notice = view
        .notice
        .map(|notice| format!(" | {notice}"))
        .unwrap_or_default();
    match view.mode {
        // The legend goes last so a narrow terminal cuts it before the notice.
        PlaybackMode::Flow => format!(
            " {state} | {}/{} ({}%) | Speed: {}{notice} | {}",
            view.cursor,
            view.total,
            percent(view.cursor, view.total),
            format_speed(view.speed),
            status_legend()
        ),
        PlaybackMode::Seek | PlaybackMode::Batch => format!(
            "[{}] {}% | Speed: {} | {state}{notice}",
            progress_bar(view.cursor, view.total),
            percent(view.cursor, view.total),
            format_speed(view.speed)
        ),
    }
}

/// Cuts `text` so it fits in `width` display cells.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let mut used = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let cells = ch.width().unwrap_or(0);
        if used + cells > width {
            break;
        }
        used += cells;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{fit_to_width, progress_bar, render_panel, status_line, StatusView};
    use crate::hotkeys::bindings_for_mode;
    use crate::types::PlaybackMode;

    #[test]
    fn panel_lists_every_binding_inside_a_border() {
        for mode in [PlaybackMode::Seek, PlaybackMode::Flow] {
            let lines = render_panel(mode, 80, 40).expect("panel");
            let text = lines.join("\n");
            assert!(lines[0].starts_with('┌'));
            assert!(lines.last().expect("bottom").starts_with('└'));
            for binding in bindings_for_mode(mode) {
                assert!(text.contains(binding.action), "missing {}", binding.action);
            }
            assert!(text.contains("Press any key to continue..."));
        }
    }

    #[test]
    fn panel_rows_are_plain_aligned_text() {
        let lines = render_panel(PlaybackMode::Seek, 80, 40).expect("panel");
        assert!(lines.iter().all(|line| !line.contains('\u{1b}')));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("│  Space   pause/resume")));
    }

    #[test]
    fn seek_status_shows_a_thirty_cell_bar() {
        let line = status_line(&StatusView {
            mode: PlaybackMode::Seek,
            playing: false,
            cursor: 5,
            total: 10,
            speed: 1.5,
            notice: None,
        });
        assert_eq!(
            line,
            format!("[{}] 50% | Speed: 1.5x | ⏸ PAUSED", progress_bar(5, 10))
        );
        assert_eq!(progress_bar(5, 10).chars().count(), 30);
        assert_eq!(progress_bar(0, 0), "█".repeat(30));
    }

    #[test]
    fn flow_status_shows_counts_legend_and_notice() {
        let line = status_line(&StatusView {
            mode: PlaybackMode::Flow,
            playing: true,
            cursor: 3,
            total: 12,
            speed: 1.0,
            notice: Some("No more messages"),
        });
        assert!(line.starts_with(" ▶ PLAYING | 3/12 (25%) | Speed: 1x | No more messages | Enter:next"));
        assert!(line.ends_with("q:quit"));
    }

    #[test]
    fn fit_to_width_counts_display_cells() {
        assert_eq!(fit_to_width("abcdef", 4), "abcd");
        assert_eq!(fit_to_width("日本語", 5), "日本");
        assert_eq!(fit_to_width("ok", 10), "ok");
    }
}
