//! Per-turn rendering.
//!
//! [`is_visible`] decides from the turn alone whether anything will be drawn;
//! [`EntryFormatter::render`] draws it and reports the rows it used. Text
//! taken from the log passes through [`sanitize`] first so the row count
//! matches what the terminal shows.

use crate::config::DisplayConfig;
use crate::errors::ReplayError;
use crate::reveal::{Pacer, RevealEngine};
use crate::screen::{sanitize, Screen};
use crate::types::{ContentBlock, MessageContent, Role, ToolUseResult, Turn};
use chrono::{DateTime, Local};
use crossterm::style::Stylize;
use serde_json::Value;

pub const MARKER: &str = "⏺";
pub const CONTINUATION: &str = "⎿";

pub struct RenderContext<'a> {
    pub screen: &'a mut Screen,
    pub reveal: &'a mut RevealEngine,
    pub pacer: &'a mut dyn Pacer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendered {
    pub visible: bool,
    pub rows: usize,
}

impl Rendered {
    pub const NOTHING: Self = Self {
        visible: false,
        rows: 0,
    };
}

pub fn is_visible(turn: &Turn) -> bool {
    match (&turn.role, &turn.content) {
        (_, None) => false,
        (_, Some(MessageContent::Text(_))) => true,
        (Role::User, Some(MessageContent::Blocks(blocks))) => blocks
            .iter()
            .any(|block| matches!(block, ContentBlock::Text { text } if !text.trim().is_empty())),
        (Role::Assistant, Some(MessageContent::Blocks(blocks))) => !blocks.is_empty(),
    }
}

/// Tool result rendered under `turn` because of what follows it in the log.
pub fn adjacent_result<'a>(turn: &Turn, next: Option<&'a Turn>) -> Option<&'a ToolUseResult> {
    if turn.role != Role::Assistant || !turn.has_tool_use() {
        return None;
    }
    let next = next?;
    if next.role == Role::User && next.is_tool_result_only() {
        return next.tool_use_result.as_ref();
    }
    None
}

pub fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| {
            parsed
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Clone)]
pub struct EntryFormatter {
    edit_excerpt_lines: usize,
    output_max_lines: usize,
}

impl EntryFormatter {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            edit_excerpt_lines: display.edit_excerpt_lines,
            output_max_lines: display.output_max_lines,
        }
    }

    /// Draws `turn` followed by a blank separator line. Invisible turns write
    /// nothing.
    pub fn render(
        &self,
        turn: &Turn,
        next: Option<&Turn>,
        ctx: &mut RenderContext<'_>,
    ) -> Result<Rendered, ReplayError> {
        if !is_visible(turn) {
            return Ok(Rendered::NOTHING);
        }
        ctx.screen.begin_measure();

        ctx.screen
            .write_styled_line(format!("[{}]", format_timestamp(&turn.timestamp)).dim())?;
        match turn.role {
            Role::User => {
                ctx.screen.write_styled_line("User:".blue().bold())?;
                self.render_user_body(turn, ctx.screen)?;
            }
            Role::Assistant => {
                ctx.screen.write_styled_line("Assistant:".green().bold())?;
                self.render_assistant_body(turn, ctx)?;
            }
        }

        if let Some(result) = &turn.tool_use_result {
            self.render_tool_result(result, ctx.screen)?;
        }
        if let Some(result) = adjacent_result(turn, next) {
            self.render_tool_result(result, ctx.screen)?;
        }

        ctx.screen.write("\n")?;
        Ok(Rendered {
            visible: true,
            rows: ctx.screen.measured_rows(),
        })
    }

    fn render_user_body(&self, turn: &Turn, screen: &mut Screen) -> Result<(), ReplayError> {
        match &turn.content {
            Some(MessageContent::Text(text)) => screen.write_line(&sanitize(text.trim_end())),
            Some(MessageContent::Blocks(blocks)) => {
                for block in blocks {
                    if let ContentBlock::Text { text } = block {
                        if !text.trim().is_empty() {
                            screen.write_line(&sanitize(text.trim_end()))?;
                        }
                    }
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn render_assistant_body(
        &self,
        turn: &Turn,
        ctx: &mut RenderContext<'_>,
    ) -> Result<(), ReplayError> {
        match &turn.content {
            Some(MessageContent::Text(text)) => reveal_text(text, ctx),
            Some(MessageContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => reveal_text(text, ctx)?,
                        ContentBlock::ToolUse { name, input, .. } => {
                            self.render_tool_use(name, input, ctx.screen)?
                        }
                        ContentBlock::ToolResult { .. } | ContentBlock::Other => {}
                    }
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn render_tool_use(
        &self,
        name: &str,
        input: &Value,
        screen: &mut Screen,
    ) -> Result<(), ReplayError> {
        match name {
            "Edit" | "MultiEdit" => {
                invocation(screen, "Update", str_field(input, "file_path"))?;
                let edits = match input.get("edits").and_then(Value::as_array) {
                    Some(edits) if name == "MultiEdit" => edits.iter().collect::<Vec<_>>(),
                    _ => vec![input],
                };
                for edit in edits {
                    let old = str_field(edit, "old_string");
                    let new = str_field(edit, "new_string");
                    self.render_excerpt(old, '-', screen)?;
                    self.render_excerpt(new, '+', screen)?;
                }
                Ok(())
            }
            "Write" => {
                invocation(screen, "Write", str_field(input, "file_path"))?;
                let lines = str_field(input, "content").lines().count();
                continuation(screen, &format!("Wrote {lines} lines"))
            }
            "Bash" => {
                invocation(screen, "Bash", str_field(input, "command"))?;
                let description = str_field(input, "description");
                if description.trim().is_empty() {
                    return Ok(());
                }
                continuation(screen, description)
            }
            "Read" | "LS" => invocation(screen, name, first_present(input, &["file_path", "path"])),
            "Glob" | "Grep" => invocation(screen, name, str_field(input, "pattern")),
            _ => {
                screen.write_styled(format!("{MARKER} ").green())?;
                screen.write_styled_line(name.bold())?;
                let empty = match input {
                    Value::Null => true,
                    Value::Object(map) => map.is_empty(),
                    _ => false,
                };
                if empty {
                    return Ok(());
                }
                let pretty = serde_json::to_string_pretty(input).unwrap_or_default();
                for line in pretty.lines() {
                    screen.write_styled_line(format!("  {line}").dim())?;
                }
                Ok(())
            }
        }
    }

    fn render_excerpt(&self, text: &str, sign: char, screen: &mut Screen) -> Result<(), ReplayError> {
        if text.is_empty() {
            return Ok(());
        }
        let lines = text.lines().collect::<Vec<_>>();
        for line in lines.iter().take(self.edit_excerpt_lines) {
            let row = sanitize(&format!("    {sign} {line}"));
            if sign == '-' {
                screen.write_styled_line(row.red())?;
            } else {
                screen.write_styled_line(row.green())?;
            }
        }
        if lines.len() > self.edit_excerpt_lines {
            let rest = lines.len() - self.edit_excerpt_lines;
            screen.write_styled_line(format!("    … +{rest} lines").dim())?;
        }
        Ok(())
    }

    fn render_tool_result(
        &self,
        result: &ToolUseResult,
        screen: &mut Screen,
    ) -> Result<(), ReplayError> {
        if !result.has_output() {
            return Ok(());
        }
        if let Some(stdout) = result.stdout.as_deref().map(str::trim) {
            if !stdout.is_empty() {
                self.render_output(stdout, false, screen)?;
            }
        }
        if let Some(stderr) = result.stderr.as_deref().map(str::trim) {
            if !stderr.is_empty() {
                self.render_output(stderr, true, screen)?;
            }
        }
        if let Some(path) = &result.file_path {
            screen.write_styled_line(sanitize(&format!("  {CONTINUATION}  File: {path}")).dim())?;
            match result.kind.as_deref() {
                Some("create") => screen.write_styled_line("     ✓ File created".green())?,
                Some("edit") | Some("update") => {
                    screen.write_styled_line("     ✓ File edited".yellow())?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn render_output(&self, text: &str, is_error: bool, screen: &mut Screen) -> Result<(), ReplayError> {
        let lines = text.lines().collect::<Vec<_>>();
        for (idx, line) in lines.iter().take(self.output_max_lines).enumerate() {
            let prefix = if idx == 0 {
                format!("  {CONTINUATION}  ")
            } else {
                "     ".to_string()
            };
            let row = sanitize(&format!("{prefix}{line}"));
            if is_error {
                screen.write_styled_line(row.red())?;
            } else {
                screen.write_line(&row)?;
            }
        }
        if lines.len() > self.output_max_lines {
            let rest = lines.len() - self.output_max_lines;
            screen.write_styled_line(format!("     … +{rest} lines").dim())?;
        }
        Ok(())
    }
}

fn reveal_text(text: &str, ctx: &mut RenderContext<'_>) -> Result<(), ReplayError> {
    let text = sanitize(text.trim());
    if text.is_empty() {
        return Ok(());
    }
    ctx.screen.write(&format!("{MARKER} "))?;
    ctx.reveal.reveal(&text, ctx.screen, ctx.pacer)?;
    ctx.screen.write("\n")
}

fn invocation(screen: &mut Screen, name: &str, argument: &str) -> Result<(), ReplayError> {
    screen.write_styled(format!("{MARKER} ").green())?;
    screen.write_styled(name.bold())?;
    screen.write_line(&sanitize(&format!("({argument})")))
}

fn continuation(screen: &mut Screen, text: &str) -> Result<(), ReplayError> {
    screen.write_styled_line(sanitize(&format!("  {CONTINUATION}  {text}")).dim())
}

fn str_field<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("")
}

fn first_present<'a>(input: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .unwrap_or("")
}
