//! JSONL conversation log loading.
//!
//! Each non-blank line is one raw record. Records that share an assistant
//! message id are streamed fragments of one reply and are merged into a single
//! [`Turn`] before playback sees them.

use crate::errors::ReplayError;
use crate::runtime::FileSystem;
use crate::types::{ContentBlock, MessageContent, Role, ToolUseResult, Turn};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    pub line_number: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub turns: Vec<Turn>,
    /// Non-blank lines seen.
    pub raw_records: usize,
    pub malformed: Vec<MalformedLine>,
    /// Records whose `type` is neither user nor assistant.
    pub skipped_records: usize,
    /// Records folded into an earlier turn with the same message id.
    pub merged_records: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    parent_uuid: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    tool_use_result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Option<MessageContent>,
}

pub fn load_turns(path: &Path, fs: &dyn FileSystem) -> Result<LoadReport, ReplayError> {
    if !fs.exists(path) {
        return Err(ReplayError::FileNotFound(path.display().to_string()));
    }
    let contents = fs
        .read_to_string(path)
        .map_err(|e| ReplayError::Io(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_log(&contents))
}

pub fn parse_log(contents: &str) -> LoadReport {
    let mut report = LoadReport::default();
    let mut turns = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        report.raw_records += 1;
        let record: RawRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                report.malformed.push(MalformedLine {
                    line_number: idx + 1,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        match turn_from_record(record) {
            Some(turn) => turns.push(turn),
            None => report.skipped_records += 1,
        }
    }

    let (turns, merged) = merge_assistant_turns(turns);
    report.turns = turns;
    report.merged_records = merged;
    report
}

fn turn_from_record(record: RawRecord) -> Option<Turn> {
    let role = Role::parse_cli(&record.kind)?;
    let (message_id, content) = match record.message {
        Some(message) => (message.id, message.content),
        None => (None, None),
    };
    Some(Turn {
        uuid: record.uuid.unwrap_or_default(),
        parent_uuid: record.parent_uuid,
        role,
        timestamp: record.timestamp.unwrap_or_default(),
        message_id,
        content,
        tool_use_result: record.tool_use_result.and_then(ToolUseResult::from_value),
    })
}

/// Folds assistant records sharing a message id into the first such turn.
///
/// Blocks are appended in arrival order; identifier, parent, timestamp and
/// tool result of the latest record become canonical. Returns the merged
/// sequence and the number of records folded away.
pub fn merge_assistant_turns(turns: Vec<Turn>) -> (Vec<Turn>, usize) {
    let mut merged: Vec<Turn> = Vec::with_capacity(turns.len());
    let mut by_message_id: HashMap<String, usize> = HashMap::new();
    let mut folded = 0usize;

    for turn in turns {
        let existing = match (&turn.role, &turn.message_id) {
            (Role::Assistant, Some(id)) => by_message_id.get(id).copied(),
            _ => None,
        };
        let Some(position) = existing else {
            if let (Role::Assistant, Some(id)) = (&turn.role, &turn.message_id) {
                by_message_id.insert(id.clone(), merged.len());
            }
            merged.push(turn);
            continue;
        };

        let target = &mut merged[position];
        let mut blocks = into_blocks(target.content.take());
        blocks.extend(into_blocks(turn.content));
        target.content = Some(MessageContent::Blocks(blocks));
        target.uuid = turn.uuid;
        target.parent_uuid = turn.parent_uuid;
        target.timestamp = turn.timestamp;
        if turn.tool_use_result.is_some() {
            target.tool_use_result = turn.tool_use_result;
        }
        folded += 1;
    }

    (merged, folded)
}

fn into_blocks(content: Option<MessageContent>) -> Vec<ContentBlock> {
    match content {
        Some(MessageContent::Blocks(blocks)) => blocks,
        Some(MessageContent::Text(text)) => vec![ContentBlock::Text { text }],
        None => Vec::new(),
    }
}

pub fn filter_by_role(turns: Vec<Turn>, role: Role) -> Vec<Turn> {
    turns.into_iter().filter(|turn| turn.role == role).collect()
}

pub fn find_by_uuid<'a>(turns: &'a [Turn], uuid: &str) -> Option<&'a Turn> {
    turns.iter().find(|turn| turn.uuid == uuid)
}

pub fn children_of<'a>(turns: &'a [Turn], parent_uuid: &str) -> Vec<&'a Turn> {
    turns
        .iter()
        .filter(|turn| turn.parent_uuid.as_deref() == Some(parent_uuid))
        .collect()
}

/// Stable sort by parsed timestamp; unparsable timestamps sort first.
pub fn sorted_by_timestamp(turns: &[Turn]) -> Vec<Turn> {
    let mut sorted = turns.to_vec();
    sorted.sort_by_key(|turn| {
        DateTime::parse_from_rfc3339(&turn.timestamp)
            .map(|parsed| parsed.timestamp_millis())
            .ok()
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::{
        children_of, filter_by_role, find_by_uuid, load_turns, parse_log, sorted_by_timestamp,
    };
    use crate::errors::ReplayError;
    use crate::runtime::FakeFileSystem;
    use crate::types::{ContentBlock, MessageContent, Role};
    use std::path::Path;

    #[test]
    fn merges_fragments_sharing_a_message_id() {
        let log = r#"{"uuid":"u1","type":"user","timestamp":"2025-01-01T00:00:00Z","message":{"role":"user","content":"run ls"}}
{"uuid":"a1","parentUuid":"u1","type":"assistant","timestamp":"2025-01-01T00:00:01Z","message":{"id":"m1","role":"assistant","content":[{"type":"text","text":"A"}]}}
{"uuid":"a2","parentUuid":"a1","type":"assistant","timestamp":"2025-01-01T00:00:02Z","message":{"id":"m1","role":"assistant","content":[{"type":"tool_use","name":"Bash"}]}}"#;
        let report = parse_log(log);
        assert_eq!(report.raw_records, 3);
        assert_eq!(report.merged_records, 1);
        assert_eq!(report.turns.len(), 2);

        let merged = &report.turns[1];
        assert_eq!(merged.uuid, "a2");
        assert_eq!(merged.parent_uuid.as_deref(), Some("a1"));
        assert_eq!(merged.timestamp, "2025-01-01T00:00:02Z");
        assert_eq!(merged.content_types(), vec!["text", "tool_use"]);
        let blocks = merged.blocks();
        assert_eq!(
            blocks[0],
            ContentBlock::Text {
                text: "A".to_string()
            }
        );
        assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "Bash"));
    }

    #[test]
    fn merge_keeps_first_position_when_fragments_are_interleaved() {
        let log = r#"{"uuid":"a1","type":"assistant","timestamp":"t1","message":{"id":"m1","content":[{"type":"text","text":"one"}]}}
{"uuid":"u1","type":"user","timestamp":"t2","message":{"content":[{"type":"tool_result","tool_use_id":"x"}]}}
{"uuid":"a2","type":"assistant","timestamp":"t3","message":{"id":"m1","content":"two"}}"#;
        let report = parse_log(log);
        assert_eq!(report.turns.len(), 2);
        assert_eq!(report.turns[0].uuid, "a2");
        assert_eq!(report.turns[0].content_types(), vec!["text", "text"]);
        assert_eq!(report.turns[1].uuid, "u1");
    }

    #[test]
    fn user_records_with_same_message_id_are_not_merged() {
        let log = r#"{"uuid":"u1","type":"user","message":{"id":"m1","content":"a"}}
{"uuid":"u2","type":"user","message":{"id":"m1","content":"b"}}"#;
        let report = parse_log(log);
        assert_eq!(report.turns.len(), 2);
        assert_eq!(report.merged_records, 0);
    }

    #[test]
    fn malformed_and_foreign_lines_are_dropped_without_failing() {
        let log = "{\"uuid\":\"u1\",\"type\":\"user\",\"message\":{\"content\":\"hello\"}}\n\
                   not json at all\n\
                   \n\
                   {\"type\":\"summary\",\"summary\":\"chat\"}\n\
                   {\"uuid\":\"a1\",\"type\":\"assistant\"}\n";
        let report = parse_log(log);
        assert_eq!(report.raw_records, 4);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.malformed[0].line_number, 2);
        assert_eq!(report.skipped_records, 1);
        assert_eq!(report.turns.len(), 2);
        assert!(report.turns[1].content.is_none());
        assert_eq!(
            report.turns[0].content,
            Some(MessageContent::Text("hello".to_string()))
        );
    }

    #[test]
    fn missing_file_reports_file_not_found() {
        let fs = FakeFileSystem::default();
        let err = load_turns(Path::new("/logs/missing.jsonl"), &fs).expect_err("missing");
        assert!(matches!(err, ReplayError::FileNotFound(_)));
        assert_eq!(err.to_string(), "File not found: /logs/missing.jsonl");
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let fs = FakeFileSystem::with_file("/logs/a.jsonl", "");
        fs.set_fail_next(ReplayError::Io("permission denied".to_string()));
        let err = load_turns(Path::new("/logs/a.jsonl"), &fs).expect_err("unreadable");
        assert!(err.to_string().contains("cannot read /logs/a.jsonl"));
    }

    #[test]
    fn lookup_helpers_follow_ids_and_timestamps() {
        let log = r#"{"uuid":"b","parentUuid":"a","type":"assistant","timestamp":"2025-01-01T00:00:05Z","message":{"content":"later"}}
{"uuid":"a","type":"user","timestamp":"2025-01-01T00:00:01Z","message":{"content":"first"}}
{"uuid":"c","parentUuid":"a","type":"user","timestamp":"2025-01-01T00:00:03Z","message":{"content":"middle"}}"#;
        let turns = parse_log(log).turns;

        assert_eq!(find_by_uuid(&turns, "c").map(|t| t.role), Some(Role::User));
        assert!(find_by_uuid(&turns, "zzz").is_none());
        let children = children_of(&turns, "a")
            .into_iter()
            .map(|t| t.uuid.as_str())
            .collect::<Vec<_>>();
        assert_eq!(children, vec!["b", "c"]);

        let order = sorted_by_timestamp(&turns)
            .into_iter()
            .map(|t| t.uuid)
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "c", "b"]);

        let users = filter_by_role(turns, Role::User);
        assert_eq!(users.len(), 2);
    }
}
