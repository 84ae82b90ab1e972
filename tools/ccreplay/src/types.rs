use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn parse_cli(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Print everything once, no key capture.
    Batch,
    /// Manual seek: step forward/back through turns, optional autoplay.
    Seek,
    /// Continuous flow with show/hide history.
    Flow,
}

impl PlaybackMode {
    pub fn is_interactive(self) -> bool {
        !matches!(self, Self::Batch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Seek => "seek",
            Self::Flow => "flow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    /// Thinking, image and any block type the player does not draw.
    #[serde(other)]
    Other,
}

impl ContentBlock {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Output of a tool execution, attached to the turn that carried it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseResult {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub old_string: Option<String>,
    #[serde(default)]
    pub new_string: Option<String>,
}

impl ToolUseResult {
    /// Logs store either a structured object or a bare string here.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self {
                stdout: Some(text),
                ..Self::default()
            }),
            Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    pub fn has_output(&self) -> bool {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(|text| !text.trim().is_empty())
                .unwrap_or(false)
        };
        non_empty(&self.stdout) || non_empty(&self.stderr) || self.file_path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub role: Role,
    pub timestamp: String,
    pub message_id: Option<String>,
    pub content: Option<MessageContent>,
    pub tool_use_result: Option<ToolUseResult>,
}

impl Turn {
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    pub fn is_tool_result_only(&self) -> bool {
        let blocks = self.blocks();
        !blocks.is_empty()
            && blocks
                .iter()
                .all(|block| matches!(block, ContentBlock::ToolResult { .. }))
    }

    pub fn has_tool_use(&self) -> bool {
        self.blocks()
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    pub fn content_types(&self) -> Vec<&'static str> {
        match &self.content {
            Some(MessageContent::Text(_)) => vec!["text"],
            Some(MessageContent::Blocks(blocks)) => {
                blocks.iter().map(ContentBlock::type_name).collect()
            }
            None => Vec::new(),
        }
    }
}
