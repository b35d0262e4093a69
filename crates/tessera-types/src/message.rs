//! Conversation message types.
//!
//! Messages serialize with an internal `role` tag so the wire shape is a flat
//! JSON object:
//!
//! ```json
//! {"role": "human", "content": "hello", "metadata": {}, "message_id": "..."}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// The sender role of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human user.
    Human,
    /// An AI agent.
    Ai,
    /// System instructions or context.
    System,
    /// The result of a tool execution.
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::System => "system",
            Self::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// Message body: plain text, a list of structured parts, or an arbitrary JSON
/// payload (typically a tool result object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Structured content parts.
    Parts(Vec<Value>),
    /// Any other JSON payload.
    Json(Value),
}

impl MessageContent {
    /// The text body, if this is plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the content is empty text or an empty part list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
            Self::Json(v) => v.is_null(),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Value>> for MessageContent {
    fn from(parts: Vec<Value>) -> Self {
        Self::Parts(parts)
    }
}

/// A tool invocation requested by an AI message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call.
    #[serde(default = "new_message_id")]
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments passed to the tool.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call with a generated ID.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: new_message_id(),
            name: name.into(),
            args,
        }
    }

    /// Override the generated call ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// Message from a human user.
    Human {
        /// Message body.
        content: MessageContent,
        /// Free-form metadata (user ID, timestamps, ...).
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Unique message identifier.
        #[serde(default = "new_message_id")]
        message_id: String,
    },
    /// Message from an AI agent, optionally requesting tool calls.
    Ai {
        /// Message body. May be empty when only tool calls are present.
        #[serde(default)]
        content: MessageContent,
        /// Requested tool invocations.
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
        /// Free-form metadata (model name, token usage, ...).
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Unique message identifier.
        #[serde(default = "new_message_id")]
        message_id: String,
    },
    /// System-level instructions or context.
    System {
        /// Message body.
        content: MessageContent,
        /// Free-form metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Unique message identifier.
        #[serde(default = "new_message_id")]
        message_id: String,
    },
    /// The result of a tool execution.
    Tool {
        /// Tool output.
        content: MessageContent,
        /// ID of the [`ToolCall`] this message answers.
        tool_call_id: String,
        /// Name of the tool that ran.
        tool_name: String,
        /// Free-form metadata (execution time, status, ...).
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Unique message identifier.
        #[serde(default = "new_message_id")]
        message_id: String,
    },
}

impl Message {
    /// A human message.
    #[must_use]
    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::Human {
            content: content.into(),
            metadata: Map::new(),
            message_id: new_message_id(),
        }
    }

    /// An AI message without tool calls.
    #[must_use]
    pub fn ai(content: impl Into<MessageContent>) -> Self {
        Self::ai_with_tool_calls(content, Vec::new())
    }

    /// An AI message requesting tool calls.
    #[must_use]
    pub fn ai_with_tool_calls(content: impl Into<MessageContent>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls,
            metadata: Map::new(),
            message_id: new_message_id(),
        }
    }

    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::System {
            content: content.into(),
            metadata: Map::new(),
            message_id: new_message_id(),
        }
    }

    /// A tool result message answering `tool_call_id`.
    #[must_use]
    pub fn tool(
        content: impl Into<MessageContent>,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            metadata: Map::new(),
            message_id: new_message_id(),
        }
    }

    /// Replace the generated message ID.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        *self.message_id_mut() = id.into();
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata_mut().insert(key.into(), value);
        self
    }

    /// The sender role.
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::Human { .. } => Role::Human,
            Self::Ai { .. } => Role::Ai,
            Self::System { .. } => Role::System,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// The message body.
    #[must_use]
    pub fn content(&self) -> &MessageContent {
        match self {
            Self::Human { content, .. }
            | Self::Ai { content, .. }
            | Self::System { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// The message metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            Self::Human { metadata, .. }
            | Self::Ai { metadata, .. }
            | Self::System { metadata, .. }
            | Self::Tool { metadata, .. } => metadata,
        }
    }

    /// The unique message identifier.
    #[must_use]
    pub fn message_id(&self) -> &str {
        match self {
            Self::Human { message_id, .. }
            | Self::Ai { message_id, .. }
            | Self::System { message_id, .. }
            | Self::Tool { message_id, .. } => message_id,
        }
    }

    /// Tool calls requested by this message (empty for non-AI messages).
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Self::Human { metadata, .. }
            | Self::Ai { metadata, .. }
            | Self::System { metadata, .. }
            | Self::Tool { metadata, .. } => metadata,
        }
    }

    fn message_id_mut(&mut self) -> &mut String {
        match self {
            Self::Human { message_id, .. }
            | Self::Ai { message_id, .. }
            | Self::System { message_id, .. }
            | Self::Tool { message_id, .. } => message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_human_message_wire_shape() {
        let msg = Message::human("hello").with_message_id("m-1");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"role": "human", "content": "hello", "metadata": {}, "message_id": "m-1"})
        );
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Message::human("x");
        let b = Message::human("x");
        assert_ne!(a.message_id(), b.message_id());
        assert!(!a.message_id().is_empty());
    }

    #[test]
    fn test_ai_message_parses_tool_calls() {
        let msg: Message = serde_json::from_value(json!({
            "role": "ai",
            "tool_calls": [{"id": "call_1", "name": "search", "args": {"query": "rust"}}]
        }))
        .unwrap();

        assert_eq!(msg.role(), Role::Ai);
        assert!(msg.content().is_empty());
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.tool_calls()[0].id, "call_1");
        assert_eq!(msg.tool_calls()[0].args["query"], json!("rust"));
        // message_id is generated when absent
        assert!(!msg.message_id().is_empty());
    }

    #[test]
    fn test_tool_message_accepts_object_content() {
        let msg: Message = serde_json::from_value(json!({
            "role": "tool",
            "content": {"status": "ok"},
            "tool_call_id": "call_1",
            "tool_name": "search",
        }))
        .unwrap();

        assert_eq!(msg.role(), Role::Tool);
        assert_eq!(msg.content(), &MessageContent::Json(json!({"status": "ok"})));
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn test_parts_content() {
        let msg = Message::system(vec![json!({"type": "text", "text": "be brief"})]);
        assert!(matches!(msg.content(), MessageContent::Parts(p) if p.len() == 1));
        assert!(msg.content().as_text().is_none());
    }

    #[test]
    fn test_metadata_builder() {
        let msg = Message::ai("done").with_metadata("model", json!("m-large"));
        assert_eq!(msg.metadata()["model"], json!("m-large"));
        assert_eq!(msg.role().to_string(), "ai");
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result: Result<Message, _> =
            serde_json::from_value(json!({"role": "robot", "content": "beep"}));
        assert!(result.is_err());
    }
}
